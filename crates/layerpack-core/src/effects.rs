use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::process::{run_command, ToolOutput};

/// Seam for every external tool invocation the pipeline makes.
pub trait ToolRunner: Send + Sync {
    fn run(&self, program: &Path, args: &[String], cwd: &Path) -> Result<ToolOutput>;
    /// Find an executable on the search path.
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolRunner;

impl ToolRunner for SystemToolRunner {
    fn run(&self, program: &Path, args: &[String], cwd: &Path) -> Result<ToolOutput> {
        run_command(program, args, cwd)
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}

pub type SharedRunner = Arc<dyn ToolRunner>;
