use std::path::{Path, PathBuf};

use crate::effects::ToolRunner;
use crate::settings::Settings;

/// The external tool that resolves and installs packages.
///
/// Chosen once by [`ResolverBackend::probe`] and handed to the resolver and
/// fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverBackend {
    /// `uv pip compile` / `uv pip install`.
    Uv { path: PathBuf },
    /// `pip freeze` / `pip install`.
    Pip { program: PathBuf },
}

impl ResolverBackend {
    /// Prefer a healthy `uv`, otherwise fall back to pip.
    ///
    /// Any probe failure (missing binary, spawn error, non-zero `--version`)
    /// selects pip without surfacing an error.
    pub fn probe(runner: &dyn ToolRunner, settings: &Settings) -> Self {
        let candidate = settings.uv_path.clone().or_else(|| runner.locate("uv"));
        let fallback = Self::Pip {
            program: settings.pip_program.clone(),
        };
        let Some(path) = candidate else {
            tracing::debug!("uv not available, falling back to pip");
            return fallback;
        };
        match runner.run(&path, &["--version".to_string()], Path::new(".")) {
            Ok(output) if output.success() => {
                tracing::debug!(
                    uv = %path.display(),
                    version = output.stdout.trim(),
                    "using uv backend"
                );
                Self::Uv { path }
            }
            Ok(output) => {
                tracing::debug!(
                    uv = %path.display(),
                    code = output.code,
                    "uv --version failed, falling back to pip"
                );
                fallback
            }
            Err(err) => {
                tracing::debug!(uv = %path.display(), %err, "uv probe failed, falling back to pip");
                fallback
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uv { .. } => "uv",
            Self::Pip { .. } => "pip",
        }
    }

    pub fn program(&self) -> &Path {
        match self {
            Self::Uv { path } => path,
            Self::Pip { program } => program,
        }
    }

    /// Arguments that turn `spec_file` into pinned `name==version` lines.
    ///
    /// pip has no compile step; `pip freeze` reports the pins of the current
    /// environment instead.
    pub fn compile_args(&self, spec_file: &Path) -> Vec<String> {
        match self {
            Self::Uv { .. } => vec![
                "pip".to_string(),
                "compile".to_string(),
                spec_file.display().to_string(),
            ],
            Self::Pip { .. } => vec!["freeze".to_string()],
        }
    }

    /// Arguments that install one pinned package into `target`.
    pub fn install_args(&self, name: &str, version: &str, target: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(5);
        if matches!(self, Self::Uv { .. }) {
            args.push("pip".to_string());
        }
        args.push("install".to_string());
        args.push(format!("{name}=={version}"));
        args.push("--target".to_string());
        args.push(target.display().to_string());
        args
    }
}
