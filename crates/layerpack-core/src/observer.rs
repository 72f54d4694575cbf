use std::fmt;
use std::sync::Arc;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Resolve,
    Filter,
    Fetch,
    Assemble,
    EmbedSources,
    StripTests,
    SizeCheck,
    Archive,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Filter => "filter",
            Self::Fetch => "fetch",
            Self::Assemble => "assemble",
            Self::EmbedSources => "embed_sources",
            Self::StripTests => "strip_tests",
            Self::SizeCheck => "size_check",
            Self::Archive => "archive",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives progress from the pipeline and its components.
///
/// Passed explicitly to each component; nothing in the library installs a
/// global logger.
pub trait BuildObserver: Send + Sync {
    fn stage_started(&self, layer: &str, stage: Stage);
    fn stage_completed(&self, layer: &str, stage: Stage);
    fn stage_failed(&self, layer: &str, stage: Stage, error: &anyhow::Error);
    fn package_installed(&self, name: &str, version: &str);
    fn warning(&self, message: &str);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BuildObserver for TracingObserver {
    fn stage_started(&self, layer: &str, stage: Stage) {
        tracing::debug!(layer, %stage, "stage started");
    }

    fn stage_completed(&self, layer: &str, stage: Stage) {
        tracing::debug!(layer, %stage, "stage completed");
    }

    fn stage_failed(&self, layer: &str, stage: Stage, error: &anyhow::Error) {
        tracing::error!(layer, %stage, error = %format!("{error:#}"), "failed to create layer");
    }

    fn package_installed(&self, name: &str, version: &str) {
        tracing::info!("Installed {name}=={version}");
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

pub type SharedObserver = Arc<dyn BuildObserver>;
