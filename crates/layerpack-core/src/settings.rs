use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

const DEFAULT_PIP_PROGRAM: &str = "pip";

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn flag_is_enabled(&self, key: &str) -> bool {
        matches!(
            self.var(key).map(str::to_ascii_lowercase).as_deref(),
            Some("1" | "true" | "yes" | "on")
        )
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Process-level knobs read from `LAYERPACK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Explicit `uv` executable; skips the `PATH` lookup.
    pub uv_path: Option<PathBuf>,
    /// Program used when `uv` is unavailable.
    pub pip_program: PathBuf,
    /// Parent for scratch directories; the system temp dir when unset.
    pub scratch_root: Option<PathBuf>,
    /// Leave scratch directories on disk after a build.
    pub keep_scratch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            uv_path: None,
            pip_program: PathBuf::from(DEFAULT_PIP_PROGRAM),
            scratch_root: None,
            keep_scratch: false,
        }
    }
}

impl Settings {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            uv_path: snapshot.var("LAYERPACK_UV").map(PathBuf::from),
            pip_program: PathBuf::from(
                snapshot
                    .var("LAYERPACK_PIP")
                    .unwrap_or(DEFAULT_PIP_PROGRAM),
            ),
            scratch_root: snapshot.var("LAYERPACK_SCRATCH_DIR").map(PathBuf::from),
            keep_scratch: snapshot.flag_is_enabled("LAYERPACK_KEEP_SCRATCH"),
        }
    }
}
