use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

/// The failure families a caller distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    IncompatibleRuntime,
    PackageNotFound,
    DependencyConflict,
    LayerSizeLimit,
}

/// Which measurement tripped a size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeMetric {
    /// Sum of the file sizes in the assembled layer tree.
    Uncompressed,
    /// Size of the written zip archive.
    Archive,
}

impl fmt::Display for SizeMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uncompressed => f.write_str("uncompressed layer"),
            Self::Archive => f.write_str("layer archive"),
        }
    }
}

/// User-facing failures raised while configuring or building a layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayerError {
    #[error("invalid {field}: {message}")]
    Configuration {
        field: &'static str,
        message: String,
    },
    #[error("runtime {runtime} is not in compatible runtimes: {}", .compatible.join(", "))]
    IncompatibleRuntime {
        runtime: String,
        compatible: Vec<String>,
    },
    #[error("package not found: {detail}")]
    PackageNotFound { detail: String },
    #[error("no dependencies to resolve")]
    NoInput,
    #[error("dependency resolution failed: {detail}")]
    DependencyConflict { detail: String },
    #[error("failed to install {package}: {detail}")]
    InstallFailed { package: String, detail: String },
    #[error("{metric} size {actual_mb:.2} MB exceeds the {limit_mb} MB limit")]
    LayerSizeLimit {
        actual_mb: f64,
        limit_mb: f64,
        metric: SizeMetric,
    },
}

impl LayerError {
    pub fn configuration(field: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::IncompatibleRuntime { .. } => ErrorKind::IncompatibleRuntime,
            Self::PackageNotFound { .. } => ErrorKind::PackageNotFound,
            Self::NoInput | Self::DependencyConflict { .. } | Self::InstallFailed { .. } => {
                ErrorKind::DependencyConflict
            }
            Self::LayerSizeLimit { .. } => ErrorKind::LayerSizeLimit,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "LP100",
            Self::IncompatibleRuntime { .. } => "LP101",
            Self::PackageNotFound { .. } => "LP110",
            Self::NoInput => "LP111",
            Self::DependencyConflict { .. } => "LP112",
            Self::InstallFailed { .. } => "LP113",
            Self::LayerSizeLimit { .. } => "LP120",
        }
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "invalid_configuration",
            Self::IncompatibleRuntime { .. } => "incompatible_runtime",
            Self::PackageNotFound { .. } => "package_not_found",
            Self::NoInput => "no_input",
            Self::DependencyConflict { .. } => "dependency_conflict",
            Self::InstallFailed { .. } => "install_failed",
            Self::LayerSizeLimit { .. } => "layer_size_limit",
        }
    }

    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "Check the value of the named configuration option.",
            Self::IncompatibleRuntime { .. } => {
                "Add the runtime to --compatible-runtimes or pick a listed runtime."
            }
            Self::PackageNotFound { .. } => "Please verify the package name and version.",
            Self::NoInput => "Pass at least one package or a non-empty requirements file.",
            Self::DependencyConflict { .. } | Self::InstallFailed { .. } => {
                "Please check for conflicting package versions."
            }
            Self::LayerSizeLimit { .. } => {
                "Try excluding unnecessary packages or increasing the size limit."
            }
        }
    }

    /// Structured payload for JSON output.
    #[must_use]
    pub fn details(&self) -> Value {
        let mut details = json!({
            "code": self.code(),
            "reason": self.reason(),
            "kind": self.kind(),
            "hint": self.hint(),
        });
        if let Value::Object(map) = &mut details {
            match self {
                Self::Configuration { field, .. } => {
                    map.insert("field".into(), json!(field));
                }
                Self::IncompatibleRuntime {
                    runtime,
                    compatible,
                } => {
                    map.insert("runtime".into(), json!(runtime));
                    map.insert("compatible".into(), json!(compatible));
                }
                Self::PackageNotFound { detail } | Self::DependencyConflict { detail } => {
                    map.insert("stderr".into(), json!(detail));
                }
                Self::InstallFailed { package, detail } => {
                    map.insert("package".into(), json!(package));
                    map.insert("stderr".into(), json!(detail));
                }
                Self::LayerSizeLimit {
                    actual_mb,
                    limit_mb,
                    metric,
                } => {
                    map.insert("actual_mb".into(), json!(actual_mb));
                    map.insert("limit_mb".into(), json!(limit_mb));
                    map.insert("metric".into(), json!(metric));
                }
                Self::NoInput => {}
            }
        }
        details
    }
}
