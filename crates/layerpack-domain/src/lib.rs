#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod config;
pub mod error;
pub mod request;
pub mod requirements;
pub mod resolved;
pub mod runtime;

pub use config::{
    LayerConfig, LayerConfigBuilder, DEFAULT_MAX_SIZE_MB, DEFAULT_OPTIMIZATION_LEVEL,
    DEFAULT_RUNTIME,
};
pub use error::{ErrorKind, LayerError, SizeMetric};
pub use request::{direct_names, filter_requests, normalize_name, PackageRequest};
pub use requirements::{parse_requirements, read_requirements_file};
pub use resolved::{PinnedPackage, ResolvedDependencySet};
pub use runtime::PythonRuntime;
