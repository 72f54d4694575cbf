#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

pub mod archiver;
pub mod assembler;
pub mod backend;
pub mod effects;
pub mod fetcher;
mod fs;
pub mod observer;
pub mod pipeline;
pub mod process;
pub mod resolver;
pub mod settings;
#[cfg(test)]
pub(crate) mod test_support;

pub use archiver::{measure_size, ArchiveArtifact, Archiver, ARCHIVE_EXTENSION};
pub use assembler::{measure_tree_size, LayerAssembler, LayerDirectory, StripReport};
pub use backend::ResolverBackend;
pub use effects::{SharedRunner, SystemToolRunner, ToolRunner};
pub use fetcher::Fetcher;
pub use fs::ScratchDir;
pub use observer::{BuildObserver, SharedObserver, Stage, TracingObserver};
pub use pipeline::{DependencyAnalysis, LayerBuild, LayerPackager};
pub use process::{run_command, ToolOutput};
pub use resolver::{classify_resolver_failure, Resolver};
pub use settings::Settings;

pub use layerpack_domain as domain;
