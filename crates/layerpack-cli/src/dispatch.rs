use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use layerpack_core::{DependencyAnalysis, LayerBuild, LayerPackager};
use layerpack_domain::{read_requirements_file, LayerConfig, PackageRequest, DEFAULT_RUNTIME};

use crate::cli::{AnalyzeArgs, CommandGroupCli, CreateLayerArgs};

const ANALYZE_OUTPUT_DIR: &str = "./dist";

/// Successful result of one command.
#[derive(Debug)]
pub enum Report {
    Layer {
        name: String,
        build: LayerBuild,
    },
    Analysis {
        requirements: PathBuf,
        include_dependencies: bool,
        analysis: DependencyAnalysis,
    },
}

pub fn command_name(command: &CommandGroupCli) -> &'static str {
    match command {
        CommandGroupCli::CreateLayer(_) => "create-layer",
        CommandGroupCli::Analyze(_) => "analyze",
    }
}

pub fn execute(command: &CommandGroupCli) -> Result<Report> {
    match command {
        CommandGroupCli::CreateLayer(args) => create_layer(args),
        CommandGroupCli::Analyze(args) => analyze(args),
    }
}

fn create_layer(args: &CreateLayerArgs) -> Result<Report> {
    let config = LayerConfig::builder()
        .exclude_packages(args.filter.exclude_packages())
        .include_source(&args.include_source)
        .optimization_level(args.optimization_level)
        .max_size_mb(args.max_size_mb)
        .compatible_runtimes(args.compatible_runtimes())
        .strip_test_files(args.strip_tests())
        .include_dependencies(args.filter.include_dependencies())
        .build()?;
    tracing::debug!(config = %config.summary(), "layer configuration");

    let packager = LayerPackager::new(&args.runtime, &args.output_dir, config)?;
    let build = if let Some(requirements) = &args.requirements {
        ensure_exists(requirements)?;
        tracing::info!("Creating layer from requirements file: {}", requirements.display());
        packager.create_layer_from_requirements(requirements, &args.name)?
    } else {
        let packages = args.packages();
        tracing::info!("Creating layer from packages: {}", packages.join(", "));
        packager.create_layer_from_packages(&packages, &args.name)?
    };
    Ok(Report::Layer {
        name: args.name.clone(),
        build,
    })
}

fn analyze(args: &AnalyzeArgs) -> Result<Report> {
    ensure_exists(&args.requirements)?;
    tracing::info!("Analyzing dependencies in: {}", args.requirements.display());
    let config = LayerConfig::builder()
        .exclude_packages(args.filter.exclude_packages())
        .include_dependencies(args.filter.include_dependencies())
        .build()?;
    let packager = LayerPackager::new(&DEFAULT_RUNTIME.to_string(), ANALYZE_OUTPUT_DIR, config)?;
    let requests = read_requirements_file(&args.requirements)?;
    let raw: Vec<&str> = requests.iter().map(PackageRequest::as_str).collect();
    let analysis = packager.analyze(&raw)?;
    Ok(Report::Analysis {
        requirements: args.requirements.clone(),
        include_dependencies: args.filter.include_dependencies(),
        analysis,
    })
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    Err(io::Error::new(io::ErrorKind::NotFound, "No such file"))
        .with_context(|| format!("File not found - {}", path.display()))
}
