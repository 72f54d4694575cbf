use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};

pub const LAYERPACK_BEFORE_HELP: &str = concat!(
    "layerpack ",
    env!("CARGO_PKG_VERSION"),
    " – Package Python dependencies into serverless layers\n\n",
    "\x1b[1;36mCommands\x1b[0m\n",
    "  create-layer     Resolve, install and zip packages into <output-dir>/<name>.zip.\n",
    "  analyze          Resolve a requirements file and show top-level vs. transitive pins.\n",
);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = LAYERPACK_BEFORE_HELP
)]
pub struct LayerpackCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(about = "Create a layer archive from a requirements file or a package list")]
    CreateLayer(CreateLayerArgs),
    #[command(about = "Analyze the dependencies of a requirements file")]
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .args(["requirements", "packages"])
))]
pub struct CreateLayerArgs {
    #[arg(short, long, value_name = "FILE", help = "Path to requirements.txt")]
    pub requirements: Option<PathBuf>,
    #[arg(
        short,
        long,
        value_name = "LIST",
        value_delimiter = ',',
        help = "Comma-separated list of packages"
    )]
    pub packages: Vec<String>,
    #[arg(short, long, help = "Layer name; the archive is written to <output-dir>/<name>.zip")]
    pub name: String,
    #[arg(long, default_value = "python3.9", help = "Python runtime version")]
    pub runtime: String,
    #[arg(long, default_value = "./dist", help = "Output directory")]
    pub output_dir: PathBuf,
    #[command(flatten)]
    pub filter: FilterArgs,
    #[arg(
        long,
        value_name = "LIST",
        value_delimiter = ',',
        help = "Comma-separated list of files or directories to embed at the layer root"
    )]
    pub include_source: Vec<PathBuf>,
    #[arg(
        long,
        default_value_t = layerpack_domain::DEFAULT_OPTIMIZATION_LEVEL,
        help = "Python optimization level (0-2)"
    )]
    pub optimization_level: u8,
    #[arg(
        long,
        default_value_t = layerpack_domain::DEFAULT_MAX_SIZE_MB,
        help = "Maximum size limit for the layer in MB"
    )]
    pub max_size_mb: f64,
    #[arg(
        long,
        value_name = "LIST",
        value_delimiter = ',',
        help = "Comma-separated list of compatible Python runtimes (defaults to --runtime)"
    )]
    pub compatible_runtimes: Vec<String>,
    #[arg(
        long,
        overrides_with = "keep_test_files",
        help = "Remove test files to reduce size (default)"
    )]
    pub strip_test_files: bool,
    #[arg(long, overrides_with = "strip_test_files", help = "Keep test files in the layer")]
    pub keep_test_files: bool,
}

impl CreateLayerArgs {
    pub fn strip_tests(&self) -> bool {
        !self.keep_test_files
    }

    /// Compatible runtimes with blanks dropped; the target runtime when empty.
    pub fn compatible_runtimes(&self) -> Vec<String> {
        let listed = non_empty(&self.compatible_runtimes);
        if listed.is_empty() {
            vec![self.runtime.clone()]
        } else {
            listed
        }
    }

    pub fn packages(&self) -> Vec<String> {
        non_empty(&self.packages)
    }
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[arg(short, long, value_name = "FILE", help = "Path to requirements.txt")]
    pub requirements: PathBuf,
    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Options shared by every command that filters the resolved set.
#[derive(Args, Debug)]
pub struct FilterArgs {
    #[arg(
        long,
        value_name = "LIST",
        value_delimiter = ',',
        help = "Comma-separated list of packages to exclude"
    )]
    pub exclude_packages: Vec<String>,
    #[arg(
        long,
        overrides_with = "no_dependencies",
        help = "Include transitive dependencies (default)"
    )]
    pub include_dependencies: bool,
    #[arg(
        long,
        overrides_with = "include_dependencies",
        help = "Only keep the packages named directly"
    )]
    pub no_dependencies: bool,
}

impl FilterArgs {
    pub fn include_dependencies(&self) -> bool {
        !self.no_dependencies
    }

    pub fn exclude_packages(&self) -> Vec<String> {
        non_empty(&self.exclude_packages)
    }
}

fn non_empty(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}
