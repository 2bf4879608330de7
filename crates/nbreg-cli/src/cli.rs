use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "nbreg",
    about = "Notebook regression testing: execute notebooks and diff their outputs",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute notebooks and compare them with their stored outputs
    Check(CheckArgs),
    /// Show the differences between two notebook files
    Diff(DiffArgs),
    /// List the available post-processors
    Processors,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Notebook files or directories to search for `*.ipynb`
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
    /// Configuration file (defaults to ./nbreg.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Working directory for execution
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
    /// Per-cell timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
    #[arg(long)]
    pub allow_errors: bool,
    /// Compare without executing
    #[arg(long)]
    pub no_exec: bool,
    #[arg(long)]
    pub coverage: bool,
    /// Post-processor to apply; replaces the configured list
    #[arg(long = "post-processor", value_name = "NAME")]
    pub post_processors: Vec<String>,
    /// Additional path pattern to ignore
    #[arg(long, value_name = "PATTERN")]
    pub ignore: Vec<String>,
    /// Additional replacement rule
    #[arg(long, num_args = 3, value_names = ["PATH", "REGEX", "REPLACEMENT"])]
    pub replace: Vec<String>,
    /// Overwrite notebooks whose outputs differ
    #[arg(long)]
    pub force_regen: bool,
    #[arg(long)]
    pub no_color: bool,
    /// Highlight changed words instead of whole lines
    #[arg(long)]
    pub color_words: bool,
}

impl CheckArgs {
    /// `--replace` values grouped into triples.
    pub fn replace_rules(&self) -> Vec<(String, String, String)> {
        self.replace
            .chunks_exact(3)
            .map(|rule| (rule[0].clone(), rule[1].clone(), rule[2].clone()))
            .collect()
    }
}

#[derive(Args)]
pub struct DiffArgs {
    pub expected: PathBuf,
    pub obtained: PathBuf,
    #[arg(long, value_name = "PATTERN")]
    pub ignore: Vec<String>,
    #[arg(long)]
    pub no_color: bool,
}
