//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Strata - Layer cache consistency engine
///
/// Keeps the layers of a published release mirrored locally, loading only
/// what is missing.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Repository URL (overrides repository.url)
    #[arg(long, global = true, env = "STRATA_REPO")]
    pub repo: Option<String>,

    /// Directory releases are mirrored into (overrides cache.work_dir)
    #[arg(long, global = true, env = "STRATA_WORK_DIR")]
    pub work_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Make a layer's cache complete, then run an optional command in it
    Ensure(EnsureArgs),

    /// Report cache completeness without touching the network
    Check(CheckArgs),

    /// Show the layer chain a layer requires
    Layers(LayersArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the ensure command
#[derive(Parser, Debug)]
pub struct EnsureArgs {
    /// Release version
    #[arg(id = "release_version", value_name = "VERSION")]
    pub version: String,

    /// Top layer to make available
    pub layer: String,

    /// Command to run in the release directory once the cache is complete
    #[arg(last = true)]
    pub command: Vec<String>,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Release version
    #[arg(id = "release_version", value_name = "VERSION")]
    pub version: String,

    /// Top layer to check
    pub layer: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the layers command
#[derive(Parser, Debug)]
pub struct LayersArgs {
    /// Release version
    #[arg(id = "release_version", value_name = "VERSION")]
    pub version: String,

    /// Top layer
    pub layer: String,

    /// Resolve from mirrored layer definitions only
    #[arg(long)]
    pub offline: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., repository.url)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for report commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}
