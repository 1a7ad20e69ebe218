//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use corroborate_domain::Mode;
use std::path::PathBuf;

/// Corroborate - Answer questions from several sources and cross-check the evidence.
#[derive(Debug, Parser)]
#[command(name = "corroborate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CORROBORATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (confident claims only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer a question against a local corpus
    Run(RunArgs),

    /// Inspect or validate configuration
    Config(ConfigArgs),
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// The question to answer
    pub question: String,

    /// Run mode
    #[arg(short, long, value_enum, default_value = "deep")]
    pub mode: ModeArg,

    /// JSON corpus file serving as the sources
    #[arg(long, env = "CORROBORATE_CORPUS")]
    pub corpus: Option<PathBuf>,

    /// Ollama model name
    #[arg(long, env = "CORROBORATE_MODEL")]
    pub model: Option<String>,

    /// Ollama endpoint
    #[arg(long, env = "CORROBORATE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Engine preset, replacing the configured engine settings
    #[arg(short, long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Override the maximum number of iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Override the confidence threshold (0.0-1.0)
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Print progress events to stderr
    #[arg(long)]
    pub progress: bool,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show {
        /// Show a preset instead of the loaded engine settings
        #[arg(short, long, value_enum)]
        preset: Option<PresetArg>,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the loaded configuration)
        path: Option<PathBuf>,
    },
}

/// Run mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    /// One decompose-retrieve-verify pass
    Fast,
    /// Iterate until the evidence is sufficient
    Deep,
}

/// Engine preset argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetArg {
    /// Few iterations, short timeouts
    Quick,
    /// Balanced settings
    Default,
    /// More iterations and sub-queries
    Thorough,
}

impl PresetArg {
    /// Preset name understood by the engine
    pub fn name(&self) -> &'static str {
        match self {
            PresetArg::Quick => "quick",
            PresetArg::Default => "default",
            PresetArg::Thorough => "thorough",
        }
    }
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fast => Mode::Fast,
            ModeArg::Deep => Mode::Deep,
        }
    }
}
