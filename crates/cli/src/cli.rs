//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use contracts::ModuleGroup;
use std::path::PathBuf;

/// backpipe - streaming backup pipeline
#[derive(Parser, Debug)]
#[command(
    name = "backpipe",
    author,
    version,
    about = "Streaming backup pipeline: source -> compress -> encrypt -> sink",
    long_about = "Assembles pluggable stages into a single streaming pipeline.\n\n\
                  Each stage is selected as `name::key=value::key=value`, e.g.\n\
                  --source file::path=/var/dump.sql --compress zstd::level=9\n\
                  --encrypt aesgcm::key=... --sink file::path=/backups/db.bin"
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BACKPIPE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (logs always go to stderr)
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BACKPIPE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline
    Run(RunArgs),

    /// Resolve and configure every stage without moving any data
    Validate(ValidateArgs),

    /// List registered modules and their parameters
    Modules(ModulesArgs),
}

/// Stage selection shared by `run` and `validate`
#[derive(Args, Debug, Clone, Default)]
pub struct StageArgs {
    /// Pipeline manifest (TOML or JSON); stage flags override its entries
    #[arg(short, long, env = "BACKPIPE_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Pipeline direction
    #[arg(short, long, value_enum, env = "BACKPIPE_GROUP")]
    pub group: Option<GroupArg>,

    /// Source selector
    #[arg(long, env = "BACKPIPE_SOURCE")]
    pub source: Option<String>,

    /// Compression selector (empty = no compression)
    #[arg(long, env = "BACKPIPE_COMPRESS")]
    pub compress: Option<String>,

    /// Encryption selector (empty = no encryption)
    #[arg(long, env = "BACKPIPE_ENCRYPT")]
    pub encrypt: Option<String>,

    /// Sink selector
    #[arg(long, env = "BACKPIPE_SINK")]
    pub sink: Option<String>,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub stages: StageArgs,

    /// Overall deadline in seconds (0 = no timeout)
    #[arg(long, env = "BACKPIPE_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Seconds granted to remaining stages after the first failure
    #[arg(long, env = "BACKPIPE_FAILURE_GRACE")]
    pub failure_grace: Option<u64>,

    /// Bytes buffered between adjacent stages
    #[arg(long, env = "BACKPIPE_PIPE_CAPACITY")]
    pub pipe_capacity: Option<usize>,

    /// Metrics server port (unset = disabled)
    #[arg(long, env = "BACKPIPE_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Configure every stage and print the plan without running it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub stages: StageArgs,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `modules` command
#[derive(Parser, Debug)]
pub struct ModulesArgs {
    /// Only list modules of this group
    #[arg(short, long, value_enum)]
    pub group: Option<GroupArg>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Pipeline direction
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupArg {
    /// source -> compress -> encrypt -> sink
    Backup,
    /// source -> decrypt -> decompress -> sink
    Restore,
}

impl From<GroupArg> for ModuleGroup {
    fn from(group: GroupArg) -> Self {
        match group {
            GroupArg::Backup => ModuleGroup::Backup,
            GroupArg::Restore => ModuleGroup::Restore,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
