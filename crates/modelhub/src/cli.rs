//! Command-line surface for the modelhub binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Exit code for successful commands
pub const EXIT_OK: i32 = 0;
/// Exit code for any failed command
pub const EXIT_FAILURE: i32 = 1;

/// Main CLI entry point for modelhub.
///
/// Every command prints a single JSON envelope to stdout: `success` is
/// always present; the remaining fields are command-specific. Failures
/// additionally carry `error` and `kind`, and the process exits non-zero.
#[derive(Parser, Debug)]
#[command(name = "modelhub")]
#[command(about = "Artifact cache and model version registry for trained models")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and maintain the artifact cache.
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Manage model versions.
    #[command(subcommand)]
    Registry(RegistryCommands),
}

/// Cache maintenance subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Summarize cache contents without mutating them.
    Stats(CacheArgs),

    /// Remove entries past their TTL.
    ClearExpired(CacheArgs),

    /// Remove every entry regardless of age.
    ClearAll(CacheArgs),
}

/// Arguments shared by all cache subcommands.
#[derive(clap::Args, Debug)]
pub struct CacheArgs {
    /// Cache root directory; defaults to the platform cache directory.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Entry time-to-live in hours.
    #[arg(
        long,
        env = "MODELHUB_CACHE_TTL_HOURS",
        default_value_t = modelhub_cache::DEFAULT_TTL_HOURS
    )]
    pub ttl_hours: i64,
}

/// Arguments shared by all registry subcommands.
#[derive(clap::Args, Debug)]
pub struct RegistryArgs {
    /// Registry data directory.
    #[arg(long, env = "MODELHUB_DATA_DIR", default_value = "modelhub-data")]
    pub data_dir: PathBuf,
}

/// Version registry subcommands.
#[derive(Subcommand, Debug)]
pub enum RegistryCommands {
    /// Register a new version from an artifact blob.
    CreateVersion {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Model the version belongs to.
        #[arg(long)]
        model_id: String,

        /// Artifact blob to copy into the registry (the source is never
        /// modified).
        #[arg(long)]
        blob: PathBuf,

        /// Optional human label (e.g. "production", "baseline").
        #[arg(long)]
        tag: Option<String>,

        /// Activate the new version immediately. The first version of a
        /// model is always activated.
        #[arg(long)]
        activate: bool,

        /// Metadata as a JSON object; evaluation metrics go under a
        /// "metrics" key.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// List a model's version history.
    ListVersions {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Model to list.
        #[arg(long)]
        model_id: String,
    },

    /// Fetch one version record, re-verifying blob integrity.
    GetVersion {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Model the version belongs to.
        #[arg(long)]
        model_id: String,

        /// Version to fetch (e.g. "v2").
        #[arg(long)]
        version_id: String,
    },

    /// Make a version active and refresh the serving blob.
    Rollback {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Model to roll back.
        #[arg(long)]
        model_id: String,

        /// Version to activate.
        #[arg(long)]
        version_id: String,
    },

    /// Diff the numeric metadata of two versions.
    CompareVersions {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Model the versions belong to.
        #[arg(long)]
        model_id: String,

        /// First version.
        #[arg(long)]
        version_1: String,

        /// Second version.
        #[arg(long)]
        version_2: String,
    },

    /// Delete an inactive version's record and blob.
    DeleteVersion {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Model the version belongs to.
        #[arg(long)]
        model_id: String,

        /// Version to delete; must not be active.
        #[arg(long)]
        version_id: String,
    },
}

/// Parse command line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
