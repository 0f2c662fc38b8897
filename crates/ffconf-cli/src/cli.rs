use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "ffconf",
    about = "Resolve analysis configurations and export fit configs",
    version
)]
pub struct Cli {
    /// Log verbosity (error, warn, info, debug, trace); defaults to general.debug_level
    #[arg(long, global = true)]
    pub log_level: Option<tracing::Level>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every command that resolves a configuration.
#[derive(Args)]
pub struct InputArgs {
    /// Path to the analysis config (YAML, TOML or JSON)
    #[arg(long)]
    pub config: String,

    /// Comma-separated sample names to keep, or `all`
    #[arg(long)]
    pub samples: Option<String>,

    /// JSON file mapping sample names to their available systematic variations
    #[arg(long)]
    pub systematics_catalog: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Step {
    /// Histogram production
    #[value(name = "h")]
    Histograms,
    /// Flat ntuple production; needs an `ntuples` block
    #[value(name = "n")]
    Ntuples,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a configuration and print a summary
    Resolve {
        #[command(flatten)]
        input: InputArgs,

        /// Processing step the configuration is resolved for
        #[arg(long, value_enum, default_value = "h")]
        step: Step,

        /// Number of jobs the input is split into
        #[arg(long)]
        split_n_jobs: Option<u32>,

        /// Index of this job, below --split-n-jobs
        #[arg(long)]
        job_index: Option<u32>,

        /// First event to process
        #[arg(long)]
        min_event: Option<u64>,

        /// Last event to process
        #[arg(long)]
        max_event: Option<u64>,

        /// Output the resolved configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a TRExFitter config for a configuration
    TrexConfig {
        #[command(flatten)]
        input: InputArgs,

        /// Output path for the fit config
        #[arg(long)]
        output: String,

        /// Optional YAML overlay with sample and fit settings
        #[arg(long)]
        settings: Option<String>,

        /// Unfolding descriptor: sample,truth_level,truth_variable,reco_variable
        #[arg(long)]
        unfolding: Option<String>,
    },
}
