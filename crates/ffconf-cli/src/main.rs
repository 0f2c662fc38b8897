//! FFConf CLI: the `ffconf` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            input,
            step,
            split_n_jobs,
            job_index,
            min_event,
            max_event,
            json,
        } => commands::resolve::run(commands::resolve::Args {
            log_level: cli.log_level,
            input,
            step,
            split_n_jobs,
            job_index,
            min_event,
            max_event,
            json,
        }),

        Commands::TrexConfig {
            input,
            output,
            settings,
            unfolding,
        } => commands::trex_config::run(commands::trex_config::Args {
            log_level: cli.log_level,
            input,
            output,
            settings,
            unfolding,
        }),
    }
}
