//! kbprep - entity-linking corpus preparation CLI
//!
//! # Usage
//!
//! ```bash
//! # Write a config, edit it, run the filter
//! kbprep config > filter.toml
//! kbprep filter --config filter.toml
//!
//! # Inspect an index
//! kbprep info --index data/wiki_dump/filtered_data/entity_db/entity_mappings
//! kbprep tag --index data/wiki_dump/orig/entity_db/entity_mappings "I live in New York"
//!
//! # Check filtered output
//! kbprep validate data/wiki_dump/filtered_data/*.jsonl
//! ```

use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;

use kbprep::cli::commands;
use kbprep::cli::output::color;
use kbprep::cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    // RUST_LOG applies unless -v or -q is given.
    if cli.verbose > 0 || cli.quiet {
        logger.filter_level(cli.log_level());
    }
    let _ = logger.format_timestamp_secs().try_init();

    let result: Result<(), String> = match cli.command {
        Commands::Filter(args) => commands::filter::run(args),
        Commands::Tag(args) => commands::tag::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Candidates(args) => commands::candidates::run(args),
        Commands::Config(args) => commands::config::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", color("31", "error:"), e);
            ExitCode::FAILURE
        }
    }
}
