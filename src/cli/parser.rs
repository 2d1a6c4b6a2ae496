//! CLI argument parsing and structure definitions

use clap::{ArgAction, Parser, Subcommand};

use super::commands::{CandidatesArgs, ConfigArgs, FilterArgs, InfoArgs, TagArgs, ValidateArgs};

/// Candidate-index and corpus preparation for entity linking
#[derive(Parser, Debug)]
#[command(name = "kbprep")]
#[command(
    author,
    version,
    about = "Candidate-index and corpus preparation for entity linking",
    long_about = r#"
kbprep - build entity-linking training data

PIPELINE:
  stage 1  : per-sentence filter of raw documents, records observed aliases
  rebuild  : prune the raw candidate index to observed aliases, cap lists
  stage 2  : keep mentions the pruned index supports, write statistics

EXAMPLES:
  kbprep config > filter.toml
  kbprep filter --config filter.toml --processes 8
  kbprep tag --index data/orig/entity_db/entity_mappings "I live in New York"
  kbprep info --index data/filtered_data/entity_db/entity_mappings
  kbprep validate data/filtered_data/*.jsonl
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// More log output (repeat for debug/trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// kbprep subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run both filter stages and the index rebuild
    #[command(visible_alias = "f")]
    Filter(FilterArgs),

    /// Tag aliases in a sentence against an index
    #[command(visible_alias = "t")]
    Tag(TagArgs),

    /// Summarize a candidate index
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// Check corpus record files
    #[command(visible_alias = "v")]
    Validate(ValidateArgs),

    /// Import benchmark candidate lists
    #[command(visible_alias = "c")]
    Candidates(CandidatesArgs),

    /// Print the default filter configuration as TOML
    Config(ConfigArgs),
}

impl Cli {
    /// Log level implied by `-v` / `-q`.
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn verbosity_maps_to_level() {
        let cli = Cli::parse_from(["kbprep", "-vv", "config"]);
        assert_eq!(cli.log_level(), log::LevelFilter::Trace);
        let cli = Cli::parse_from(["kbprep", "-q", "config"]);
        assert_eq!(cli.log_level(), log::LevelFilter::Error);
    }
}
