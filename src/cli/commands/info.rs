//! Info command: index summary.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use super::super::output::{format_error, print_json, OutputFormat};
use crate::CandidateIndex;

/// Summarize a candidate index
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Index directory
    #[arg(short, long, value_name = "DIR")]
    pub index: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Summary figures of one index.
#[derive(Debug, Serialize, PartialEq)]
pub struct IndexSummary {
    /// Alias keys.
    pub aliases: usize,
    /// Titled entities.
    pub entities: usize,
    /// Candidate cap.
    pub max_candidates: usize,
    /// Longest alias in words.
    pub max_alias_len: usize,
    /// Total candidate entries over all aliases.
    pub candidate_entries: usize,
    /// Entities titled as disambiguation pages.
    pub disambiguation_entities: usize,
}

impl IndexSummary {
    /// Compute the summary of `index`.
    pub fn of(index: &CandidateIndex) -> Self {
        Self {
            aliases: index.num_aliases(),
            entities: index.num_entities(),
            max_candidates: index.max_candidates(),
            max_alias_len: index.max_alias_len(),
            candidate_entries: index.iter().map(|(_, c)| c.len()).sum(),
            disambiguation_entities: index.disambiguation_entities().len(),
        }
    }
}

/// Load the index and print its summary.
pub fn run(args: InfoArgs) -> Result<(), String> {
    let index = CandidateIndex::load(&args.index).map_err(|e| format_error("Loading index", e))?;
    let summary = IndexSummary::of(&index);
    match args.format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Human => {
            println!("Index:                   {}", args.index.display());
            println!("Aliases:                 {}", summary.aliases);
            println!("Entities:                {}", summary.entities);
            println!("Candidate entries:       {}", summary.candidate_entries);
            println!("Max candidates:          {}", summary.max_candidates);
            println!("Max alias length:        {}", summary.max_alias_len);
            println!("Disambiguation entities: {}", summary.disambiguation_entities);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candidate;
    use std::collections::HashMap;

    #[test]
    fn summary_counts_entries() {
        let titles: HashMap<String, String> = [("Q1", "Acme"), ("Q2", "Acme (disambiguation)")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let index = CandidateIndex::build(
            vec![
                (
                    "acme".to_string(),
                    vec![Candidate::new("Q1", 3.0), Candidate::new("Q2", 1.0)],
                ),
                ("acme corp".to_string(), vec![Candidate::new("Q1", 1.0)]),
            ],
            titles,
        )
        .unwrap();
        let s = IndexSummary::of(&index);
        assert_eq!(s.aliases, 2);
        assert_eq!(s.candidate_entries, 3);
        assert_eq!(s.max_alias_len, 2);
        assert_eq!(s.disambiguation_entities, 1);
    }
}
