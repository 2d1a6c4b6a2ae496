//! Validate command: check filtered corpus files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::Parser;

use super::super::output::{color, format_error};
use crate::record::SentenceRecord;

/// Check corpus record files
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// JSONL files of sentence records
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Errors printed per file before going silent
    #[arg(long, default_value_t = 10, value_name = "N")]
    pub max_errors: usize,
}

/// Counts of one validation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ValidationCounts {
    /// Non-blank lines read.
    pub records: u64,
    /// Lines that parsed and passed every record check.
    pub valid: u64,
    /// Mentions over the valid records.
    pub mentions: u64,
}

impl ValidationCounts {
    /// Lines that failed.
    pub fn invalid(&self) -> u64 {
        self.records - self.valid
    }
}

/// Validate every file; fails if any record is invalid.
pub fn run(args: ValidateArgs) -> Result<(), String> {
    let mut totals = ValidationCounts::default();
    for file in &args.files {
        let counts = validate_file(file, args.max_errors)?;
        println!(
            "{}: {} records, {} mentions, {} invalid",
            file.display(),
            counts.records,
            counts.mentions,
            counts.invalid()
        );
        totals.records += counts.records;
        totals.valid += counts.valid;
        totals.mentions += counts.mentions;
    }

    if totals.invalid() > 0 {
        return Err(format!(
            "{} of {} records are invalid",
            totals.invalid(),
            totals.records
        ));
    }
    println!(
        "{} {} records valid ({} mentions)",
        color("32", "✓"),
        totals.records,
        totals.mentions
    );
    Ok(())
}

/// Check one file line by line.
pub fn validate_file(file: &Path, max_errors: usize) -> Result<ValidationCounts, String> {
    let reader = BufReader::new(
        File::open(file).map_err(|e| format_error(&format!("Opening {}", file.display()), e))?,
    );
    let mut counts = ValidationCounts::default();
    let mut shown = 0usize;

    for (n, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format_error(&format!("Reading {}", file.display()), e))?;
        if line.trim().is_empty() {
            continue;
        }
        counts.records += 1;
        let checked = serde_json::from_str::<SentenceRecord>(&line)
            .map_err(crate::Error::from)
            .and_then(|record| record.validate().map(|()| record));
        match checked {
            Ok(record) => {
                counts.valid += 1;
                counts.mentions += record.num_mentions() as u64;
            }
            Err(e) => {
                if shown < max_errors {
                    eprintln!("{} {}:{}: {}", color("31", "error"), file.display(), n + 1, e);
                    shown += 1;
                }
            }
        }
    }
    Ok(counts)
}
