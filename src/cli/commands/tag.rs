//! Tag command: find alias mentions in a sentence.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use super::super::output::{color, format_error, print_json, OutputFormat};
use crate::{Candidate, CandidateIndex, MentionTagger};

/// Tag aliases in a sentence against an index
#[derive(Parser, Debug)]
pub struct TagArgs {
    /// Index directory (alias2qids.json, qid2title.json, config.json)
    #[arg(short, long, value_name = "DIR")]
    pub index: PathBuf,

    /// Candidates shown per mention
    #[arg(long, default_value_t = 3, value_name = "N")]
    pub top: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Sentence to tag
    #[arg(required = true, trailing_var_arg = true)]
    pub sentence: Vec<String>,
}

#[derive(Serialize)]
struct TaggedOutput<'a> {
    alias: &'a str,
    start: usize,
    end: usize,
    text: String,
    candidates: &'a [Candidate],
}

/// Tag the sentence and print every mention with its top candidates.
pub fn run(args: TagArgs) -> Result<(), String> {
    let index = CandidateIndex::load(&args.index).map_err(|e| format_error("Loading index", e))?;
    let sentence = args.sentence.join(" ");
    let tokens: Vec<&str> = sentence.split_whitespace().collect();

    let tagger = MentionTagger::default();
    let mentions = tagger.tag_sentence(&sentence, &index);

    let rows: Vec<TaggedOutput<'_>> = mentions
        .iter()
        .map(|m| {
            let cands = index.lookup(&m.alias);
            TaggedOutput {
                alias: &m.alias,
                start: m.start,
                end: m.end,
                text: tokens[m.start..m.end].join(" "),
                candidates: &cands[..cands.len().min(args.top)],
            }
        })
        .collect();

    match args.format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Human => {
            if rows.is_empty() {
                println!("No mentions found");
                return Ok(());
            }
            for row in &rows {
                let cands: Vec<String> = row
                    .candidates
                    .iter()
                    .map(|c| {
                        let title = index.title_of(&c.entity_id).unwrap_or("?");
                        format!("{} ({}, {})", c.entity_id, title, c.score)
                    })
                    .collect();
                println!(
                    "{} [{}..{}) {:?} → {}",
                    color("36", &row.text),
                    row.start,
                    row.end,
                    row.alias,
                    cands.join(", ")
                );
            }
            Ok(())
        }
    }
}
