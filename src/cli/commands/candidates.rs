//! Candidates command: import benchmark candidate lists.

use std::path::PathBuf;

use clap::Parser;

use super::super::output::{color, format_error};
use crate::resolve::{import_ganea_candidates, EntityIdResolver};

/// Import benchmark candidate lists
#[derive(Parser, Debug)]
pub struct CandidatesArgs {
    /// Tab-separated candidate files (`... CANDIDATES id,score,title ... GT: ...`)
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Line-delimited JSON title/id map (qid, wikipedia_title, id, title)
    #[arg(long, value_name = "PATH")]
    pub title_map: Option<PathBuf>,

    /// Tab-separated `title<TAB>page_id` redirects
    #[arg(long, value_name = "PATH")]
    pub redirects: Option<PathBuf>,

    /// Candidates kept per alias
    #[arg(short = 'k', long, default_value_t = 30, value_name = "N")]
    pub top_k: usize,

    /// Output JSON file (`alias → [[entity_id, score], ...]`)
    #[arg(short, long, value_name = "PATH")]
    pub out: PathBuf,
}

/// Resolve, rank and save the candidate lists.
pub fn run(args: CandidatesArgs) -> Result<(), String> {
    let mut resolver = EntityIdResolver::new();
    if let Some(path) = &args.title_map {
        resolver = resolver
            .load_title_map(path)
            .map_err(|e| format_error("Loading title map", e))?;
    }
    if let Some(path) = &args.redirects {
        resolver = resolver
            .load_redirects(path)
            .map_err(|e| format_error("Loading redirects", e))?;
    }

    let import = import_ganea_candidates(&args.files, &resolver, args.top_k)
        .map_err(|e| format_error("Importing candidates", e))?;
    import
        .save(&args.out)
        .map_err(|e| format_error("Saving candidates", e))?;

    for (strategy, n) in &import.resolved_by {
        println!("  resolved by {:<8} {}", strategy.to_string(), n);
    }
    if !import.unresolved_pages.is_empty() {
        println!(
            "{} {} page ids could not be resolved",
            color("33", "warn"),
            import.unresolved_pages.len()
        );
    }
    println!(
        "{} Saved candidates for {} aliases: {}",
        color("32", "✓"),
        import.candidates.len(),
        args.out.display()
    );
    Ok(())
}
