//! Filter command: run the whole pipeline.

use std::path::PathBuf;

use clap::Parser;

use super::super::output::{color, format_error, print_json, OutputFormat};
use crate::{Pipeline, PipelineConfig, PipelineReport};

/// Run both filter stages and the index rebuild
#[derive(Parser, Debug, Default)]
pub struct FilterArgs {
    /// TOML configuration file; flags below override it
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Root for inputs and outputs
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Input subdirectory of the data dir
    #[arg(long, value_name = "NAME")]
    pub orig_dir: Option<String>,

    /// Output subdirectory of the data dir
    #[arg(long, value_name = "NAME")]
    pub subfolder_name: Option<String>,

    /// Sentence predicate (false_filter, sentence_filterQID, sentence_filterAliases)
    #[arg(long, value_name = "NAME")]
    pub sentence_filter: Option<String>,

    /// JSON list read by the entity-id and alias predicates
    #[arg(long, value_name = "PATH")]
    pub filter_file: Option<PathBuf>,

    /// JSON list of disambiguation entity ids
    #[arg(long, value_name = "PATH")]
    pub disambig_file: Option<PathBuf>,

    /// Keep mentions of disambiguation entities
    #[arg(long)]
    pub no_filter_disambig: bool,

    /// Treat entities titled "... (disambiguation)" as disambiguation entities
    #[arg(long)]
    pub detect_disambig_titles: bool,

    /// Keep sentences whose mentions were all excluded
    #[arg(long)]
    pub keep_unlinked_sentences: bool,

    /// Candidate cap per alias
    #[arg(short = 'k', long, value_name = "N")]
    pub max_candidates: Option<usize>,

    /// Keep mentions whose entity is not among their alias' candidates
    #[arg(long)]
    pub no_train_in_candidates: bool,

    /// Keep every raw entity title after pruning
    #[arg(long, visible_alias = "no-filter-entities-cand")]
    pub retain_all_entities: bool,

    /// JSON list of protected entity ids
    #[arg(long, value_name = "PATH")]
    pub benchmark_qids: Option<PathBuf>,

    /// Worker pool size
    #[arg(short, long, value_name = "N")]
    pub processes: Option<usize>,

    /// Files in flight per worker
    #[arg(long, value_name = "N")]
    pub in_flight_per_worker: Option<usize>,

    /// Show progress bars
    #[arg(long)]
    pub progress: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

impl FilterArgs {
    /// The configuration file (or defaults) with flag overrides applied.
    pub fn resolve_config(&self) -> Result<PipelineConfig, String> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)
                .map_err(|e| format_error("Reading config", e))?,
            None => PipelineConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(v) = &self.data_dir {
            config.data_dir = v.clone();
        }
        if let Some(v) = &self.orig_dir {
            config.orig_dir = v.clone();
        }
        if let Some(v) = &self.subfolder_name {
            config.subfolder_name = v.clone();
        }
        if let Some(v) = &self.sentence_filter {
            config.sentence_filter = v.clone();
        }
        if let Some(v) = &self.filter_file {
            config.filter_file = Some(v.clone());
        }
        if let Some(v) = &self.disambig_file {
            config.disambig_file = Some(v.clone());
        }
        if let Some(v) = &self.benchmark_qids {
            config.benchmark_qids = Some(v.clone());
        }
        if let Some(v) = self.max_candidates {
            config.max_candidates = v;
        }
        if let Some(v) = self.processes {
            config.processes = v;
        }
        if let Some(v) = self.in_flight_per_worker {
            config.in_flight_per_worker = v;
        }
        // Switches only ever move away from the default.
        if self.no_filter_disambig {
            config.filter_disambig_entities = false;
        }
        if self.detect_disambig_titles {
            config.detect_disambig_titles = true;
        }
        if self.keep_unlinked_sentences {
            config.keep_unlinked_sentences = true;
        }
        if self.no_train_in_candidates {
            config.train_in_candidates = false;
        }
        if self.retain_all_entities {
            config.retain_all_entities = true;
        }
        if self.progress {
            config.progress = true;
        }
    }
}

/// Run the pipeline and print its report.
pub fn run(args: FilterArgs) -> Result<(), String> {
    let config = args.resolve_config()?;
    let output_dir = config.output_dir();
    let pipeline = Pipeline::new(config).map_err(|e| format_error("Checking config", e))?;
    let report = pipeline.run().map_err(|e| format_error("Filtering", e))?;

    match args.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Human => {
            print_report(&report);
            println!("{} Output: {}", color("32", "✓"), output_dir.display());
            Ok(())
        }
    }
}

fn print_report(report: &PipelineReport) {
    println!("Files:       {}", report.files);
    println!("Documents:   {}", report.documents);
    println!(
        "Sentences:   {} read, {} after stage 1",
        report.sentences_read, report.sentences_after_stage1
    );
    println!(
        "Aliases:     {} observed, {} retained of {}",
        report.observed_aliases, report.rebuild.retained_aliases, report.rebuild.raw_aliases
    );
    println!(
        "Entities:    {} retained of {} ({} over cap)",
        report.rebuild.retained_entities, report.rebuild.raw_entities, report.rebuild.entities_over_cap
    );
    println!(
        "Mentions:    {} seen, {} kept, {} dropped",
        report.recall.total_mentions, report.recall.total_preserved, report.recall.total_dropped
    );
    if report.discards.total() > 0 {
        println!("Discards:");
        for (reason, n) in report.discards.iter() {
            println!("  {:<18} {}", reason, n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = FilterArgs::parse_from([
            "filter",
            "--data-dir",
            "/tmp/wiki",
            "-k",
            "5",
            "--no-train-in-candidates",
            "--no-filter-entities-cand",
        ]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/wiki"));
        assert_eq!(config.max_candidates, 5);
        assert!(!config.train_in_candidates);
        assert!(config.retain_all_entities);
        assert_eq!(config.processes, PipelineConfig::default().processes);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filter.toml");
        std::fs::write(&path, "max_candidates = 7\nprocesses = 3\n").unwrap();
        let args = FilterArgs::parse_from([
            "filter",
            "--config",
            path.to_str().unwrap(),
            "--processes",
            "2",
        ]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.max_candidates, 7);
        assert_eq!(config.processes, 2);
    }
}
