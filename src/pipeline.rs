//! End-to-end filter run.
//!
//! ```text
//! raw documents ──stage 1 (parallel)──▶ filter_temp/*.jsonl + observed aliases
//! observed aliases + raw index ──rebuild──▶ pruned index
//! filter_temp/*.jsonl ──stage 2 (parallel, pruned index)──▶ filtered corpus + stats
//! ```
//!
//! The raw and pruned indexes are read-only while a stage runs; the only
//! global state is built by the single-threaded merge after each stage.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::filter::stage2::reconcile;
use crate::filter::{
    read_string_list, SentenceFilter, Stage1Filter, Stage1Partial, Stage2Filter, Stage2Partial,
};
use crate::index::CandidateIndex;
use crate::parallel::ParallelExecutor;
use crate::rebuild::{IndexRebuilder, RebuildReport};
use crate::stats::{DiscardTally, Merge, RecallStats};

/// Gold and augmented alias/entity counts.
pub const WITH_AUGMENT_FILE: &str = "alias_qid_alldata_withaugment.json";
/// Gold-only alias/entity counts.
pub const WITHOUT_AUGMENT_FILE: &str = "alias_qid_alldata_withoutaugment.json";
/// Mention reconciliation totals.
pub const RECALL_FILE: &str = "recall_stats.json";
/// Discard counts of both stages.
pub const DISCARD_FILE: &str = "discard_counts.json";
/// Rebuild diagnostics.
pub const REBUILD_FILE: &str = "rebuild_report.json";

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Input files.
    pub files: usize,
    /// Documents read by the first stage.
    pub documents: u64,
    /// Sentences read by the first stage.
    pub sentences_read: u64,
    /// Sentences the first stage passed on.
    pub sentences_after_stage1: u64,
    /// Distinct aliases the first stage emitted.
    pub observed_aliases: usize,
    /// Index rebuild diagnostics.
    pub rebuild: RebuildReport,
    /// Mention totals of the second stage.
    pub recall: RecallStats,
    /// Discards of both stages.
    pub discards: DiscardTally,
}

/// One configured filter run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate `config` and prepare a run.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The run's configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run both stages and the rebuild, writing every output.
    ///
    /// Existing output and scratch directories are replaced.
    pub fn run(&self) -> Result<PipelineReport> {
        let cfg = &self.config;
        log::info!("Loading raw index from {}", cfg.input_index_dir().display());
        let raw_index = CandidateIndex::load(&cfg.input_index_dir())?;

        let files = list_jsonl(&cfg.input_dir())?;
        if files.is_empty() {
            log::warn!("No *.jsonl files in {}", cfg.input_dir().display());
        }
        log::info!("Found {} input files in {}", files.len(), cfg.input_dir().display());

        let temp_dir = cfg.temp_dir();
        let out_dir = cfg.output_dir();
        let stats_dir = cfg.stats_dir();
        fresh_dir(&temp_dir)?;
        fresh_dir(&out_dir)?;
        fs::create_dir_all(&stats_dir)?;
        cfg.save_json(&cfg.saved_config_path())?;

        let executor = ParallelExecutor::new(cfg.processes)?
            .with_in_flight_per_worker(cfg.in_flight_per_worker)
            .with_progress(cfg.progress);

        // Stage 1
        let stage1 = self.stage1_filter(&raw_index)?;
        let first: Stage1Partial = executor.run("stage 1", &files, |_, input| {
            stage1.process_file(input, &temp_dir.join(output_file_name(input)?))
        })?;
        log::info!(
            "Stage 1 kept {} of {} sentences; {} distinct aliases",
            first.sentences_written,
            first.sentences_read,
            first.observed.len()
        );

        // Rebuild
        let protected = match &cfg.benchmark_qids {
            Some(path) => read_id_set(path)?,
            None => HashSet::new(),
        };
        log::info!("Loaded {} protected entities", protected.len());
        let (pruned, rebuild) = IndexRebuilder::new(&raw_index, cfg.max_candidates)
            .with_protected(protected)
            .with_retain_all_entities(cfg.retain_all_entities)
            .rebuild(&first.observed)?;
        drop(raw_index);
        pruned.save(&cfg.output_index_dir())?;

        // Stage 2
        let stage2_inputs = list_jsonl(&temp_dir)?;
        let stage2 = Stage2Filter::new(&pruned).with_train_in_candidates(cfg.train_in_candidates);
        let second: Stage2Partial = executor.run("stage 2", &stage2_inputs, |_, input| {
            stage2.process_file(input, &out_dir.join(output_file_name(input)?))
        })?;
        reconcile(&out_dir, &second.recall)?;

        write_json(&stats_dir.join(WITH_AUGMENT_FILE), &second.statistics.with_augment())?;
        write_json(
            &stats_dir.join(WITHOUT_AUGMENT_FILE),
            second.statistics.without_augment(),
        )?;
        write_json(&stats_dir.join(RECALL_FILE), &second.recall)?;
        write_json(&stats_dir.join(REBUILD_FILE), &rebuild)?;

        let mut discards = first.discards;
        discards.merge(second.discards);
        write_json(&stats_dir.join(DISCARD_FILE), &discards)?;
        for (reason, n) in discards.iter() {
            log::info!("discarded {:>10} {}", n, reason);
        }

        fs::remove_dir_all(&temp_dir)?;
        log::info!(
            "Done: {} mentions, {} preserved, {} dropped. Output in {}",
            second.recall.total_mentions,
            second.recall.total_preserved,
            second.recall.total_dropped,
            out_dir.display()
        );

        Ok(PipelineReport {
            files: files.len(),
            documents: first.documents,
            sentences_read: first.sentences_read,
            sentences_after_stage1: first.sentences_written,
            observed_aliases: first.observed.len(),
            rebuild,
            recall: second.recall,
            discards,
        })
    }

    fn stage1_filter(&self, raw_index: &CandidateIndex) -> Result<Stage1Filter> {
        let cfg = &self.config;
        let predicate = SentenceFilter::load(cfg.predicate()?, cfg.filter_file.as_deref())?;

        let mut disambiguation = match &cfg.disambig_file {
            Some(path) => read_id_set(path)?,
            None => HashSet::new(),
        };
        if cfg.detect_disambig_titles {
            disambiguation.extend(raw_index.disambiguation_entities());
        }
        log::info!("{} disambiguation entities", disambiguation.len());

        Ok(Stage1Filter::new(Box::new(predicate))
            .with_disambiguation(disambiguation)
            .with_filter_disambiguation(cfg.filter_disambig_entities)
            .with_keep_unlinked_sentences(cfg.keep_unlinked_sentences))
    }
}

/// Output file name for an input file: its stem with a `.jsonl` extension.
///
/// Depends only on the input path, so reruns produce the same layout
/// regardless of scheduling.
pub fn output_file_name(input: &Path) -> Result<String> {
    input
        .file_stem()
        .map(|stem| format!("{}.jsonl", stem.to_string_lossy()))
        .ok_or_else(|| Error::invalid_input(format!("no file name in {}", input.display())))
}

/// `*.jsonl` files directly inside `dir`, sorted.
pub fn list_jsonl(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.jsonl", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| Error::config(format!("{}: {}", pattern, e)))? {
        files.push(entry.map_err(|e| Error::Io(e.into()))?);
    }
    files.sort();
    Ok(files)
}

fn read_id_set(path: &Path) -> Result<HashSet<String>> {
    Ok(read_string_list(path)?.into_iter().collect())
}

fn fresh_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        log::info!("Removing old {}", dir.display());
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_string(value)?)?;
    Ok(())
}
