//! Second filter stage: corpus consistency against the pruned index.
//!
//! A mention survives when its entity still has a title and, in
//! consistency mode, is among its alias' surviving candidates. Sentences
//! left without mentions are dropped. Every surviving mention is counted
//! into a [`StatisticsAccumulator`].
//!
//! Each file is reconciled on its own: mentions read must equal mentions
//! kept plus mentions dropped, or the run fails with
//! [`Error::Reconciliation`].

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::index::CandidateIndex;
use crate::record::SentenceRecord;
use crate::stats::{reason, DiscardTally, Merge, RecallStats, StatisticsAccumulator};

/// Partial result of one Stage 2 worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stage2Partial {
    /// Counts of kept mentions.
    pub statistics: StatisticsAccumulator,
    /// Mention accounting.
    pub recall: RecallStats,
    /// Why mentions or sentences were removed.
    pub discards: DiscardTally,
}

impl Merge for Stage2Partial {
    fn merge(&mut self, other: Self) {
        self.statistics.merge(other.statistics);
        self.recall.merge(other.recall);
        self.discards.merge(other.discards);
    }
}

/// Consistency filter over a read-only pruned index.
pub struct Stage2Filter<'a> {
    index: &'a CandidateIndex,
    train_in_candidates: bool,
}

impl<'a> Stage2Filter<'a> {
    /// Filter against `index`, in consistency mode.
    pub fn new(index: &'a CandidateIndex) -> Self {
        Self {
            index,
            train_in_candidates: true,
        }
    }

    /// Toggle consistency mode. When off, only the title check applies.
    #[must_use]
    pub fn with_train_in_candidates(mut self, enabled: bool) -> Self {
        self.train_in_candidates = enabled;
        self
    }

    /// Filter one sentence, counting into `partial`.
    ///
    /// Returns the sentence with its surviving mentions, or `None` if this
    /// stage removed all of them. A sentence that arrives without mentions
    /// (kept unlinked by the first stage) passes through unchanged.
    pub fn filter_record(
        &self,
        mut record: SentenceRecord,
        partial: &mut Stage2Partial,
    ) -> Option<SentenceRecord> {
        let seen = record.num_mentions() as u64;
        if seen == 0 {
            return Some(record);
        }
        partial.recall.total_mentions += seen;

        let mut kept = Vec::with_capacity(record.num_mentions());
        for mention in record.mentions() {
            if self.train_in_candidates
                && !self.index.has_candidate(&mention.alias, &mention.entity_id)
            {
                partial.discards.bump(reason::NOT_IN_CANDIDATES);
                continue;
            }
            if !self.index.contains_entity(&mention.entity_id) {
                partial.discards.bump(reason::NO_TITLE);
                continue;
            }
            kept.push(mention);
        }

        let kept_count = kept.len() as u64;
        partial.recall.total_dropped += seen - kept_count;

        if kept.is_empty() {
            partial.discards.bump(reason::EMPTY_SENTENCE);
            return None;
        }

        for mention in &kept {
            partial
                .statistics
                .record(mention.gold, &mention.alias, &mention.entity_id);
        }
        partial.recall.total_preserved += kept_count;
        record.set_mentions(kept);
        Some(record)
    }

    /// Filter one sentence file end to end and reconcile it.
    ///
    /// Lines that do not parse or validate are tallied as `malformed` and
    /// do not enter the mention accounting.
    ///
    /// # Errors
    ///
    /// [`Error::Reconciliation`] if mentions read differ from mentions kept
    /// plus mentions dropped; I/O errors.
    pub fn process_file(&self, input: &Path, output: &Path) -> Result<Stage2Partial> {
        let reader = BufReader::new(File::open(input)?);
        let mut writer = BufWriter::new(File::create(output)?);
        let mut partial = Stage2Partial::default();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = match serde_json::from_str::<SentenceRecord>(&line)
                .map_err(|e| Error::malformed(e.to_string()))
                .and_then(|r| r.validate().map(|()| r))
            {
                Ok(record) => record,
                Err(e) => {
                    log::debug!("{}: {}", input.display(), e);
                    partial.discards.bump(reason::MALFORMED);
                    continue;
                }
            };
            if let Some(kept) = self.filter_record(record, &mut partial) {
                serde_json::to_writer(&mut writer, &kept)?;
                writer.write_all(b"\n")?;
            }
        }
        writer.flush()?;

        reconcile(input, &partial.recall)?;
        Ok(partial)
    }
}

/// Check `seen == kept + dropped` for one file.
pub fn reconcile(file: &Path, recall: &RecallStats) -> Result<()> {
    if recall.is_reconciled() {
        Ok(())
    } else {
        Err(Error::Reconciliation {
            file: file.display().to_string(),
            seen: recall.total_mentions,
            kept: recall.total_preserved,
            dropped: recall.total_dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Candidate;
    use crate::record::{Mention, Span};
    use std::collections::{HashMap, HashSet};

    fn index() -> CandidateIndex {
        let titles: HashMap<String, String> = [("Q1", "Acme"), ("Q2", "Acme Labs"), ("Q7", "Bench")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let full = CandidateIndex::build(
            vec![(
                "acme".to_string(),
                vec![
                    Candidate::new("Q1", 10.0),
                    Candidate::new("Q2", 5.0),
                    Candidate::new("Q7", 1.0),
                ],
            )],
            titles,
        )
        .unwrap();
        let retained: HashSet<String> = ["acme".to_string()].into_iter().collect();
        let protected: HashSet<String> = ["Q7".to_string()].into_iter().collect();
        full.prune(&retained, &protected, 2).unwrap()
    }

    fn sentence(mentions: &[(&str, &str, bool)]) -> SentenceRecord {
        let mut record = SentenceRecord {
            parent_entity_id: "Q100".into(),
            parent_title: "Doc".into(),
            sentence_index: 0,
            sentence: "acme acme acme acme".into(),
            aliases: vec![],
            entity_ids: vec![],
            spans: vec![],
            gold: vec![],
            sources: vec![],
        };
        record.set_mentions(
            mentions
                .iter()
                .enumerate()
                .map(|(i, (alias, entity, gold))| Mention {
                    alias: alias.to_string(),
                    entity_id: entity.to_string(),
                    span: Span::new(i, i + 1),
                    gold: *gold,
                    source: "gold".into(),
                })
                .collect(),
        );
        record
    }

    #[test]
    fn drops_mentions_outside_candidates() {
        let index = index();
        let filter = Stage2Filter::new(&index);
        let mut partial = Stage2Partial::default();
        let kept = filter
            .filter_record(
                sentence(&[("acme", "Q1", true), ("acme", "Q7", true), ("acme", "Q2", false)]),
                &mut partial,
            )
            .unwrap();
        assert_eq!(kept.entity_ids, vec!["Q1".to_string(), "Q2".to_string()]);
        assert_eq!(kept.spans, vec![Span::new(0, 1), Span::new(2, 3)]);
        assert_eq!(partial.discards.get(reason::NOT_IN_CANDIDATES), 1);
        assert_eq!(partial.statistics.count(true, "acme", "Q1"), 1);
        assert_eq!(partial.statistics.count(false, "acme", "Q2"), 1);
        assert_eq!(
            partial.recall,
            RecallStats {
                total_mentions: 3,
                total_preserved: 2,
                total_dropped: 1
            }
        );
    }

    #[test]
    fn title_check_without_consistency_mode() {
        let index = index();
        let filter = Stage2Filter::new(&index).with_train_in_candidates(false);
        let mut partial = Stage2Partial::default();
        let kept = filter
            .filter_record(
                sentence(&[("acme", "Q7", true), ("other", "Q404", true)]),
                &mut partial,
            )
            .unwrap();
        assert_eq!(kept.entity_ids, vec!["Q7".to_string()]);
        assert_eq!(partial.discards.get(reason::NO_TITLE), 1);
    }

    #[test]
    fn emptied_sentence_counts_all_mentions_as_dropped() {
        let index = index();
        let filter = Stage2Filter::new(&index);
        let mut partial = Stage2Partial::default();
        assert!(filter
            .filter_record(sentence(&[("zeta", "Q9", true), ("acme", "Q7", true)]), &mut partial)
            .is_none());
        assert_eq!(partial.discards.get(reason::EMPTY_SENTENCE), 1);
        assert_eq!(partial.recall.total_dropped, 2);
        assert!(partial.recall.is_reconciled());
    }

    #[test]
    fn unlinked_sentence_passes_through() {
        let index = index();
        let filter = Stage2Filter::new(&index);
        let mut partial = Stage2Partial::default();
        let kept = filter.filter_record(sentence(&[]), &mut partial).unwrap();
        assert_eq!(kept.num_mentions(), 0);
        assert_eq!(partial.discards.total(), 0);
        assert_eq!(partial.recall, RecallStats::default());
        assert!(partial.recall.is_reconciled());
    }

    #[test]
    fn process_file_reconciles_and_skips_malformed() {
        let index = index();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("part.jsonl");
        let output = dir.path().join("out.jsonl");
        let good = serde_json::to_string(&sentence(&[("acme", "Q1", true), ("acme", "Q7", true)]))
            .unwrap();
        let mut bad = sentence(&[("acme", "Q1", true)]);
        bad.gold.clear();
        let bad = serde_json::to_string(&bad).unwrap();
        std::fs::write(&input, format!("{}\n{}\n{{oops\n", good, bad)).unwrap();

        let partial = Stage2Filter::new(&index).process_file(&input, &output).unwrap();
        assert_eq!(partial.discards.get(reason::MALFORMED), 2);
        assert_eq!(partial.recall.total_mentions, 2);
        assert_eq!(partial.recall.total_preserved, 1);
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written.lines().count(), 1);
    }

    #[test]
    fn reconcile_reports_mismatch() {
        let recall = RecallStats {
            total_mentions: 4,
            total_preserved: 2,
            total_dropped: 1,
        };
        let err = reconcile(Path::new("part.jsonl"), &recall).unwrap_err();
        assert!(matches!(err, Error::Reconciliation { seen: 4, .. }));
    }
}
