//! First filter stage: per-document filtering.
//!
//! Reads raw document lines, writes one [`SentenceRecord`] per surviving
//! sentence, and returns the aliases it emitted so the index can be
//! rebuilt from what the corpus actually uses.
//!
//! Per sentence, in order:
//! 1. structural validation (`malformed`)
//! 2. last span must start inside the text (`span_issue`)
//! 3. the sentence predicate (`filter_func`)
//! 4. mentions whose alias normalizes to nothing are dropped (`len_zero_alias`)
//! 5. mentions of disambiguation entities are dropped; a sentence emptied
//!    by this is discarded (`disambig_only`) unless unlinked sentences are
//!    kept
//!
//! Emitted aliases are normalized keys.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::filter::SentencePredicate;
use crate::normalize::normalize;
use crate::record::{RawDocument, RawSentence, SentenceRecord};
use crate::stats::{reason, AliasObservationSet, DiscardTally, Merge};

/// Partial result of one Stage 1 worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stage1Partial {
    /// Normalized aliases of emitted mentions.
    pub observed: AliasObservationSet,
    /// Why sentences or mentions were removed.
    pub discards: DiscardTally,
    /// Documents read.
    pub documents: u64,
    /// Sentences read.
    pub sentences_read: u64,
    /// Sentences written.
    pub sentences_written: u64,
}

impl Merge for Stage1Partial {
    fn merge(&mut self, other: Self) {
        self.observed.merge(other.observed);
        self.discards.merge(other.discards);
        self.documents += other.documents;
        self.sentences_read += other.sentences_read;
        self.sentences_written += other.sentences_written;
    }
}

/// Per-document sentence filter.
pub struct Stage1Filter {
    predicate: Box<dyn SentencePredicate>,
    disambiguation: HashSet<String>,
    filter_disambiguation: bool,
    keep_unlinked_sentences: bool,
}

impl Stage1Filter {
    /// Filter with the given predicate and no disambiguation entities.
    pub fn new(predicate: Box<dyn SentencePredicate>) -> Self {
        Self {
            predicate,
            disambiguation: HashSet::new(),
            filter_disambiguation: true,
            keep_unlinked_sentences: false,
        }
    }

    /// Entities whose mentions are excluded.
    #[must_use]
    pub fn with_disambiguation(mut self, entities: HashSet<String>) -> Self {
        self.disambiguation = entities;
        self
    }

    /// Toggle the disambiguation exclusion.
    #[must_use]
    pub fn with_filter_disambiguation(mut self, enabled: bool) -> Self {
        self.filter_disambiguation = enabled;
        self
    }

    /// Keep sentences whose mentions were all excluded.
    #[must_use]
    pub fn with_keep_unlinked_sentences(mut self, keep: bool) -> Self {
        self.keep_unlinked_sentences = keep;
        self
    }

    /// Filter one validated sentence.
    ///
    /// Returns the sentence to emit, or `None` after tallying the reason
    /// it was discarded. Emitted aliases are added to `partial.observed`.
    pub fn filter_sentence(
        &self,
        mut record: SentenceRecord,
        partial: &mut Stage1Partial,
    ) -> Option<SentenceRecord> {
        if let Some(last) = record.spans.last() {
            if last.start >= record.word_count() {
                log::debug!(
                    "span_issue: sentence {} of {} has span {} past {} words",
                    record.sentence_index,
                    record.parent_entity_id,
                    last,
                    record.word_count()
                );
                partial.discards.bump(reason::SPAN_ISSUE);
                return None;
            }
        }

        if self
            .predicate
            .discard(&record.aliases, &record.entity_ids, &record.sentence)
        {
            partial.discards.bump(reason::FILTER_FUNC);
            return None;
        }

        let had_mentions = record.num_mentions() > 0;
        let mut excluded_disambiguation = false;
        let mut kept = Vec::with_capacity(record.num_mentions());
        for mut mention in record.mentions() {
            let key = normalize(&mention.alias);
            if key.is_empty() {
                partial.discards.bump(reason::LEN_ZERO_ALIAS);
                continue;
            }
            if self.filter_disambiguation && self.disambiguation.contains(&mention.entity_id) {
                excluded_disambiguation = true;
                continue;
            }
            mention.alias = key;
            kept.push(mention);
        }

        if kept.is_empty() && !self.keep_unlinked_sentences {
            // Sentences that arrived without mentions are not
            // disambiguation drops.
            let why = if excluded_disambiguation {
                reason::DISAMBIG_ONLY
            } else if had_mentions {
                reason::LEN_ZERO_ALIAS
            } else {
                reason::NO_MENTIONS
            };
            partial.discards.bump(why);
            return None;
        }

        for mention in &kept {
            partial.observed.observe(mention.alias.as_str());
        }
        record.set_mentions(kept);
        Some(record)
    }

    /// Filter every sentence of one raw document line, writing survivors.
    ///
    /// A line that is not a document is tallied as `malformed` and skipped.
    pub fn process_document<W: Write>(
        &self,
        line: &str,
        out: &mut W,
        partial: &mut Stage1Partial,
    ) -> Result<()> {
        let doc: RawDocument = match serde_json::from_str(line) {
            Ok(doc) => doc,
            Err(e) => {
                log::debug!("malformed document line: {}", e);
                partial.discards.bump(reason::MALFORMED);
                return Ok(());
            }
        };
        partial.documents += 1;

        for value in doc.sentences {
            partial.sentences_read += 1;
            let record = match RawSentence::from_value(value)
                .and_then(|s| s.into_record(&doc.qid, &doc.title))
            {
                Ok(record) => record,
                Err(e) if !e.is_fatal() => {
                    log::debug!("{}", e);
                    partial.discards.bump(reason::MALFORMED);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(kept) = self.filter_sentence(record, partial) {
                serde_json::to_writer(&mut *out, &kept)?;
                out.write_all(b"\n")?;
                partial.sentences_written += 1;
            }
        }
        Ok(())
    }

    /// Filter one document file end to end.
    pub fn process_file(&self, input: &Path, output: &Path) -> Result<Stage1Partial> {
        let reader = BufReader::new(File::open(input)?);
        let mut writer = BufWriter::new(File::create(output)?);
        let mut partial = Stage1Partial::default();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            self.process_document(&line, &mut writer, &mut partial)?;
        }
        writer.flush()?;

        log::debug!(
            "{}: {} documents, {} of {} sentences kept, {} aliases",
            input.display(),
            partial.documents,
            partial.sentences_written,
            partial.sentences_read,
            partial.observed.len()
        );
        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{PredicateName, SentenceFilter};
    use crate::record::Span;
    use serde_json::json;

    fn keep_all() -> Stage1Filter {
        Stage1Filter::new(Box::new(SentenceFilter::KeepAll))
    }

    fn run(filter: &Stage1Filter, doc: serde_json::Value) -> (Vec<SentenceRecord>, Stage1Partial) {
        let mut out = Vec::new();
        let mut partial = Stage1Partial::default();
        filter
            .process_document(&doc.to_string(), &mut out, &mut partial)
            .unwrap();
        let records = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (records, partial)
    }

    #[test]
    fn span_past_end_is_discarded() {
        let doc = json!({
            "qid": "Q100", "title": "Acme",
            "sentences": [{
                "doc_sent_idx": 0,
                "sentence": "one two three four five six seven",
                "aliases": ["acme"], "qids": ["Q1"], "spans": [[8, 9]]
            }]
        });
        let (records, partial) = run(&keep_all(), doc);
        assert!(records.is_empty());
        assert_eq!(partial.discards.get(reason::SPAN_ISSUE), 1);
        assert!(partial.observed.is_empty());
    }

    #[test]
    fn emits_normalized_aliases() {
        let doc = json!({
            "qid": "Q100", "title": "Acme",
            "sentences": [{
                "doc_sent_idx": 2,
                "sentence": "The Acme  Corp. builds rockets",
                "aliases": ["Acme  Corp."], "qids": ["Q1"], "spans": ["1:3"]
            }]
        });
        let (records, partial) = run(&keep_all(), doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].aliases, vec!["acme corp".to_string()]);
        assert_eq!(records[0].spans, vec![Span::new(1, 3)]);
        assert_eq!(records[0].parent_entity_id, "Q100");
        assert!(partial.observed.contains("acme corp"));
    }

    #[test]
    fn disambiguation_mentions_are_removed() {
        let filter = keep_all().with_disambiguation(["QD".to_string()].into_iter().collect());
        let doc = json!({
            "qid": "Q100", "title": "Acme",
            "sentences": [
                {"doc_sent_idx": 0, "sentence": "Mercury and Venus",
                 "aliases": ["mercury", "venus"], "qids": ["QD", "Q2"], "spans": [[0, 1], [2, 3]]},
                {"doc_sent_idx": 1, "sentence": "Mercury again",
                 "aliases": ["mercury"], "qids": ["QD"], "spans": [[0, 1]]}
            ]
        });
        let (records, partial) = run(&filter, doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_ids, vec!["Q2".to_string()]);
        assert_eq!(partial.discards.get(reason::DISAMBIG_ONLY), 1);
        assert!(!partial.observed.contains("mercury"));
    }

    #[test]
    fn disambiguation_toggle_and_keep_unlinked() {
        let doc = json!({
            "qid": "Q100", "title": "Acme",
            "sentences": [{"sentence": "Mercury again",
                "aliases": ["mercury"], "qids": ["QD"], "spans": [[0, 1]]}]
        });
        let disambig: HashSet<String> = ["QD".to_string()].into_iter().collect();

        let off = keep_all()
            .with_disambiguation(disambig.clone())
            .with_filter_disambiguation(false);
        assert_eq!(run(&off, doc.clone()).0.len(), 1);

        let keep = keep_all()
            .with_disambiguation(disambig)
            .with_keep_unlinked_sentences(true);
        let (records, _) = run(&keep, doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].num_mentions(), 0);
    }

    #[test]
    fn sentence_without_mentions_is_tallied_separately() {
        let doc = json!({
            "qid": "Q100", "title": "Acme",
            "sentences": [{"sentence": "Nothing linked here"}]
        });
        let (records, partial) = run(&keep_all(), doc.clone());
        assert!(records.is_empty());
        assert_eq!(partial.discards.get(reason::NO_MENTIONS), 1);
        assert_eq!(partial.discards.get(reason::EMPTY_SENTENCE), 0);

        let (records, _) = run(&keep_all().with_keep_unlinked_sentences(true), doc);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn predicate_discards_are_tallied() {
        let filter = Stage1Filter::new(Box::new(SentenceFilter::new(
            PredicateName::EntityIds,
            vec!["Q9".to_string()],
        )));
        let doc = json!({
            "qid": "Q100", "title": "Acme",
            "sentences": [
                {"sentence": "Acme", "aliases": ["acme"], "qids": ["Q1"], "spans": [[0, 1]]},
                {"sentence": "Zeta", "aliases": ["zeta"], "qids": ["Q9"], "spans": [[0, 1]]}
            ]
        });
        let (records, partial) = run(&filter, doc);
        assert_eq!(records.len(), 1);
        assert_eq!(partial.discards.get(reason::FILTER_FUNC), 1);
    }

    #[test]
    fn empty_alias_mentions_are_dropped() {
        let doc = json!({
            "qid": "Q100", "title": "Acme",
            "sentences": [{"sentence": "-- Acme",
                "aliases": ["--", "acme"], "qids": ["Q5", "Q1"], "spans": [[0, 1], [1, 2]]}]
        });
        let (records, partial) = run(&keep_all(), doc);
        assert_eq!(records[0].aliases, vec!["acme".to_string()]);
        assert_eq!(partial.discards.get(reason::LEN_ZERO_ALIAS), 1);
    }

    #[test]
    fn malformed_input_is_skipped() {
        let doc = json!({
            "qid": "Q100", "title": "Acme",
            "sentences": [
                {"sentence": "Acme", "aliases": ["acme"], "qids": [], "spans": [[0, 1]]},
                {"sentence": "Acme", "aliases": ["acme"], "qids": ["Q1"], "spans": [[0, 1]]}
            ]
        });
        let (records, partial) = run(&keep_all(), doc);
        assert_eq!(records.len(), 1);
        assert_eq!(partial.discards.get(reason::MALFORMED), 1);
        assert_eq!(partial.sentences_read, 2);

        let mut partial = Stage1Partial::default();
        keep_all()
            .process_document("not json", &mut Vec::<u8>::new(), &mut partial)
            .unwrap();
        assert_eq!(partial.discards.get(reason::MALFORMED), 1);
        assert_eq!(partial.documents, 0);
    }

    #[test]
    fn process_file_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.jsonl");
        let output = dir.path().join("out.jsonl");
        let doc = json!({
            "qid": "Q100", "title": "Acme",
            "sentences": [{"sentence": "Acme", "aliases": ["acme"], "qids": ["Q1"], "spans": [[0, 1]]}]
        });
        std::fs::write(&input, format!("{}\n\n{}\n", doc, doc)).unwrap();
        let partial = keep_all().process_file(&input, &output).unwrap();
        assert_eq!(partial.documents, 2);
        assert_eq!(partial.sentences_written, 2);
        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
