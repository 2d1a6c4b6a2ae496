//! Corpus record types.
//!
//! Two line-delimited JSON shapes flow through the pipeline:
//!
//! - [`RawDocument`]: one document per line, with nested sentences, as
//!   produced by upstream dump extraction. Read leniently.
//! - [`SentenceRecord`]: one sentence per line with parallel mention
//!   arrays. Written by the first filter stage, read and re-written by the
//!   second.
//!
//! Mentions are stored column-wise on disk (`aliases`, `entity_ids`,
//! `spans`, `gold`, `sources`) and handled row-wise in code as [`Mention`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Half-open `[start, end)` word-offset interval.
///
/// Serialized as `[start, end]`; also accepts the `"start:end"` string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SpanRepr", into = "[usize; 2]")]
pub struct Span {
    /// First word (inclusive).
    pub start: usize,
    /// Last word (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a span.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Whether two spans share at least one word.
    #[must_use]
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpanRepr {
    Pair([usize; 2]),
    Text(String),
}

impl TryFrom<SpanRepr> for Span {
    type Error = String;

    fn try_from(repr: SpanRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            SpanRepr::Pair([start, end]) => Ok(Span::new(start, end)),
            SpanRepr::Text(s) => {
                let (l, r) = s
                    .split_once(':')
                    .ok_or_else(|| format!("span {:?} is not start:end", s))?;
                let start = l.trim().parse().map_err(|_| format!("bad span start {:?}", s))?;
                let end = r.trim().parse().map_err(|_| format!("bad span end {:?}", s))?;
                Ok(Span::new(start, end))
            }
        }
    }
}

impl From<Span> for [usize; 2] {
    fn from(s: Span) -> Self {
        [s.start, s.end]
    }
}

/// One mention row.
#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    /// Alias key as written in the record.
    pub alias: String,
    /// Labelled entity.
    pub entity_id: String,
    /// Word span in the sentence text.
    pub span: Span,
    /// Whether the label is ground truth rather than augmentation.
    pub gold: bool,
    /// Where the mention came from (e.g. `"gold"`).
    pub source: String,
}

/// Default source tag for mentions without one.
pub const GOLD_SOURCE: &str = "gold";

/// A document line of the raw corpus.
///
/// Sentences are kept as raw JSON so one bad sentence does not discard
/// the whole document.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDocument {
    /// Entity id of the page the document came from.
    #[serde(alias = "parent_entity_id", alias = "parent_qid")]
    pub qid: String,
    /// Title of that page.
    #[serde(alias = "parent_title")]
    pub title: String,
    /// Unparsed sentences.
    #[serde(default)]
    pub sentences: Vec<serde_json::Value>,
}

/// A sentence inside a [`RawDocument`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawSentence {
    /// Position of the sentence in its document.
    #[serde(default, alias = "sentence_index")]
    pub doc_sent_idx: usize,
    /// Sentence text.
    #[serde(alias = "text")]
    pub sentence: String,
    /// Mention aliases.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Mention entity ids.
    #[serde(default, alias = "qids")]
    pub entity_ids: Vec<String>,
    /// Mention spans.
    #[serde(default)]
    pub spans: Vec<Span>,
    /// Gold flags.
    #[serde(default)]
    pub gold: Option<Vec<bool>>,
    /// Older name for the gold flags.
    #[serde(default)]
    pub anchor: Option<Vec<bool>>,
    /// Source tags.
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

impl RawSentence {
    /// Parse one sentence value of a [`RawDocument`].
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::malformed(e.to_string()))
    }

    /// Convert to a [`SentenceRecord`] under the given parent.
    ///
    /// Missing gold flags default to `true` and missing sources to
    /// `"gold"`; the record is then validated.
    pub fn into_record(self, parent_entity_id: &str, parent_title: &str) -> Result<SentenceRecord> {
        let n = self.aliases.len();
        let gold = self.gold.or(self.anchor).unwrap_or_else(|| vec![true; n]);
        let sources = self
            .sources
            .unwrap_or_else(|| vec![GOLD_SOURCE.to_string(); n]);
        let record = SentenceRecord {
            parent_entity_id: parent_entity_id.to_string(),
            parent_title: parent_title.to_string(),
            sentence_index: self.doc_sent_idx,
            sentence: self.sentence,
            aliases: self.aliases,
            entity_ids: self.entity_ids,
            spans: self.spans,
            gold,
            sources,
        };
        record.validate()?;
        Ok(record)
    }
}

/// One sentence with its mentions, in the filtered corpus format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceRecord {
    /// Entity id of the page the sentence came from.
    #[serde(alias = "parent_qid")]
    pub parent_entity_id: String,
    /// Title of that page.
    pub parent_title: String,
    /// Position of the sentence in its document.
    #[serde(alias = "doc_sent_idx")]
    pub sentence_index: usize,
    /// Sentence text.
    pub sentence: String,
    /// Mention aliases.
    pub aliases: Vec<String>,
    /// Mention entity ids.
    #[serde(alias = "qids")]
    pub entity_ids: Vec<String>,
    /// Mention spans.
    pub spans: Vec<Span>,
    /// Gold flags.
    pub gold: Vec<bool>,
    /// Source tags.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl SentenceRecord {
    /// Number of mentions.
    #[must_use]
    pub fn num_mentions(&self) -> usize {
        self.entity_ids.len()
    }

    /// Number of whitespace-separated words in the text.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.sentence.split_whitespace().count()
    }

    /// Check the structural invariants.
    ///
    /// All mention arrays have equal length, every span is non-empty, span
    /// starts never decrease, and gold spans do not overlap.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedRecord`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let n = self.aliases.len();
        let lengths = [
            self.entity_ids.len(),
            self.spans.len(),
            self.gold.len(),
            self.sources.len(),
        ];
        if lengths.iter().any(|&l| l != n) {
            return Err(Error::malformed(format!(
                "sentence {} of {}: mention arrays differ in length (aliases {}, entity_ids {}, spans {}, gold {}, sources {})",
                self.sentence_index, self.parent_entity_id, n, lengths[0], lengths[1], lengths[2], lengths[3]
            )));
        }
        if let Some(bad) = self.spans.iter().find(|s| s.start >= s.end) {
            return Err(Error::malformed(format!(
                "sentence {} of {}: empty span {}",
                self.sentence_index, self.parent_entity_id, bad
            )));
        }
        if self.spans.windows(2).any(|w| w[1].start < w[0].start) {
            return Err(Error::malformed(format!(
                "sentence {} of {}: spans out of order",
                self.sentence_index, self.parent_entity_id
            )));
        }
        let gold_spans: Vec<&Span> = self
            .spans
            .iter()
            .zip(&self.gold)
            .filter(|(_, g)| **g)
            .map(|(s, _)| s)
            .collect();
        if gold_spans.windows(2).any(|w| w[0].overlaps(w[1])) {
            return Err(Error::malformed(format!(
                "sentence {} of {}: overlapping gold spans",
                self.sentence_index, self.parent_entity_id
            )));
        }
        Ok(())
    }

    /// The mentions as rows.
    #[must_use]
    pub fn mentions(&self) -> Vec<Mention> {
        (0..self.num_mentions())
            .map(|i| Mention {
                alias: self.aliases[i].clone(),
                entity_id: self.entity_ids[i].clone(),
                span: self.spans[i],
                gold: self.gold[i],
                source: self.sources[i].clone(),
            })
            .collect()
    }

    /// Replace all mentions, keeping the sentence header and text.
    pub fn set_mentions(&mut self, mentions: Vec<Mention>) {
        self.aliases.clear();
        self.entity_ids.clear();
        self.spans.clear();
        self.gold.clear();
        self.sources.clear();
        for m in mentions {
            self.aliases.push(m.alias);
            self.entity_ids.push(m.entity_id);
            self.spans.push(m.span);
            self.gold.push(m.gold);
            self.sources.push(m.source);
        }
    }
}
