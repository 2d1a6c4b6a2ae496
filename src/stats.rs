//! Per-worker accumulators and their order-independent merge.
//!
//! Every partial result produced in a map phase implements [`Merge`]. Merges
//! are commutative and associative (set union, integer addition), so the
//! reduce step yields the same totals whatever order workers finish in.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Combine another partial result into this one.
pub trait Merge {
    /// Fold `other` into `self`.
    fn merge(&mut self, other: Self);
}

/// Normalized alias keys seen by the first filter stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasObservationSet {
    aliases: BTreeSet<String>,
}

impl AliasObservationSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an alias key.
    pub fn observe(&mut self, alias: impl Into<String>) {
        self.aliases.insert(alias.into());
    }

    /// Whether `alias` was observed.
    #[must_use]
    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.contains(alias)
    }

    /// Number of distinct aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// True when nothing was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Observed aliases in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AliasObservationSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            aliases: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl Merge for AliasObservationSet {
    fn merge(&mut self, other: Self) {
        if self.aliases.is_empty() {
            self.aliases = other.aliases;
        } else {
            self.aliases.extend(other.aliases);
        }
    }
}

/// `alias → entity_id → count`.
pub type AliasEntityCounts = BTreeMap<String, BTreeMap<String, u64>>;

fn add_counts(into: &mut AliasEntityCounts, from: &AliasEntityCounts) {
    for (alias, entities) in from {
        let slot = into.entry(alias.clone()).or_default();
        for (entity, n) in entities {
            *slot.entry(entity.clone()).or_insert(0) += n;
        }
    }
}

/// Mention counts keyed by gold flag, alias and entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsAccumulator {
    /// Counts of gold mentions.
    gold: AliasEntityCounts,
    /// Counts of augmented (non-gold) mentions.
    augmented: AliasEntityCounts,
}

impl StatisticsAccumulator {
    /// Empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one kept mention.
    pub fn record(&mut self, gold: bool, alias: &str, entity_id: &str) {
        let side = if gold { &mut self.gold } else { &mut self.augmented };
        *side
            .entry(alias.to_string())
            .or_default()
            .entry(entity_id.to_string())
            .or_insert(0) += 1;
    }

    /// Count for one `(gold, alias, entity)` cell.
    #[must_use]
    pub fn count(&self, gold: bool, alias: &str, entity_id: &str) -> u64 {
        let side = if gold { &self.gold } else { &self.augmented };
        side.get(alias)
            .and_then(|m| m.get(entity_id))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all cells.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.gold
            .values()
            .chain(self.augmented.values())
            .flat_map(BTreeMap::values)
            .sum()
    }

    /// Gold-only counts.
    #[must_use]
    pub fn without_augment(&self) -> &AliasEntityCounts {
        &self.gold
    }

    /// Gold and augmented counts added together.
    #[must_use]
    pub fn with_augment(&self) -> AliasEntityCounts {
        let mut all = self.gold.clone();
        add_counts(&mut all, &self.augmented);
        all
    }
}

impl Merge for StatisticsAccumulator {
    fn merge(&mut self, other: Self) {
        add_counts(&mut self.gold, &other.gold);
        add_counts(&mut self.augmented, &other.augmented);
    }
}

/// Discard reasons.
pub mod reason {
    /// Sentence failed structural validation.
    pub const MALFORMED: &str = "malformed";
    /// Last mention starts at or past the word count.
    pub const SPAN_ISSUE: &str = "span_issue";
    /// Sentence predicate asked to discard.
    pub const FILTER_FUNC: &str = "filter_func";
    /// Every mention pointed at a disambiguation entity.
    pub const DISAMBIG_ONLY: &str = "disambig_only";
    /// Mention alias normalized to nothing.
    pub const LEN_ZERO_ALIAS: &str = "len_zero_alias";
    /// Entity not among the alias' surviving candidates.
    pub const NOT_IN_CANDIDATES: &str = "not_in_candidates";
    /// Entity has no surviving title.
    pub const NO_TITLE: &str = "no_title";
    /// Second stage removed every mention of the sentence.
    pub const EMPTY_SENTENCE: &str = "empty_sentence";
    /// Sentence arrived at the first stage without mentions.
    pub const NO_MENTIONS: &str = "no_mentions";
}

/// Per-reason discard counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscardTally {
    counts: BTreeMap<String, u64>,
}

impl DiscardTally {
    /// Empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one discard.
    pub fn bump(&mut self, reason: &str) {
        self.add(reason, 1);
    }

    /// Count `n` discards.
    pub fn add(&mut self, reason: &str, n: u64) {
        if n > 0 {
            *self.counts.entry(reason.to_string()).or_insert(0) += n;
        }
    }

    /// Discards for one reason.
    #[must_use]
    pub fn get(&self, reason: &str) -> u64 {
        self.counts.get(reason).copied().unwrap_or(0)
    }

    /// All discards.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// `(reason, count)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(r, n)| (r.as_str(), *n))
    }
}

impl Merge for DiscardTally {
    fn merge(&mut self, other: Self) {
        for (reason, n) in other.counts {
            *self.counts.entry(reason).or_insert(0) += n;
        }
    }
}

/// Mention reconciliation counts of the second filter stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallStats {
    /// Mentions read.
    pub total_mentions: u64,
    /// Mentions written.
    pub total_preserved: u64,
    /// Mentions removed.
    pub total_dropped: u64,
}

impl RecallStats {
    /// `seen == kept + dropped`.
    #[must_use]
    pub fn is_reconciled(&self) -> bool {
        self.total_mentions == self.total_preserved + self.total_dropped
    }
}

impl Merge for RecallStats {
    fn merge(&mut self, other: Self) {
        self.total_mentions += other.total_mentions;
        self.total_preserved += other.total_preserved;
        self.total_dropped += other.total_dropped;
    }
}
