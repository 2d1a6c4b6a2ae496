//! The alias → candidate-entity index.
//!
//! A [`CandidateIndex`] maps normalized alias keys to score-ordered candidate
//! lists and entity ids to display titles. It is immutable once built:
//! pruning produces a new index, it never edits one in place, so a built
//! index can be shared read-only by every worker of a map phase.
//!
//! Invariants held by every constructed index:
//! - each candidate list is non-empty, sorted by descending score and free
//!   of duplicate entity ids
//! - every entity in any candidate list has a title
//! - `max_candidates` and `max_alias_len` are exact maxima of the contents
//!
//! # Persisted layout
//!
//! An index directory holds three JSON files:
//!
//! ```text
//! alias2qids.json   {"alias": [["Q1", 10.0], ["Q2", 5.0]], ...}
//! qid2title.json    {"Q1": "Title", ...}
//! config.json       {"max_candidates": 2, "max_alias_len": 1}
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::normalize::{alias_word_count, normalize};

/// Alias map file name inside an index directory.
pub const ALIAS_FILE: &str = "alias2qids.json";
/// Title map file name inside an index directory.
pub const TITLE_FILE: &str = "qid2title.json";
/// Scalar config file name inside an index directory.
pub const CONFIG_FILE: &str = "config.json";

/// One `(entity_id, score)` pair of an alias' candidate list.
///
/// Serialized as a two-element JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, f64)", into = "(String, f64)")]
pub struct Candidate {
    /// Knowledge-base entity id.
    pub entity_id: String,
    /// Plausibility score (raw co-occurrence count in practice).
    pub score: f64,
}

impl Candidate {
    /// Create a candidate.
    pub fn new(entity_id: impl Into<String>, score: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            score,
        }
    }
}

impl From<(String, f64)> for Candidate {
    fn from((entity_id, score): (String, f64)) -> Self {
        Self { entity_id, score }
    }
}

impl From<Candidate> for (String, f64) {
    fn from(c: Candidate) -> Self {
        (c.entity_id, c.score)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexScalars {
    max_candidates: usize,
    max_alias_len: usize,
}

/// Alias → candidate index with entity titles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateIndex {
    alias_to_candidates: HashMap<String, Vec<Candidate>>,
    entity_titles: HashMap<String, String>,
    max_candidates: usize,
    max_alias_len: usize,
}

impl CandidateIndex {
    /// Build an index from per-alias candidate lists and an entity title map.
    ///
    /// Alias keys are normalized. Aliases that collide after normalization
    /// are merged, with scores summed per entity. Candidate lists are stably
    /// sorted by descending score, so equal scores keep their input order.
    ///
    /// # Errors
    ///
    /// [`Error::Integrity`] when an alias normalizes to nothing or has no
    /// candidates, a list repeats an entity, a score is not finite, or a
    /// candidate entity has no title.
    pub fn build(
        alias_to_candidates: impl IntoIterator<Item = (String, Vec<Candidate>)>,
        entity_titles: HashMap<String, String>,
    ) -> Result<Self> {
        let mut map: HashMap<String, Vec<Candidate>> = HashMap::new();
        let mut merged = 0usize;

        for (alias, candidates) in alias_to_candidates {
            let key = normalize(&alias);
            if key.is_empty() {
                return Err(Error::integrity(format!(
                    "alias {:?} normalizes to an empty key",
                    alias
                )));
            }
            if candidates.is_empty() {
                return Err(Error::integrity(format!(
                    "alias {:?} has an empty candidate list",
                    alias
                )));
            }
            let mut seen = HashSet::with_capacity(candidates.len());
            for c in &candidates {
                if !c.score.is_finite() {
                    return Err(Error::integrity(format!(
                        "alias {:?} has non-finite score for {}",
                        alias, c.entity_id
                    )));
                }
                if !seen.insert(c.entity_id.as_str()) {
                    return Err(Error::integrity(format!(
                        "alias {:?} lists entity {} twice",
                        alias, c.entity_id
                    )));
                }
                if !entity_titles.contains_key(&c.entity_id) {
                    return Err(Error::integrity(format!(
                        "entity {} (candidate of {:?}) has no title",
                        c.entity_id, alias
                    )));
                }
            }

            match map.get_mut(&key) {
                Some(list) => {
                    merged += 1;
                    for c in candidates {
                        match list.iter_mut().find(|e| e.entity_id == c.entity_id) {
                            Some(existing) => existing.score += c.score,
                            None => list.push(c),
                        }
                    }
                }
                None => {
                    map.insert(key, candidates);
                }
            }
        }
        if merged > 0 {
            log::debug!("Merged {} aliases that share a normalized key", merged);
        }
        for list in map.values_mut() {
            list.sort_by(|a, b| b.score.total_cmp(&a.score));
        }

        let mut index = Self {
            alias_to_candidates: map,
            entity_titles,
            max_candidates: 0,
            max_alias_len: 0,
        };
        index.recompute_maxima();
        Ok(index)
    }

    /// Build an index from a raw `alias → entity → count` frequency table.
    ///
    /// Alias keys are normalized; raw aliases that collide after
    /// normalization have their counts summed per entity. Aliases that
    /// normalize to nothing are skipped.
    ///
    /// # Errors
    ///
    /// Same as [`CandidateIndex::build`].
    pub fn from_counts<A, E>(table: A, entity_titles: HashMap<String, String>) -> Result<Self>
    where
        A: IntoIterator<Item = (String, E)>,
        E: IntoIterator<Item = (String, f64)>,
    {
        // BTreeMap keeps the first-seen candidate order deterministic per key.
        let mut merged: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        let mut skipped = 0usize;

        for (raw_alias, counts) in table {
            let key = normalize(&raw_alias);
            if key.is_empty() {
                skipped += 1;
                continue;
            }
            let list = merged.entry(key).or_default();
            for (entity_id, count) in counts {
                match list.iter_mut().find(|c| c.entity_id == entity_id) {
                    Some(existing) => existing.score += count,
                    None => list.push(Candidate::new(entity_id, count)),
                }
            }
        }
        if skipped > 0 {
            log::warn!("Skipped {} raw aliases that normalize to an empty key", skipped);
        }

        Self::build(merged.into_iter().filter(|(_, l)| !l.is_empty()), entity_titles)
    }

    /// Derive a smaller index.
    ///
    /// Keeps only aliases in `retained_aliases`, truncates each candidate
    /// list to `max_candidates_cap`, and keeps a title only for entities
    /// still referenced by some list or listed in `protected_entities`.
    /// Protected entities unknown to this index are ignored.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] when `max_candidates_cap` is zero.
    pub fn prune(
        &self,
        retained_aliases: &HashSet<String>,
        protected_entities: &HashSet<String>,
        max_candidates_cap: usize,
    ) -> Result<Self> {
        if max_candidates_cap == 0 {
            return Err(Error::invalid_input("max_candidates cap must be at least 1"));
        }

        let alias_to_candidates: HashMap<String, Vec<Candidate>> = self
            .alias_to_candidates
            .iter()
            .filter(|(alias, _)| retained_aliases.contains(*alias))
            .map(|(alias, candidates)| {
                let kept = candidates.iter().take(max_candidates_cap).cloned().collect();
                (alias.clone(), kept)
            })
            .collect();

        let referenced: HashSet<&str> = alias_to_candidates
            .values()
            .flatten()
            .map(|c| c.entity_id.as_str())
            .collect();

        let entity_titles: HashMap<String, String> = self
            .entity_titles
            .iter()
            .filter(|(id, _)| {
                referenced.contains(id.as_str()) || protected_entities.contains(*id)
            })
            .map(|(id, title)| (id.clone(), title.clone()))
            .collect();

        let mut pruned = Self {
            alias_to_candidates,
            entity_titles,
            max_candidates: 0,
            max_alias_len: 0,
        };
        pruned.recompute_maxima();
        Ok(pruned)
    }

    fn recompute_maxima(&mut self) {
        self.max_candidates = self
            .alias_to_candidates
            .values()
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        self.max_alias_len = self
            .alias_to_candidates
            .keys()
            .map(|a| alias_word_count(a))
            .max()
            .unwrap_or(0);
    }

    /// Candidates of `alias`, best first. Empty when the alias is unknown.
    #[must_use]
    pub fn lookup(&self, alias: &str) -> &[Candidate] {
        self.alias_to_candidates
            .get(alias)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Display title of an entity.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the entity is unknown or was pruned; check
    /// [`CandidateIndex::contains_entity`] first.
    pub fn title_of(&self, entity_id: &str) -> Result<&str> {
        self.entity_titles
            .get(entity_id)
            .map(String::as_str)
            .ok_or_else(|| Error::not_found(format!("entity {}", entity_id)))
    }

    /// Whether `alias` is a key of the index.
    #[must_use]
    pub fn contains_alias(&self, alias: &str) -> bool {
        self.alias_to_candidates.contains_key(alias)
    }

    /// Whether `entity_id` has a title.
    #[must_use]
    pub fn contains_entity(&self, entity_id: &str) -> bool {
        self.entity_titles.contains_key(entity_id)
    }

    /// Whether `entity_id` is among the candidates of `alias`.
    #[must_use]
    pub fn has_candidate(&self, alias: &str, entity_id: &str) -> bool {
        self.lookup(alias).iter().any(|c| c.entity_id == entity_id)
    }

    /// All alias keys (unordered).
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.alias_to_candidates.keys().map(String::as_str)
    }

    /// All titled entity ids (unordered).
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entity_titles.keys().map(String::as_str)
    }

    /// `(alias, candidates)` pairs (unordered).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Candidate])> {
        self.alias_to_candidates
            .iter()
            .map(|(a, c)| (a.as_str(), c.as_slice()))
    }

    /// Entities whose title marks a disambiguation page.
    pub fn disambiguation_entities(&self) -> HashSet<String> {
        self.entity_titles
            .iter()
            .filter(|(_, title)| is_disambiguation_title(title))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of aliases.
    #[must_use]
    pub fn num_aliases(&self) -> usize {
        self.alias_to_candidates.len()
    }

    /// Number of titled entities.
    #[must_use]
    pub fn num_entities(&self) -> usize {
        self.entity_titles.len()
    }

    /// Longest candidate list.
    #[must_use]
    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Longest alias, in words.
    #[must_use]
    pub fn max_alias_len(&self) -> usize {
        self.max_alias_len
    }

    /// Write the index to `dir` in the persisted layout.
    ///
    /// Keys are written in sorted order so identical indexes produce
    /// identical files.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let aliases: BTreeMap<&str, &Vec<Candidate>> = self
            .alias_to_candidates
            .iter()
            .map(|(a, c)| (a.as_str(), c))
            .collect();
        let titles: BTreeMap<&str, &str> = self
            .entity_titles
            .iter()
            .map(|(id, t)| (id.as_str(), t.as_str()))
            .collect();
        let scalars = IndexScalars {
            max_candidates: self.max_candidates,
            max_alias_len: self.max_alias_len,
        };

        fs::write(dir.join(ALIAS_FILE), serde_json::to_string(&aliases)?)?;
        fs::write(dir.join(TITLE_FILE), serde_json::to_string(&titles)?)?;
        fs::write(dir.join(CONFIG_FILE), serde_json::to_string_pretty(&scalars)?)?;
        Ok(())
    }

    /// Load an index written by [`CandidateIndex::save`] or by another tool.
    ///
    /// Alias keys go through [`CandidateIndex::build`], so keys stored in
    /// raw form are normalized on load.
    ///
    /// # Errors
    ///
    /// [`Error::Integrity`] if any candidate entity lacks a title or the
    /// stored maxima disagree with the contents. `config.json` is optional.
    pub fn load(dir: &Path) -> Result<Self> {
        let aliases: HashMap<String, Vec<Candidate>> =
            serde_json::from_str(&fs::read_to_string(dir.join(ALIAS_FILE))?)?;
        let titles: HashMap<String, String> =
            serde_json::from_str(&fs::read_to_string(dir.join(TITLE_FILE))?)?;

        let index = Self::build(aliases, titles)?;

        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            let scalars: IndexScalars = serde_json::from_str(&fs::read_to_string(config_path)?)?;
            if scalars.max_candidates != index.max_candidates
                || scalars.max_alias_len != index.max_alias_len
            {
                return Err(Error::integrity(format!(
                    "stale maxima in {}: stored ({}, {}), actual ({}, {})",
                    dir.display(),
                    scalars.max_candidates,
                    scalars.max_alias_len,
                    index.max_candidates,
                    index.max_alias_len
                )));
            }
        }

        log::info!(
            "Loaded index from {}: {} aliases, {} entities, max_candidates={}, max_alias_len={}",
            dir.display(),
            index.num_aliases(),
            index.num_entities(),
            index.max_candidates,
            index.max_alias_len
        );
        Ok(index)
    }
}

/// True for titles of Wikipedia disambiguation pages.
#[must_use]
pub fn is_disambiguation_title(title: &str) -> bool {
    let lower = title.to_lowercase();
    lower.contains("(disambiguation)") || lower.contains("(disambig)")
}
