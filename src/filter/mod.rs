//! Corpus filter stages.
//!
//! - [`stage1`]: per-document filter. Applies a named sentence predicate
//!   and the disambiguation exclusion, and collects observed aliases.
//! - [`stage2`]: consistency filter against the pruned index, with
//!   mention statistics and per-file reconciliation.
//!
//! Sentence predicates are resolved by name once, at configuration time,
//! through [`PredicateName`]; there is no lookup by string inside the
//! per-sentence loop.

pub mod stage1;
pub mod stage2;

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::normalize::normalize;

pub use stage1::{Stage1Filter, Stage1Partial};
pub use stage2::{Stage2Filter, Stage2Partial};

/// Decides whether a sentence is discarded before any other filtering.
pub trait SentencePredicate: Send + Sync {
    /// `true` means discard the sentence.
    fn discard(&self, aliases: &[String], entity_ids: &[String], text: &str) -> bool;
}

/// Registered predicate names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateName {
    /// Keep every sentence.
    KeepAll,
    /// Keep sentences mentioning a listed entity.
    EntityIds,
    /// Keep sentences containing a listed alias.
    Aliases,
}

impl PredicateName {
    /// Canonical name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateName::KeepAll => "false_filter",
            PredicateName::EntityIds => "sentence_filterQID",
            PredicateName::Aliases => "sentence_filterAliases",
        }
    }

    /// Parse a canonical or short name.
    #[must_use]
    pub fn try_parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "false_filter" | "keep_all" => Some(PredicateName::KeepAll),
            "sentence_filterqid" | "entity_ids" | "qids" => Some(PredicateName::EntityIds),
            "sentence_filteraliases" | "aliases" => Some(PredicateName::Aliases),
            _ => None,
        }
    }

    /// All registered predicates.
    #[must_use]
    pub fn all() -> &'static [PredicateName] {
        &[
            PredicateName::KeepAll,
            PredicateName::EntityIds,
            PredicateName::Aliases,
        ]
    }

    /// Whether the predicate reads a JSON list from a filter file.
    #[must_use]
    pub fn needs_filter_file(&self) -> bool {
        !matches!(self, PredicateName::KeepAll)
    }
}

impl fmt::Display for PredicateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PredicateName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::try_parse(s).ok_or_else(|| {
            let known: Vec<&str> = Self::all().iter().map(PredicateName::as_str).collect();
            format!("Unknown sentence filter: '{}' (known: {})", s, known.join(", "))
        })
    }
}

/// The registered predicate implementations.
#[derive(Debug, Clone)]
pub enum SentenceFilter {
    /// Never discard.
    KeepAll,
    /// Discard unless some mention's entity is in the set.
    RequireEntity(HashSet<String>),
    /// Discard unless some normalized alias is in the set.
    RequireAlias(HashSet<String>),
}

impl SentenceFilter {
    /// Instantiate a predicate with its filter list.
    ///
    /// Alias lists are normalized so they compare against record aliases
    /// by key.
    pub fn new(name: PredicateName, items: Vec<String>) -> Self {
        match name {
            PredicateName::KeepAll => SentenceFilter::KeepAll,
            PredicateName::EntityIds => SentenceFilter::RequireEntity(items.into_iter().collect()),
            PredicateName::Aliases => {
                SentenceFilter::RequireAlias(items.iter().map(|a| normalize(a)).collect())
            }
        }
    }

    /// Instantiate a predicate, reading its list from `filter_file` when
    /// it needs one.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the predicate needs a file and none is given;
    /// I/O or JSON errors when the file cannot be read as a string list.
    pub fn load(name: PredicateName, filter_file: Option<&Path>) -> Result<Self> {
        if !name.needs_filter_file() {
            return Ok(SentenceFilter::KeepAll);
        }
        let path = filter_file.ok_or_else(|| {
            Error::config(format!("sentence filter {} needs a filter_file", name))
        })?;
        let items = read_string_list(path)?;
        log::info!("Loaded {} filter entries from {}", items.len(), path.display());
        Ok(Self::new(name, items))
    }
}

impl SentencePredicate for SentenceFilter {
    fn discard(&self, aliases: &[String], entity_ids: &[String], _text: &str) -> bool {
        match self {
            SentenceFilter::KeepAll => false,
            SentenceFilter::RequireEntity(keep) => !entity_ids.iter().any(|e| keep.contains(e)),
            SentenceFilter::RequireAlias(keep) => {
                !aliases.iter().any(|a| keep.contains(&normalize(a)))
            }
        }
    }
}

/// Read a JSON array of strings.
pub fn read_string_list(path: &Path) -> Result<Vec<String>> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(
            "sentence_filterQID".parse::<PredicateName>().unwrap(),
            PredicateName::EntityIds
        );
        assert_eq!("KEEP_ALL".parse::<PredicateName>().unwrap(), PredicateName::KeepAll);
        assert!("eval(rm)".parse::<PredicateName>().is_err());
        for name in PredicateName::all() {
            assert_eq!(PredicateName::try_parse(name.as_str()), Some(*name));
        }
    }

    #[test]
    fn keep_all_never_discards() {
        let f = SentenceFilter::new(PredicateName::KeepAll, vec![]);
        assert!(!f.discard(&[], &[], ""));
    }

    #[test]
    fn require_entity() {
        let f = SentenceFilter::new(PredicateName::EntityIds, strings(&["Q1"]));
        assert!(!f.discard(&strings(&["a", "b"]), &strings(&["Q2", "Q1"]), ""));
        assert!(f.discard(&strings(&["a"]), &strings(&["Q2"]), ""));
    }

    #[test]
    fn require_alias_compares_keys() {
        let f = SentenceFilter::new(PredicateName::Aliases, strings(&["New York"]));
        assert!(!f.discard(&strings(&["new  york"]), &strings(&["Q60"]), ""));
        assert!(f.discard(&strings(&["york"]), &strings(&["Q60"]), ""));
    }

    #[test]
    fn load_requires_file_when_needed() {
        assert!(matches!(
            SentenceFilter::load(PredicateName::EntityIds, None),
            Err(Error::Config(_))
        ));
        assert!(SentenceFilter::load(PredicateName::KeepAll, None).is_ok());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qids.json");
        fs::write(&path, r#"["Q1", "Q2"]"#).unwrap();
        let f = SentenceFilter::load(PredicateName::EntityIds, Some(&path)).unwrap();
        assert!(!f.discard(&strings(&["x"]), &strings(&["Q2"]), ""));
    }
}
