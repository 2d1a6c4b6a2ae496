//! Rebuild the candidate index from what the corpus uses.
//!
//! After the first filter stage, only aliases that occur in the surviving
//! corpus are worth keeping. [`IndexRebuilder`] prunes the raw index to
//! those aliases, caps every candidate list, and keeps titles for protected
//! (benchmark) entities.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::CandidateIndex;
use crate::stats::AliasObservationSet;

/// Diagnostics of one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Aliases in the raw index.
    pub raw_aliases: usize,
    /// Titled entities in the raw index.
    pub raw_entities: usize,
    /// Distinct aliases observed in the corpus.
    pub observed_aliases: usize,
    /// Raw aliases dropped because the corpus never used them.
    pub aliases_without_observations: usize,
    /// Entities that only appeared past the cap of a retained alias.
    pub entities_over_cap: usize,
    /// Protected entities the raw index does not know.
    pub protected_missing: usize,
    /// Aliases in the rebuilt index.
    pub retained_aliases: usize,
    /// Titled entities in the rebuilt index.
    pub retained_entities: usize,
}

/// Prunes a raw index against an alias observation set.
pub struct IndexRebuilder<'a> {
    source: &'a CandidateIndex,
    max_candidates: usize,
    protected: HashSet<String>,
    retain_all_entities: bool,
}

impl<'a> IndexRebuilder<'a> {
    /// Rebuild from `source` with a per-alias candidate cap.
    pub fn new(source: &'a CandidateIndex, max_candidates: usize) -> Self {
        Self {
            source,
            max_candidates,
            protected: HashSet::new(),
            retain_all_entities: false,
        }
    }

    /// Entities that keep their title regardless of candidate membership.
    #[must_use]
    pub fn with_protected(mut self, protected: HashSet<String>) -> Self {
        self.protected = protected;
        self
    }

    /// Keep every raw entity title.
    #[must_use]
    pub fn with_retain_all_entities(mut self, retain: bool) -> Self {
        self.retain_all_entities = retain;
        self
    }

    /// Build the pruned index.
    ///
    /// # Errors
    ///
    /// [`Error::Integrity`] if an observed alias has no candidates in the
    /// raw index; [`Error::InvalidInput`] if the cap is zero.
    pub fn rebuild(&self, observed: &AliasObservationSet) -> Result<(CandidateIndex, RebuildReport)> {
        let missing: Vec<&str> = observed
            .iter()
            .filter(|a| !self.source.contains_alias(a))
            .collect();
        if !missing.is_empty() {
            let shown: Vec<&str> = missing.iter().take(5).copied().collect();
            return Err(Error::integrity(format!(
                "{} observed aliases have no candidates (e.g. {:?})",
                missing.len(),
                shown
            )));
        }

        let retained: HashSet<String> = observed.iter().map(str::to_string).collect();

        let mut protected_missing = 0;
        let protected: HashSet<String> = if self.retain_all_entities {
            self.source.entities().map(str::to_string).collect()
        } else {
            self.protected
                .iter()
                .filter(|id| {
                    let known = self.source.contains_entity(id);
                    if !known {
                        protected_missing += 1;
                    }
                    known
                })
                .cloned()
                .collect()
        };
        if protected_missing > 0 {
            log::warn!(
                "{} protected entities are unknown to the raw index and were skipped",
                protected_missing
            );
        }

        let pruned = self.source.prune(&retained, &protected, self.max_candidates)?;

        let before_cap: HashSet<&str> = retained
            .iter()
            .flat_map(|a| self.source.lookup(a))
            .map(|c| c.entity_id.as_str())
            .collect();
        let after_cap: HashSet<&str> = pruned
            .iter()
            .flat_map(|(_, cands)| cands)
            .map(|c| c.entity_id.as_str())
            .collect();

        let report = RebuildReport {
            raw_aliases: self.source.num_aliases(),
            raw_entities: self.source.num_entities(),
            observed_aliases: observed.len(),
            aliases_without_observations: self.source.num_aliases() - retained.len(),
            entities_over_cap: before_cap.difference(&after_cap).count(),
            protected_missing,
            retained_aliases: pruned.num_aliases(),
            retained_entities: pruned.num_entities(),
        };
        log::info!(
            "Rebuilt index: {} -> {} aliases, {} -> {} entities ({} unobserved aliases, {} entities over cap {})",
            report.raw_aliases,
            report.retained_aliases,
            report.raw_entities,
            report.retained_entities,
            report.aliases_without_observations,
            report.entities_over_cap,
            self.max_candidates
        );
        Ok((pruned, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Candidate;
    use std::collections::HashMap;

    fn raw() -> CandidateIndex {
        let titles: HashMap<String, String> = ["Q1", "Q2", "Q3", "Q4"]
            .iter()
            .map(|id| (id.to_string(), format!("Title {}", id)))
            .collect();
        CandidateIndex::build(
            vec![
                (
                    "acme".to_string(),
                    vec![
                        Candidate::new("Q1", 10.0),
                        Candidate::new("Q2", 5.0),
                        Candidate::new("Q3", 1.0),
                    ],
                ),
                ("beta".to_string(), vec![Candidate::new("Q4", 2.0)]),
            ],
            titles,
        )
        .unwrap()
    }

    fn observed(aliases: &[&str]) -> AliasObservationSet {
        aliases.iter().copied().collect()
    }

    #[test]
    fn prunes_to_observed_and_caps() {
        let source = raw();
        let (index, report) = IndexRebuilder::new(&source, 2)
            .rebuild(&observed(&["acme"]))
            .unwrap();
        assert_eq!(
            index.lookup("acme"),
            &[Candidate::new("Q1", 10.0), Candidate::new("Q2", 5.0)]
        );
        assert!(!index.contains_alias("beta"));
        assert!(!index.contains_entity("Q3"));
        assert_eq!(report.aliases_without_observations, 1);
        assert_eq!(report.entities_over_cap, 1);
        assert_eq!(report.retained_entities, 2);
    }

    #[test]
    fn protected_entity_keeps_title() {
        let source = raw();
        let protected: HashSet<String> = ["Q3", "Q999"].iter().map(|s| s.to_string()).collect();
        let (index, report) = IndexRebuilder::new(&source, 2)
            .with_protected(protected)
            .rebuild(&observed(&["acme"]))
            .unwrap();
        assert!(index.contains_entity("Q3"));
        assert!(!index.has_candidate("acme", "Q3"));
        assert_eq!(report.protected_missing, 1);
    }

    #[test]
    fn retain_all_keeps_every_title() {
        let source = raw();
        let (index, _) = IndexRebuilder::new(&source, 1)
            .with_retain_all_entities(true)
            .rebuild(&observed(&["acme"]))
            .unwrap();
        assert_eq!(index.num_entities(), 4);
        assert_eq!(index.max_candidates(), 1);
    }

    #[test]
    fn observed_alias_without_candidates_is_integrity_error() {
        let source = raw();
        let err = IndexRebuilder::new(&source, 2)
            .rebuild(&observed(&["acme", "ghost"]))
            .unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }

    #[test]
    fn rebuild_is_deterministic() {
        let source = raw();
        let a = IndexRebuilder::new(&source, 2).rebuild(&observed(&["acme", "beta"])).unwrap();
        let b = IndexRebuilder::new(&source, 2).rebuild(&observed(&["beta", "acme"])).unwrap();
        assert_eq!(a, b);
    }
}
