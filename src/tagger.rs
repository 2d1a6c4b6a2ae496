//! Greedy longest-match mention tagging.
//!
//! [`MentionTagger`] scans a whitespace-tokenized sentence for known alias
//! keys, largest window first. A window is only tried when it looks like a
//! noun phrase (see [`MentionTagger::window_is_candidate`]), and a match is
//! dropped when it overlaps one accepted at a larger window size, so
//! "new york" wins over "york" in "I live in new york city".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::index::CandidateIndex;
use crate::lang::{HeuristicTagger, LanguageResources, PosTagger};
use crate::normalize::{alias_word_count, normalize};

/// Set of alias keys a tagger can match against.
pub trait AliasVocabulary {
    /// Whether `key` (already normalized) is a known alias.
    fn contains_alias(&self, key: &str) -> bool;

    /// Longest alias, in words.
    fn max_alias_len(&self) -> usize;

    /// Whether there are no aliases at all.
    fn is_empty(&self) -> bool;
}

impl AliasVocabulary for CandidateIndex {
    fn contains_alias(&self, key: &str) -> bool {
        CandidateIndex::contains_alias(self, key)
    }

    fn max_alias_len(&self) -> usize {
        CandidateIndex::max_alias_len(self)
    }

    fn is_empty(&self) -> bool {
        self.num_aliases() == 0
    }
}

/// A bare set of normalized alias keys.
#[derive(Debug, Clone, Default)]
pub struct AliasSet {
    keys: HashSet<String>,
    max_len: usize,
}

impl AliasSet {
    /// Normalize and collect the given aliases.
    pub fn new<S: AsRef<str>>(aliases: impl IntoIterator<Item = S>) -> Self {
        let keys: HashSet<String> = aliases
            .into_iter()
            .map(|a| normalize(a.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();
        let max_len = keys.iter().map(|k| alias_word_count(k)).max().unwrap_or(0);
        Self { keys, max_len }
    }
}

impl AliasVocabulary for AliasSet {
    fn contains_alias(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn max_alias_len(&self) -> usize {
        self.max_len
    }

    fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A tagged alias occurrence: `tokens[start..end]` normalizes to `alias`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedMention {
    /// Normalized alias key.
    pub alias: String,
    /// First word (inclusive).
    pub start: usize,
    /// Last word (exclusive).
    pub end: usize,
}

impl TaggedMention {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        start < self.end && end > self.start
    }
}

/// Greedy longest-match-first alias tagger.
pub struct MentionTagger<T: PosTagger = HeuristicTagger> {
    pos_tagger: T,
    resources: LanguageResources,
}

impl Default for MentionTagger<HeuristicTagger> {
    fn default() -> Self {
        Self::new(HeuristicTagger::default(), LanguageResources::english().clone())
    }
}

impl<T: PosTagger> MentionTagger<T> {
    /// Create a tagger from a POS tagging capability and language resources.
    pub fn new(pos_tagger: T, resources: LanguageResources) -> Self {
        Self {
            pos_tagger,
            resources,
        }
    }

    /// Tokenize on whitespace, POS-tag, and tag aliases.
    pub fn tag_sentence<V: AliasVocabulary + ?Sized>(
        &self,
        sentence: &str,
        vocabulary: &V,
    ) -> Vec<TaggedMention> {
        if vocabulary.is_empty() {
            return Vec::new();
        }
        let tokens: Vec<&str> = sentence.split_whitespace().collect();
        let tags = self.pos_tagger.tag(&tokens);
        self.tag(&tokens, &tags, vocabulary, vocabulary.max_alias_len())
    }

    /// Tag aliases in pre-tagged tokens.
    ///
    /// Windows of `max_alias_len` words down to one are tried left to
    /// right; a match that overlaps an earlier accepted one is discarded.
    /// The result is sorted by `(start, end)`.
    ///
    /// `tags` must have one entry per token; surplus tokens are ignored.
    pub fn tag<V: AliasVocabulary + ?Sized>(
        &self,
        tokens: &[&str],
        tags: &[String],
        vocabulary: &V,
        max_alias_len: usize,
    ) -> Vec<TaggedMention> {
        if vocabulary.is_empty() {
            return Vec::new();
        }
        debug_assert_eq!(tokens.len(), tags.len(), "one POS tag per token");
        let len = tokens.len().min(tags.len());
        let mut accepted: Vec<TaggedMention> = Vec::new();

        for n in (1..=max_alias_len.min(len)).rev() {
            for start in 0..=(len - n) {
                let end = start + n;
                if !self.window_is_candidate(&tokens[start..end], &tags[start..end]) {
                    continue;
                }
                let key = normalize(&tokens[start..end].join(" "));
                if key.is_empty() || !vocabulary.contains_alias(&key) {
                    continue;
                }
                if accepted.iter().any(|m| m.overlaps(start, end)) {
                    continue;
                }
                accepted.push(TaggedMention {
                    alias: key,
                    start,
                    end,
                });
            }
        }

        accepted.sort_by_key(|m| (m.start, m.end));
        accepted
    }

    /// Whether a window may be an alias mention at all.
    ///
    /// A single word must be a noun; a longer window must contain a noun;
    /// neither end may be a stop-word or punctuation.
    pub fn window_is_candidate(&self, words: &[&str], tags: &[String]) -> bool {
        let (Some(first), Some(last)) = (words.first(), words.last()) else {
            return false;
        };
        let has_noun = if words.len() == 1 {
            tags.first().is_some_and(|t| self.resources.is_noun_tag(t))
        } else {
            tags.iter().any(|t| self.resources.is_noun_tag(t))
        };
        has_noun
            && !self.resources.is_boundary_blocked(first)
            && !self.resources.is_boundary_blocked(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(tokens: &[&str]) -> Vec<String> {
        HeuristicTagger::default().tag(tokens)
    }

    #[test]
    fn prefers_longest_match() {
        let vocab = AliasSet::new(["new york", "york"]);
        let tagger = MentionTagger::default();
        let found = tagger.tag_sentence("I live in new york city", &vocab);
        assert_eq!(
            found,
            vec![TaggedMention {
                alias: "new york".into(),
                start: 3,
                end: 5
            }]
        );
    }

    #[test]
    fn empty_vocabulary_short_circuits() {
        let tagger = MentionTagger::default();
        assert!(tagger.tag_sentence("New York", &AliasSet::default()).is_empty());
    }

    #[test]
    fn loaded_index_matches_raw_alias_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(crate::index::ALIAS_FILE),
            r#"{"A.C. Milan": [["Q1", 3.0]]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join(crate::index::TITLE_FILE), r#"{"Q1": "A.C. Milan"}"#)
            .unwrap();
        let index = CandidateIndex::load(dir.path()).unwrap();
        let found = MentionTagger::default().tag_sentence("fans of A.C. Milan cheered", &index);
        assert_eq!(
            found,
            vec![TaggedMention {
                alias: "ac milan".into(),
                start: 2,
                end: 4
            }]
        );
    }

    #[test]
    fn single_word_without_tag_is_not_a_candidate() {
        let tagger = MentionTagger::default();
        assert!(!tagger.window_is_candidate(&["York"], &[]));
        assert!(tagger.window_is_candidate(&["York"], &["NNP".to_string()]));
    }

    #[test]
    fn stopword_boundaries_are_rejected() {
        let vocab = AliasSet::new(["the mother", "mother"]);
        let tagger = MentionTagger::default();
        let found = tagger.tag_sentence("tell me about the mother", &vocab);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].alias, "mother");
        assert_eq!((found[0].start, found[0].end), (4, 5));
    }

    #[test]
    fn single_word_must_be_noun() {
        let vocab = AliasSet::new(["in"]);
        let tokens = ["live", "in", "paris"];
        let tagger = MentionTagger::default();
        let found = tagger.tag(&tokens, &tags(&tokens), &vocab, 1);
        assert!(found.is_empty());
    }

    #[test]
    fn multi_word_needs_a_noun() {
        struct AllVerbs;
        impl PosTagger for AllVerbs {
            fn tag(&self, tokens: &[&str]) -> Vec<String> {
                vec!["VB".to_string(); tokens.len()]
            }
        }
        let vocab = AliasSet::new(["run fast"]);
        let tagger = MentionTagger::new(AllVerbs, LanguageResources::english().clone());
        assert!(tagger.tag_sentence("run fast", &vocab).is_empty());
    }

    #[test]
    fn normalizes_window_text() {
        let vocab = AliasSet::new(["Café de Flore"]);
        let tagger = MentionTagger::default();
        let found = tagger.tag_sentence("We met at Café de Flore yesterday", &vocab);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].alias, "cafe de flore");
        assert_eq!((found[0].start, found[0].end), (3, 6));
    }

    #[test]
    fn output_sorted_by_start() {
        let vocab = AliasSet::new(["paris", "berlin rome"]);
        let tagger = MentionTagger::default();
        let found = tagger.tag_sentence("paris then berlin rome", &vocab);
        let starts: Vec<_> = found.iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![0, 2]);
    }

    #[test]
    fn sentence_shorter_than_window() {
        let vocab = AliasSet::new(["a very long alias name"]);
        let tagger = MentionTagger::default();
        assert!(tagger.tag_sentence("short", &vocab).is_empty());
    }

    #[test]
    fn works_against_candidate_index() {
        use crate::index::Candidate;
        use std::collections::HashMap;

        let mut titles = HashMap::new();
        titles.insert("Q60".to_string(), "New York City".to_string());
        let index = CandidateIndex::build(
            vec![("new york".to_string(), vec![Candidate::new("Q60", 1.0)])],
            titles,
        )
        .unwrap();
        let found = MentionTagger::default().tag_sentence("visit New York now", &index);
        assert_eq!(found[0].alias, "new york");
    }
}
