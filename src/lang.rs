//! Language resources for mention tagging.
//!
//! Tokenization and part-of-speech tagging are external capabilities: the
//! tagger only needs one tag per whitespace token. [`PosTagger`] is that
//! seam, and [`HeuristicTagger`] is a dependency-free default that is good
//! enough to separate content words from function words.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::normalize::is_punctuation_only;

/// Penn Treebank noun-class tags.
pub const NOUN_TAGS: &[&str] = &["NN", "NNS", "NNP", "NNPS"];

/// English function words that may not start or end a mention.
pub const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

static ENGLISH: Lazy<LanguageResources> = Lazy::new(|| {
    LanguageResources::new(
        ENGLISH_STOPWORDS.iter().copied(),
        NOUN_TAGS.iter().copied(),
    )
});

/// Stop-words and noun-class tags for one language.
#[derive(Debug, Clone)]
pub struct LanguageResources {
    stopwords: HashSet<String>,
    noun_tags: HashSet<String>,
}

impl LanguageResources {
    /// Build resources from explicit word and tag lists.
    pub fn new<'a>(
        stopwords: impl IntoIterator<Item = &'a str>,
        noun_tags: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            stopwords: stopwords.into_iter().map(str::to_lowercase).collect(),
            noun_tags: noun_tags.into_iter().map(str::to_string).collect(),
        }
    }

    /// Shared English resources.
    #[must_use]
    pub fn english() -> &'static LanguageResources {
        &ENGLISH
    }

    /// Add a word that may never open or close a mention window.
    #[must_use]
    pub fn with_stopword(mut self, word: &str) -> Self {
        self.stopwords.insert(word.to_lowercase());
        self
    }

    /// True when `tag` is a noun-class tag.
    #[must_use]
    pub fn is_noun_tag(&self, tag: &str) -> bool {
        self.noun_tags.contains(tag)
    }

    /// True when `token` is a stop-word (case-insensitive).
    #[must_use]
    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(&token.to_lowercase())
    }

    /// True when `token` may not sit at a mention boundary.
    #[must_use]
    pub fn is_boundary_blocked(&self, token: &str) -> bool {
        self.is_stopword(token) || is_punctuation_only(token)
    }
}

/// Part-of-speech tagging capability.
///
/// Implementations must return exactly one tag per input token and be
/// deterministic for a fixed input.
pub trait PosTagger: Send + Sync {
    /// Tag a whitespace-tokenized sentence.
    fn tag(&self, tokens: &[&str]) -> Vec<String>;
}

/// Rule-based tagger: punctuation, numbers and stop-words get closed-class
/// tags, capitalized words `NNP`, everything else `NN`.
#[derive(Debug, Clone)]
pub struct HeuristicTagger {
    resources: LanguageResources,
}

impl Default for HeuristicTagger {
    fn default() -> Self {
        Self::new(LanguageResources::english().clone())
    }
}

impl HeuristicTagger {
    /// Create a tagger over the given language resources.
    #[must_use]
    pub fn new(resources: LanguageResources) -> Self {
        Self { resources }
    }

    fn tag_one(&self, token: &str) -> &'static str {
        if is_punctuation_only(token) {
            "."
        } else if token.chars().all(|c| c.is_numeric() || c == ',' || c == '.') {
            "CD"
        } else if self.resources.is_stopword(token) {
            "IN"
        } else if token.chars().next().is_some_and(char::is_uppercase) {
            "NNP"
        } else {
            "NN"
        }
    }
}

impl PosTagger for HeuristicTagger {
    fn tag(&self, tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| self.tag_one(t).to_string()).collect()
    }
}
