//! Alias normalization.
//!
//! Every alias key in a [`CandidateIndex`](crate::CandidateIndex) and every
//! window tested by the [`MentionTagger`](crate::MentionTagger) goes through
//! [`normalize`], so lookups and tagger output always agree on the key.
//!
//! The key is the "lnrm" form of a string:
//! - Unicode compatibility decomposition (NFKD)
//! - combining marks dropped (diacritics)
//! - lower-cased
//! - only alphanumerics and single spaces kept, trimmed

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a raw mention string into its comparable alias key.
///
/// Punctuation is removed rather than replaced, so `"O'Neil"` becomes
/// `"oneil"`. Any whitespace run collapses to a single space.
///
/// # Examples
///
/// ```
/// use kbprep::normalize::normalize;
///
/// assert_eq!(normalize("  Café   de Flore "), "cafe de flore");
/// assert_eq!(normalize("New-York!"), "newyork");
/// assert_eq!(normalize("Ça\tva"), "ca va");
/// ```
#[must_use]
pub fn normalize(s: &str) -> String {
    let folded: String = s
        .nfkd()
        .flat_map(char::to_lowercase)
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| *c == ' ' || c.is_alphanumeric())
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of words in a normalized alias key.
#[must_use]
pub fn alias_word_count(key: &str) -> usize {
    key.split_whitespace().count()
}

/// True when a token carries no alphanumeric content at all.
///
/// Such tokens may not open or close a tagged mention window.
#[must_use]
pub fn is_punctuation_only(token: &str) -> bool {
    !token.chars().any(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics_and_case() {
        assert_eq!(normalize("Éléonore"), "eleonore");
        assert_eq!(normalize("ZÜRICH"), "zurich");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(normalize("new \t  york\n city"), "new york city");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn drops_punctuation_without_splitting() {
        assert_eq!(normalize("A.C. Milan"), "ac milan");
        assert_eq!(normalize("rock & roll"), "rock roll");
    }

    #[test]
    fn keeps_non_latin_alphanumerics() {
        assert_eq!(normalize("東京 2020"), "東京 2020");
    }

    #[test]
    fn idempotent_on_examples() {
        for s in ["Café", "  A  b ", "x--y", "Straße", "ǅemal"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input {:?}", s);
        }
    }

    #[test]
    fn counts_words() {
        assert_eq!(alias_word_count("new york"), 2);
        assert_eq!(alias_word_count(""), 0);
    }

    #[test]
    fn punctuation_only_tokens() {
        assert!(is_punctuation_only(","));
        assert!(is_punctuation_only("--"));
        assert!(!is_punctuation_only("u.s."));
    }
}
