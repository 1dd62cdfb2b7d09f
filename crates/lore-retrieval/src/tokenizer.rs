//! Tokenizer and term weighting shared by the TF-IDF index and its queries.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Words carrying no retrieval signal.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "need", "dare", "ought", "used", "to", "of", "in", "for", "on", "with", "at", "by",
    "from", "as", "into", "through", "during", "before", "after", "above", "below", "between",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
    "all", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only",
    "own", "same", "so", "than", "too", "very", "just", "and", "but", "if", "or", "because",
    "until", "while", "this", "that", "these", "those", "it", "its",
];

/// Tokens this short or shorter are dropped.
const MIN_TOKEN_CHARS: usize = 3;

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Split `text` into ordered index terms.
///
/// Lower-cases, extracts alphanumeric runs, drops stop words and tokens of
/// two characters or fewer, then folds plurals to their singular form.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|t| !stop_words().contains(*t))
        .map(fold_plural)
        .collect()
}

/// Reduce a regular English plural to its singular form.
///
/// Deliberately conservative: `-ies` becomes `-y`, a trailing `s` is dropped
/// unless the word ends in `ss`, `us` or `is`.
fn fold_plural(token: &str) -> String {
    let len = token.chars().count();
    if len > 4 && token.ends_with("ies") {
        return format!("{}y", &token[..token.len() - 3]);
    }
    if len > 3
        && token.ends_with('s')
        && !token.ends_with("ss")
        && !token.ends_with("us")
        && !token.ends_with("is")
    {
        return token[..token.len() - 1].to_string();
    }
    token.to_string()
}

/// Normalized term frequency: raw count divided by the count of the most
/// frequent term, so the most frequent term always weighs 1.0.
pub fn term_frequency<S: AsRef<str>>(tokens: &[S]) -> HashMap<String, f64> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_ref().to_string()).or_insert(0) += 1;
    }

    let max_count = match counts.values().max() {
        Some(&max) => max as f64,
        None => return HashMap::new(),
    };

    counts
        .into_iter()
        .map(|(term, count)| (term, count as f64 / max_count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        let tokens = tokenize("The dragon flew over the castle at dawn, as it was told.");
        assert_eq!(tokens, vec!["dragon", "flew", "over", "castle", "dawn", "told"]);
    }

    #[test]
    fn test_tokenize_lowercases_and_splits_punctuation() {
        let tokens = tokenize("Aria's SWORD--forged in Veldt-Maar!");
        assert_eq!(tokens, vec!["aria", "sword", "forged", "veldt", "maar"]);
    }

    #[test]
    fn test_tokenize_folds_plurals() {
        assert_eq!(tokenize("Dragons"), vec!["dragon"]);
        assert_eq!(tokenize("stories"), vec!["story"]);
        assert_eq!(tokenize("fortress"), vec!["fortress"]);
        assert_eq!(tokenize("genus"), vec!["genus"]);
        assert_eq!(tokenize("basis"), vec!["basis"]);
    }

    #[test]
    fn test_tokenize_empty_and_stop_word_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("the and of it").is_empty());
    }

    #[test]
    fn test_term_frequency_normalizes_by_max() {
        let tokens = tokenize("dragon dragon castle dragon fire");
        let tf = term_frequency(&tokens);
        assert_eq!(tf.len(), 3);
        assert!((tf["dragon"] - 1.0).abs() < 1e-12);
        assert!((tf["castle"] - 1.0 / 3.0).abs() < 1e-12);
        assert!((tf["fire"] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_term_frequency_empty() {
        let tf = term_frequency::<String>(&[]);
        assert!(tf.is_empty());
    }

    #[test]
    fn test_tokenize_is_deterministic() {
        let text = "Queen Isolde marched her armies north.";
        assert_eq!(tokenize(text), tokenize(text));
    }
}
