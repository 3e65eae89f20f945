//! # Text Metrics - Surface Statistics of Generated Text
//!
//! Two heuristic scores feed the thermodynamic model:
//!
//! - **coherence** ∈ [0, 1]: lexical diversity blended with the
//!   regularity of sentence lengths
//! - **entropy** ≥ 0 (nats): Shannon entropy of the character and word
//!   frequency distributions
//!
//! Both are pure and deterministic. Empty text scores zero on both.

use std::collections::HashMap;
use std::hash::Hash;

/// Weight of the unique-word ratio in coherence
const LEXICAL_WEIGHT: f64 = 0.7;
/// Weight of sentence-length regularity in coherence
const STRUCTURAL_WEIGHT: f64 = 0.3;
/// Weight of character entropy in the blended entropy
const CHAR_ENTROPY_WEIGHT: f64 = 0.3;
/// Weight of word entropy in the blended entropy
const WORD_ENTROPY_WEIGHT: f64 = 0.7;

/// Scores extracted from one piece of text
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextMetrics {
    pub coherence: f64,
    pub entropy: f64,
}

impl TextMetrics {
    /// Compute both metrics for a text
    pub fn extract(text: &str) -> Self {
        Self {
            coherence: coherence(text),
            entropy: entropy(text),
        }
    }
}

/// `0.7·uniqueRatio + 0.3·(1 / (1 + var(sentenceLengths)))`
pub fn coherence(text: &str) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }

    let sentence_lengths: Vec<f64> = text
        .split('.')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.split_whitespace().count() as f64)
        .collect();
    let structural = 1.0 / (1.0 + variance(&sentence_lengths));

    LEXICAL_WEIGHT * unique_word_ratio(text) + STRUCTURAL_WEIGHT * structural
}

/// `0.3·charEntropy + 0.7·wordEntropy`, natural log
pub fn entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    CHAR_ENTROPY_WEIGHT * char_entropy(text) + WORD_ENTROPY_WEIGHT * word_entropy(text)
}

/// Fraction of whitespace-separated words that are distinct
pub fn unique_word_ratio(text: &str) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let unique = words.iter().collect::<std::collections::HashSet<_>>().len();
    unique as f64 / words.len() as f64
}

/// Shannon entropy of the character distribution
pub fn char_entropy(text: &str) -> f64 {
    shannon(text.chars())
}

/// Shannon entropy of the word distribution
pub fn word_entropy(text: &str) -> f64 {
    shannon(text.split_whitespace())
}

fn shannon<T: Eq + Hash>(items: impl Iterator<Item = T>) -> f64 {
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut total = 0usize;
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    counts
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum::<f64>()
        .max(0.0)
}

/// Population variance (0 for fewer than two samples)
pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAT: &str = "the cat sat on the mat the cat ran";

    #[test]
    fn test_empty_text_scores_zero() {
        assert_eq!(coherence(""), 0.0);
        assert_eq!(entropy(""), 0.0);
        assert_eq!(TextMetrics::extract("   "), TextMetrics::default());
    }

    #[test]
    fn test_worked_example() {
        assert!((unique_word_ratio(CAT) - 6.0 / 9.0).abs() < 1e-12);
        assert!((word_entropy(CAT) - 1.675).abs() < 0.01);
        // one sentence: zero length variance, structural term is 1
        assert!((coherence(CAT) - (0.7 * 6.0 / 9.0 + 0.3)).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_on_varied_text() {
        let samples = [
            "Hello.",
            "a a a a a a a a",
            "One short. Then a much longer sentence follows here. Ok.",
            "zq xw vv ... !! ?? ..",
            "résumé naïve café. 東京 タワー.",
        ];
        for text in samples {
            let m = TextMetrics::extract(text);
            assert!((0.0..=1.0).contains(&m.coherence), "{text}: {}", m.coherence);
            assert!(m.entropy >= 0.0, "{text}: {}", m.entropy);
        }
    }

    #[test]
    fn test_irregular_sentences_lower_coherence() {
        let regular = "alpha beta gamma. delta epsilon zeta. eta theta iota.";
        let irregular = "alpha. beta gamma delta epsilon zeta eta theta. iota.";
        assert!(coherence(regular) > coherence(irregular));
    }

    #[test]
    fn test_repetition_lowers_entropy() {
        assert!(word_entropy("go go go go") < word_entropy("go stop run walk"));
        assert_eq!(word_entropy("go go go go"), 0.0);
    }
}
