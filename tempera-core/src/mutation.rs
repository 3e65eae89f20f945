//! # Mutation Operators - How Gene Text Changes
//!
//! Three classes, selected by the temperature regime:
//!
//! | Class       | Regime        | Effect                                   |
//! |-------------|---------------|------------------------------------------|
//! | Synonymous  | T < Tc        | swap a word for a synonym                |
//! | Missense    | Tc ≤ T < T2   | one local character substitution or swap |
//! | Nonsense    | T ≥ T2        | insert, delete, move, invert, duplicate  |

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Kind of mutation applied to a gene
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationClass {
    Synonymous,
    Missense,
    Nonsense,
}

impl MutationClass {
    /// Regime for a temperature given Tc and the chaotic boundary T2
    pub fn for_temperature(temperature: f64, critical_temperature: f64, semi_to_chaotic: f64) -> Self {
        if temperature < critical_temperature {
            MutationClass::Synonymous
        } else if temperature < semi_to_chaotic {
            MutationClass::Missense
        } else {
            MutationClass::Nonsense
        }
    }

    /// Apply this class to a sequence
    pub fn apply<R: Rng + ?Sized>(&self, sequence: &str, rng: &mut R) -> String {
        match self {
            MutationClass::Synonymous => synonymous(sequence, rng).unwrap_or_else(|| sequence.to_string()),
            MutationClass::Missense => missense(sequence, rng),
            MutationClass::Nonsense => nonsense(sequence, rng),
        }
    }
}

/// Meaning-preserving word pairs (used in both directions)
const SYNONYMS: &[(&str, &str)] = &[
    ("explore", "investigate"),
    ("develop", "cultivate"),
    ("optimize", "improve"),
    ("create", "make"),
    ("analyze", "examine"),
    ("build", "construct"),
    ("discover", "uncover"),
    ("implement", "realize"),
    ("synthesize", "combine"),
    ("knowledge", "understanding"),
    ("solutions", "answers"),
    ("relationships", "bonds"),
    ("innovations", "inventions"),
    ("connections", "links"),
    ("systematic", "methodical"),
    ("logical", "rational"),
    ("precise", "exact"),
    ("imaginative", "creative"),
    ("supportive", "helpful"),
    ("efficient", "effective"),
    ("pragmatic", "practical"),
    ("reliable", "dependable"),
    ("organized", "orderly"),
    ("steady", "stable"),
    ("help", "assist"),
    ("show", "display"),
    ("large", "big"),
    ("small", "little"),
    ("quick", "fast"),
    ("suggest", "recommend"),
];

fn synonym_of(word: &str) -> Option<&'static str> {
    SYNONYMS.iter().find_map(|&(a, b)| {
        if a == word {
            Some(b)
        } else if b == word {
            Some(a)
        } else {
            None
        }
    })
}

/// Split a token into its lowercase core word and trailing punctuation
fn split_token(token: &str) -> (String, &str) {
    let core_end = token
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_alphanumeric())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    (token[..core_end].to_lowercase(), &token[core_end..])
}

/// Replace one word that has a synonym. `None` if no word qualifies.
pub fn synonymous<R: Rng + ?Sized>(sequence: &str, rng: &mut R) -> Option<String> {
    let mut words: Vec<String> = sequence.split_whitespace().map(str::to_string).collect();
    let candidates: Vec<(usize, &'static str)> = words
        .iter()
        .enumerate()
        .filter_map(|(i, w)| synonym_of(&split_token(w).0).map(|s| (i, s)))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let (idx, replacement) = candidates[rng.gen_range(0..candidates.len())];
    let (_, trailing) = split_token(&words[idx]);
    words[idx] = format!("{}{}", replacement, trailing);
    Some(words.join(" "))
}

fn random_letter<R: Rng + ?Sized>(rng: &mut R) -> char {
    (b'a' + rng.gen_range(0..26u8)) as char
}

/// Substitute or transpose characters inside a single word
pub fn missense<R: Rng + ?Sized>(sequence: &str, rng: &mut R) -> String {
    let mut words: Vec<String> = sequence.split_whitespace().map(str::to_string).collect();
    if words.is_empty() {
        return sequence.to_string();
    }

    let idx = rng.gen_range(0..words.len());
    let mut chars: Vec<char> = words[idx].chars().collect();
    let swappable: Vec<usize> = (0..chars.len().saturating_sub(1))
        .filter(|&i| chars[i] != chars[i + 1])
        .collect();
    if !swappable.is_empty() && rng.gen_bool(0.5) {
        let pos = swappable[rng.gen_range(0..swappable.len())];
        chars.swap(pos, pos + 1);
    } else {
        let pos = rng.gen_range(0..chars.len());
        let current = chars[pos];
        let mut letter = random_letter(rng);
        while letter == current {
            letter = random_letter(rng);
        }
        chars[pos] = letter;
    }
    words[idx] = chars.into_iter().collect();
    words.join(" ")
}

/// Unconstrained edits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NonsenseOp {
    Insert,
    Delete,
    Move,
    Invert,
    Duplicate,
}

const NONSENSE_OPS: [NonsenseOp; 5] = [
    NonsenseOp::Insert,
    NonsenseOp::Delete,
    NonsenseOp::Move,
    NonsenseOp::Invert,
    NonsenseOp::Duplicate,
];

/// Apply one randomly chosen [`NonsenseOp`]
pub fn nonsense<R: Rng + ?Sized>(sequence: &str, rng: &mut R) -> String {
    let op = NONSENSE_OPS[rng.gen_range(0..NONSENSE_OPS.len())];
    nonsense_with(op, sequence, rng)
}

/// Apply a specific edit, falling back to insertion when it cannot apply
pub fn nonsense_with<R: Rng + ?Sized>(op: NonsenseOp, sequence: &str, rng: &mut R) -> String {
    let mut words: Vec<&str> = sequence.split_whitespace().collect();
    match op {
        NonsenseOp::Delete if sequence.chars().count() > 1 => {
            let mut chars: Vec<char> = sequence.chars().collect();
            chars.remove(rng.gen_range(0..chars.len()));
            chars.into_iter().collect()
        }
        NonsenseOp::Move if words.len() >= 2 => {
            let word = words.remove(rng.gen_range(0..words.len()));
            words.insert(rng.gen_range(0..=words.len()), word);
            words.join(" ")
        }
        NonsenseOp::Invert if words.len() >= 2 => {
            words.reverse();
            words.join(" ")
        }
        NonsenseOp::Duplicate if !words.is_empty() => {
            let idx = rng.gen_range(0..words.len());
            words.insert(idx, words[idx]);
            words.join(" ")
        }
        _ => {
            let mut chars: Vec<char> = sequence.chars().collect();
            let pos = rng.gen_range(0..=chars.len());
            chars.insert(pos, random_letter(rng));
            chars.into_iter().collect()
        }
    }
}
