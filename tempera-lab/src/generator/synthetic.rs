//! Offline generator whose text degrades as temperature rises
//!
//! Low temperatures return well-formed sentences from a small corpus.
//! As temperature climbs, words are replaced by a tiny babble
//! vocabulary, sentence lengths become ragged and, past T = 1.5, word
//! order is shuffled and punctuation dropped.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use tempera_core::error::GenerationError;

use super::{GenerationRequest, Generator};

const CORPUS: &[&str] = &[
    "Patterns emerge when careful observation meets patient reasoning",
    "Every system carries the memory of the choices that shaped it",
    "A good question often matters more than a quick answer",
    "Small experiments reveal what grand theories tend to hide",
    "Collaboration turns separate insights into shared understanding",
    "Clear structure makes complex ideas easier to explore",
    "Curiosity keeps knowledge moving instead of settling into habit",
    "Reliable tools free the mind to focus on meaningful problems",
    "Change becomes manageable once its direction is understood",
    "Stories connect facts in ways that lists never can",
    "Balance comes from knowing which constraints truly matter",
    "Each answer opens a door to a more interesting question",
];

const BABBLE: &[&str] = &["flux", "echo", "void", "spiral", "hum", "glass", "drift", "shard"];

/// Above this temperature word order is shuffled
const SCRAMBLE_TEMPERATURE: f64 = 1.5;

pub struct SyntheticGenerator {
    rng: Mutex<StdRng>,
}

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Probability that any word is replaced by babble
    pub fn corruption(temperature: f64) -> f64 {
        ((temperature - 0.3) / 2.0).clamp(0.0, 0.95)
    }

    fn compose<R: Rng + ?Sized>(temperature: f64, sentences: usize, rng: &mut R) -> String {
        let corruption = Self::corruption(temperature);
        let mut out = Vec::with_capacity(sentences);

        for _ in 0..sentences {
            let source = CORPUS.choose(rng).copied().unwrap_or_default();
            let mut words: Vec<&str> = source
                .split_whitespace()
                .map(|w| {
                    if rng.gen::<f64>() < corruption {
                        BABBLE.choose(rng).copied().unwrap_or(w)
                    } else {
                        w
                    }
                })
                .collect();

            // ragged sentence lengths
            if rng.gen::<f64>() < corruption {
                let keep = rng.gen_range(1..=words.len());
                words.truncate(keep);
            }

            if temperature >= SCRAMBLE_TEMPERATURE {
                words.shuffle(rng);
                out.push(words.join(" "));
            } else {
                out.push(format!("{}.", words.join(" ")));
            }
        }
        out.join(" ")
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for SyntheticGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut rng = self.rng.lock();
        // roughly 12 words per sentence, 4/3 tokens per word
        let sentences = ((request.max_tokens as usize * 3 / 4) / 12).clamp(1, 4);
        Ok(Self::compose(request.temperature, sentences, &mut *rng))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
