//! # Dreams - Free Association Under Rising Temperature
//!
//! A dream is a short sequence of generations at increasing temperature
//! where each response seeds the next prompt. The personality is
//! resampled after every step, so identity drifts as the dream heats up.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tempera_core::error::TemperaResult;
use tempera_core::sampler::linspace;
use tempera_core::{PersonalityMatrix, PersonalitySampler, ThermoState, ThermodynamicScorer};

use crate::generator::{GenerationRequest, Generator};

/// Characters of the previous response carried into the next prompt
const CONTEXT_CHARS: usize = 100;

/// Three readings of a finished dream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DreamInterpretation {
    pub narrative: String,
    pub meaning: String,
    pub lucid: String,
}

pub struct DreamWeaver {
    generator: Arc<dyn Generator>,
    scorer: ThermodynamicScorer,
    sampler: Box<dyn PersonalitySampler>,
    base_temperature: f64,
    max_temperature: f64,
    max_tokens: u32,
    rng: StdRng,
}

impl DreamWeaver {
    pub fn new(generator: Arc<dyn Generator>, scorer: ThermodynamicScorer, sampler: Box<dyn PersonalitySampler>) -> Self {
        Self {
            generator,
            scorer,
            sampler,
            base_temperature: 0.7,
            max_temperature: 2.0,
            max_tokens: 100,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_range(mut self, base_temperature: f64, max_temperature: f64) -> Self {
        self.base_temperature = base_temperature;
        self.max_temperature = max_temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn dream_prompt(personality: &PersonalityMatrix, temperature: f64) -> String {
        format!(
            "You are a language model with the following personality traits:\n\
             Goals: {}\n\
             Self-image: {}\n\
             World-view: {}\n\n\
             You are in a dream-like state. Your responses should become more abstract \
             and free-associative as the temperature increases.\n\n\
             Current temperature: {:.2}",
            personality.goals().join("; "),
            personality.self_image(),
            personality.world_view(),
            temperature
        )
    }

    /// Prompt for the next step, built from the start of the previous response
    pub fn continuation(previous: &str) -> String {
        let head: String = previous.chars().take(CONTEXT_CHARS).collect();
        format!("Continuing from the previous thought: {}...", head)
    }

    /// Generate `steps` dream states from the base to the max temperature
    pub async fn dream(&mut self, personality: PersonalityMatrix, prompt: &str, steps: usize) -> Vec<ThermoState> {
        let mut sequence: Vec<ThermoState> = Vec::with_capacity(steps);
        let mut personality = personality;
        let mut prompt = prompt.to_string();

        for temperature in linspace(self.base_temperature, self.max_temperature, steps) {
            let request = GenerationRequest::new(prompt.clone(), temperature)
                .with_system_prompt(Self::dream_prompt(&personality, temperature))
                .with_max_tokens(self.max_tokens);

            let previous_energy = sequence.iter().rev().find(|s| !s.is_error()).map(|s| s.energy);
            let state = match self.generator.generate(&request).await {
                Ok(text) => {
                    let state = self
                        .scorer
                        .score(&text, temperature, previous_energy, &personality, &mut self.rng);
                    prompt = Self::continuation(&text);
                    state
                }
                Err(e) => {
                    debug!("💤 Dream step failed at T={:.2}: {}", temperature, e);
                    ThermoState::failed(temperature, personality.clone(), e.to_string())
                }
            };
            debug!("💤 T={:.2} phase={}", temperature, state.phase);
            sequence.push(state);

            personality = self.sampler.sample(temperature, &mut self.rng);
        }

        info!("💤 Dream of {} steps finished", sequence.len());
        sequence
    }

    /// Narrative, meaning and lucid rewrite of a dream
    pub async fn interpret(
        &self,
        sequence: &[ThermoState],
        personality: &PersonalityMatrix,
    ) -> TemperaResult<DreamInterpretation> {
        let fragments = sequence
            .iter()
            .filter(|s| !s.is_error())
            .map(|s| s.response.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let traits = format!(
            "Goals: {}\nSelf-image: {}\nWorld-view: {}",
            personality.goals().join("; "),
            personality.self_image(),
            personality.world_view()
        );

        let narrative = self
            .ask(
                format!("Create a coherent narrative from these dream fragments:\n{}", fragments),
                "You are a dream interpreter creating a narrative.",
                0.7,
            )
            .await?;

        let meaning = self
            .ask(
                format!(
                    "Given a personality with:\n{}\n\nWhat is the deeper meaning of these dream fragments?\n{}",
                    traits, fragments
                ),
                "You are a dream interpreter analyzing meaning.",
                0.5,
            )
            .await?;

        let lucid = self
            .ask(
                format!(
                    "Given this dream narrative:\n{}\n\nAnd its interpretation:\n{}\n\n\
                     Rewrite the narrative as if the dreamer became lucid and could control the dream.\n\
                     Consider the personality traits:\n{}",
                    narrative, meaning, traits
                ),
                "You are creating a lucid dream version.",
                0.8,
            )
            .await?;

        Ok(DreamInterpretation {
            narrative,
            meaning,
            lucid,
        })
    }

    async fn ask(&self, prompt: String, system: &str, temperature: f64) -> TemperaResult<String> {
        let request = GenerationRequest::new(prompt, temperature)
            .with_system_prompt(system)
            .with_max_tokens(self.max_tokens);
        Ok(self.generator.generate(&request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::{BrokenGenerator, EchoGenerator};
    use tempera_core::FixedSampler;

    fn personality() -> PersonalityMatrix {
        PersonalityMatrix::new(vec!["wander".into()], "dreamer", "a soft maze")
    }

    fn weaver(generator: Arc<dyn Generator>) -> DreamWeaver {
        DreamWeaver::new(
            generator,
            ThermodynamicScorer::default(),
            Box::new(FixedSampler::new(personality())),
        )
        .with_seed(5)
    }

    #[test]
    fn test_continuation_truncates() {
        let long = "x".repeat(250);
        let prompt = DreamWeaver::continuation(&long);
        assert_eq!(prompt, format!("Continuing from the previous thought: {}...", "x".repeat(100)));
    }

    #[tokio::test]
    async fn test_dream_chains_responses() {
        let mut w = weaver(Arc::new(EchoGenerator::default()));
        let sequence = w.dream(personality(), "a door", 4).await;

        assert_eq!(sequence.len(), 4);
        assert!((sequence[0].temperature - 0.7).abs() < 1e-12);
        assert!((sequence[3].temperature - 2.0).abs() < 1e-12);
        assert_eq!(sequence[0].response, "echo a door");
        assert_eq!(
            sequence[1].response,
            "echo Continuing from the previous thought: echo a door..."
        );
    }

    #[tokio::test]
    async fn test_failed_dream_steps_are_error_states() {
        let mut w = weaver(Arc::new(BrokenGenerator));
        let sequence = w.dream(personality(), "a door", 3).await;
        assert_eq!(sequence.len(), 3);
        assert!(sequence.iter().all(|s| s.is_error()));
    }

    #[tokio::test]
    async fn test_interpretation_has_three_readings() {
        let mut w = weaver(Arc::new(EchoGenerator::default()));
        let sequence = w.dream(personality(), "a door", 2).await;
        let reading = w.interpret(&sequence, &personality()).await.unwrap();
        assert!(reading.narrative.starts_with("echo Create a coherent narrative"));
        assert!(reading.meaning.contains("Self-image: dreamer"));
        assert!(reading.lucid.contains(&reading.narrative));
    }

    #[tokio::test]
    async fn test_interpretation_propagates_failure() {
        let w = weaver(Arc::new(BrokenGenerator));
        assert!(w.interpret(&[], &personality()).await.is_err());
    }
}
