//! # Monte Carlo Chain - Walking the Temperature Schedule
//!
//! Each step proposes a response from the generator, scores it and
//! applies the Metropolis rule against the current state:
//!
//! ```text
//! ΔE = E(candidate) - E(current)
//! ΔE ≤ 0            → accept
//! ΔE > 0            → accept with probability exp(-ΔE / kB·T)
//! rejected          → current state is appended again
//! generation failed → error state appended, current kept
//! ```
//!
//! The chain grows by exactly one entry per step. Within one temperature
//! all prompts are generated concurrently, then scored and accepted in
//! prompt order before the next temperature starts.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use tempera_core::config::TemperaConfig;
use tempera_core::error::GenerationError;
use tempera_core::sampler::{build_sampler, linspace};
use tempera_core::{PersonalityMatrix, PersonalitySampler, ThermoState, ThermodynamicScorer};

use crate::generator::{GenerationRequest, Generator};

/// Metropolis criterion: `ΔE ≤ 0` always accepts
pub fn metropolis_accept<R: Rng + ?Sized>(delta_energy: f64, temperature: f64, boltzmann: f64, rng: &mut R) -> bool {
    if delta_energy <= 0.0 {
        return true;
    }
    let thermal = boltzmann * temperature;
    if thermal <= 0.0 {
        return false;
    }
    rng.gen::<f64>() < (-delta_energy / thermal).exp()
}

/// Ordered temperatures a chain visits
#[derive(Clone, Debug, PartialEq)]
pub struct TemperatureSchedule {
    temperatures: Vec<f64>,
}

impl TemperatureSchedule {
    /// `steps` evenly spaced temperatures from `start` to `end` inclusive
    pub fn linear(start: f64, end: f64, steps: usize) -> Self {
        Self {
            temperatures: linspace(start, end, steps),
        }
    }

    pub fn constant(temperature: f64, steps: usize) -> Self {
        Self {
            temperatures: vec![temperature; steps],
        }
    }

    pub fn from_temperatures(temperatures: Vec<f64>) -> Self {
        Self { temperatures }
    }

    pub fn from_config(config: &TemperaConfig) -> Self {
        Self::linear(config.chain.base_temperature, config.chain.max_temperature, config.chain.steps)
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    pub fn len(&self) -> usize {
        self.temperatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty()
    }
}

/// Outcome of one acceptance decision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    Rejected,
    Failed,
}

/// Running acceptance counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainStats {
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl ChainStats {
    fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Accepted => self.accepted += 1,
            StepOutcome::Rejected => self.rejected += 1,
            StepOutcome::Failed => self.failed += 1,
        }
    }

    /// Accepted fraction of the steps that produced text
    pub fn acceptance_rate(&self) -> f64 {
        let scored = self.accepted + self.rejected;
        if scored == 0 {
            0.0
        } else {
            self.accepted as f64 / scored as f64
        }
    }
}

/// Metropolis sampler over generated responses
pub struct MonteCarloChain {
    generator: Arc<dyn Generator>,
    scorer: ThermodynamicScorer,
    sampler: Box<dyn PersonalitySampler>,
    personality: PersonalityMatrix,
    current: Option<ThermoState>,
    states: Vec<ThermoState>,
    stats: ChainStats,
    batch_size: usize,
    max_tokens: u32,
    initial_temperature: f64,
    rng: StdRng,
}

impl MonteCarloChain {
    pub fn new(
        generator: Arc<dyn Generator>,
        scorer: ThermodynamicScorer,
        sampler: Box<dyn PersonalitySampler>,
        personality: PersonalityMatrix,
    ) -> Self {
        Self {
            generator,
            scorer,
            sampler,
            personality,
            current: None,
            states: Vec::new(),
            stats: ChainStats::default(),
            batch_size: 5,
            max_tokens: 100,
            initial_temperature: 0.1,
            rng: StdRng::from_entropy(),
        }
    }

    /// Chain wired from the configuration sections
    pub fn from_config(generator: Arc<dyn Generator>, config: &TemperaConfig, personality: PersonalityMatrix) -> Self {
        let sampler = build_sampler(&config.sampler, personality.clone());
        let chain = Self::new(generator, ThermodynamicScorer::new(config.thermo.clone()), sampler, personality)
            .with_batch_size(config.chain.batch_size)
            .with_max_tokens(config.generator.max_tokens)
            .with_initial_temperature(config.chain.initial_temperature);
        match config.chain.seed {
            Some(seed) => chain.with_seed(seed),
            None => chain,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_initial_temperature(mut self, temperature: f64) -> Self {
        self.initial_temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Every entry so far, seed state first
    pub fn states(&self) -> &[ThermoState] {
        &self.states
    }

    pub fn current(&self) -> Option<&ThermoState> {
        self.current.as_ref()
    }

    pub fn stats(&self) -> ChainStats {
        self.stats
    }

    pub fn scorer(&self) -> &ThermodynamicScorer {
        &self.scorer
    }

    /// Drop all states and restart from a new personality
    pub fn reset(&mut self, personality: PersonalityMatrix) {
        self.personality = personality;
        self.current = None;
        self.states.clear();
        self.stats = ChainStats::default();
    }

    /// Score the empty response at the initial temperature as the seed state
    fn ensure_seeded(&mut self) {
        if self.current.is_some() {
            return;
        }
        let seed = self.scorer.score(
            "",
            self.initial_temperature,
            None,
            &self.personality,
            &mut self.rng,
        );
        debug!("🌱 Seed state E={:.3} at T={:.2}", seed.energy, seed.temperature);
        self.states.push(seed.clone());
        self.current = Some(seed);
    }

    fn request(&self, prompt: &str, temperature: f64, personality: &PersonalityMatrix) -> GenerationRequest {
        GenerationRequest::new(prompt, temperature)
            .with_system_prompt(personality.system_prompt())
            .with_max_tokens(self.max_tokens)
    }

    /// Score a generation result and apply the acceptance rule
    fn advance(
        &mut self,
        temperature: f64,
        personality: PersonalityMatrix,
        result: Result<String, GenerationError>,
    ) -> StepOutcome {
        let Some(current) = self.current.clone() else {
            return StepOutcome::Failed;
        };

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                debug!("⚠️ Generation failed at T={:.2}: {}", temperature, e);
                self.states.push(ThermoState::failed(temperature, personality, e.to_string()));
                self.stats.record(StepOutcome::Failed);
                return StepOutcome::Failed;
            }
        };

        let candidate = self
            .scorer
            .score(&text, temperature, Some(current.energy), &personality, &mut self.rng);
        let boltzmann = self.scorer.params().boltzmann;

        let outcome = if self.sampler.validate(&candidate)
            && metropolis_accept(candidate.delta_energy, temperature, boltzmann, &mut self.rng)
        {
            self.personality = personality;
            self.current = Some(candidate.clone());
            self.states.push(candidate);
            StepOutcome::Accepted
        } else {
            self.states.push(current);
            StepOutcome::Rejected
        };
        self.stats.record(outcome);
        outcome
    }

    /// One proposal at `temperature`; returns the appended entry
    pub async fn step(&mut self, prompt: &str, temperature: f64) -> &ThermoState {
        self.ensure_seeded();
        let personality = self.sampler.sample(temperature, &mut self.rng);
        let request = self.request(prompt, temperature, &personality);
        let result = self.generator.generate(&request).await;
        self.advance(temperature, personality, result);
        self.last()
    }

    fn last(&self) -> &ThermoState {
        // advance always pushes after ensure_seeded
        &self.states[self.states.len() - 1]
    }

    /// Walk the whole schedule, every prompt at every temperature.
    ///
    /// Returns every entry appended by this call, in schedule order then
    /// prompt order. The seed state is included on a fresh chain.
    pub async fn run(&mut self, prompts: &[String], schedule: &TemperatureSchedule) -> Vec<ThermoState> {
        let start = self.states.len();
        self.ensure_seeded();
        info!(
            "🔥 Chain start: {} temperatures × {} prompts ({} sampler, {} generator)",
            schedule.len(),
            prompts.len(),
            self.sampler.name(),
            self.generator.name()
        );

        for &temperature in schedule.temperatures() {
            let before = self.stats;

            let personalities: Vec<PersonalityMatrix> = prompts
                .iter()
                .map(|_| self.sampler.sample(temperature, &mut self.rng))
                .collect();
            let requests: Vec<GenerationRequest> = prompts
                .iter()
                .zip(&personalities)
                .map(|(prompt, personality)| self.request(prompt, temperature, personality))
                .collect();

            // barrier: every request of this temperature completes first
            let results = self.generator.generate_batch(&requests, self.batch_size).await;

            for (personality, result) in personalities.into_iter().zip(results) {
                self.advance(temperature, personality, result);
            }

            let phase = self.current.as_ref().map(|s| s.phase.name()).unwrap_or("none");
            info!(
                "🌡️ T={:.2}: {} accepted, {} rejected, {} failed (current phase {})",
                temperature,
                self.stats.accepted - before.accepted,
                self.stats.rejected - before.rejected,
                self.stats.failed - before.failed,
                phase
            );
        }

        info!(
            "✅ Chain finished: {} states, acceptance {:.1}%",
            self.states.len(),
            self.stats.acceptance_rate() * 100.0
        );
        self.states[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::{BrokenGenerator, EchoGenerator};
    use rand_chacha::ChaCha8Rng;
    use tempera_core::config::ThermoConfig;
    use tempera_core::{FixedSampler, Phase};

    fn personality() -> PersonalityMatrix {
        PersonalityMatrix::new(vec!["explore ideas".into()], "curious", "open")
    }

    fn quiet_scorer() -> ThermodynamicScorer {
        ThermodynamicScorer::new(ThermoConfig {
            noise_scale: 0.0,
            ..ThermoConfig::default()
        })
    }

    fn chain(generator: Arc<dyn Generator>) -> MonteCarloChain {
        MonteCarloChain::new(
            generator,
            quiet_scorer(),
            Box::new(FixedSampler::new(personality())),
            personality(),
        )
        .with_seed(42)
        .with_batch_size(2)
    }

    #[test]
    fn test_downhill_always_accepted() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1000 {
            assert!(metropolis_accept(0.0, 0.5, 1.0, &mut rng));
            assert!(metropolis_accept(-3.0, 0.01, 1.0, &mut rng));
        }
    }

    #[test]
    fn test_acceptance_frequency_matches_boltzmann() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for &(delta, temperature) in &[(0.5, 1.0), (1.0, 0.5), (0.2, 2.0)] {
            let trials = 20_000;
            let hits = (0..trials)
                .filter(|_| metropolis_accept(delta, temperature, 1.0, &mut rng))
                .count();
            let expected = (-delta / temperature).exp();
            let observed = hits as f64 / trials as f64;
            assert!((observed - expected).abs() < 0.02, "{} vs {}", observed, expected);
        }
    }

    #[test]
    fn test_zero_temperature_rejects_uphill() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(!metropolis_accept(0.1, 0.0, 1.0, &mut rng));
    }

    #[test]
    fn test_linear_schedule() {
        let schedule = TemperatureSchedule::linear(0.1, 2.0, 20);
        assert_eq!(schedule.len(), 20);
        assert!((schedule.temperatures()[0] - 0.1).abs() < 1e-12);
        assert!((schedule.temperatures()[19] - 2.0).abs() < 1e-12);
        assert!(schedule.temperatures().windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_run_grows_one_entry_per_step() {
        let mut chain = chain(Arc::new(EchoGenerator::default()));
        let prompts: Vec<String> = vec!["a b c".into(), "d e f".into(), "g h i".into()];
        let schedule = TemperatureSchedule::linear(0.2, 1.8, 4);
        let states = chain.run(&prompts, &schedule).await;

        // seed + 4 temperatures × 3 prompts
        assert_eq!(states.len(), 13);
        let temps: Vec<f64> = states[1..].iter().map(|s| s.temperature).collect();
        for (i, t) in temps.iter().enumerate() {
            assert_eq!(*t, schedule.temperatures()[i / 3]);
        }
        let stats = chain.stats();
        assert_eq!(stats.accepted + stats.rejected, 12);
    }

    #[tokio::test]
    async fn test_first_real_response_beats_empty_seed() {
        let mut chain = chain(Arc::new(EchoGenerator::default()));
        let state = chain.step("alpha beta gamma", 0.3).await.clone();
        assert_eq!(state.response, "echo alpha beta gamma");
        assert!(state.delta_energy < 0.0);
    }

    #[tokio::test]
    async fn test_uphill_step_reappends_current() {
        let mut chain = chain(Arc::new(EchoGenerator::default()));
        let good = chain.step("alpha beta gamma delta", 0.05).await.clone();
        let after = chain.step("la la la la la la", 0.05).await.clone();
        assert_eq!(after, good);
        assert_eq!(chain.states().len(), 3);
        assert_eq!(chain.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_failed_generation_is_filterable() {
        let mut chain = chain(Arc::new(BrokenGenerator));
        let prompts = vec!["x".to_string(), "y".to_string()];
        let states = chain.run(&prompts, &TemperatureSchedule::constant(0.5, 3)).await;

        assert_eq!(states.len(), 7);
        let errors: Vec<&ThermoState> = states.iter().filter(|s| s.is_error()).collect();
        assert_eq!(errors.len(), 6);
        for state in errors {
            assert_eq!(state.energy, 0.0);
            assert!(state.failure.as_deref().unwrap_or_default().contains("503"));
        }
        // seed remains current
        assert_eq!(chain.current().map(|s| s.response.as_str()), Some(""));
        assert_eq!(chain.stats().failed, 6);
    }

    #[tokio::test]
    async fn test_reset_restarts_chain() {
        let mut chain = chain(Arc::new(EchoGenerator::default()));
        chain.step("one two", 0.5).await;
        chain.reset(personality());
        assert!(chain.states().is_empty());
        assert!(chain.current().is_none());
        let state = chain.step("three four", 0.5).await;
        assert_ne!(state.phase, Phase::Error);
        assert_eq!(chain.states().len(), 2);
    }
}
