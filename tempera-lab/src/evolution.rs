//! # Evolution Engine - Breeding Personalities
//!
//! A fixed-size population of genomes evolves generation by generation:
//!
//! ```text
//! evaluate ─► record ─► target reached? ─► select ─► crossover ─► mutate ─► replace
//!    ▲                                                                         │
//!    └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutation runs at an evolution temperature that climbs with the
//! generation count and is damped by population diversity:
//! `min((0.1 + g/100) · exp(-diversity), Tmax)`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tempera_core::config::{EvolutionConfig, TemperaConfig, ThermoConfig};
use tempera_core::error::{TemperaError, TemperaResult};
use tempera_core::{PersonalityGenome, PersonalityMatrix};

use crate::chain::{MonteCarloChain, TemperatureSchedule};
use crate::generator::Generator;

/// Scores one genome
#[async_trait]
pub trait FitnessFunction: Send + Sync {
    async fn evaluate(&self, genome: &PersonalityGenome) -> TemperaResult<f64>;
}

/// Synchronous closure as a fitness function
pub struct FnFitness<F>(pub F);

#[async_trait]
impl<F> FitnessFunction for FnFitness<F>
where
    F: Fn(&PersonalityGenome) -> TemperaResult<f64> + Send + Sync,
{
    async fn evaluate(&self, genome: &PersonalityGenome) -> TemperaResult<f64> {
        (self.0)(genome)
    }
}

/// Fitness = mean coherence of a short chain run with the expressed personality
pub struct ChainFitness {
    generator: Arc<dyn Generator>,
    config: TemperaConfig,
    prompts: Vec<String>,
    schedule: TemperatureSchedule,
}

impl ChainFitness {
    pub fn new(
        generator: Arc<dyn Generator>,
        config: TemperaConfig,
        prompts: Vec<String>,
        schedule: TemperatureSchedule,
    ) -> Self {
        Self {
            generator,
            config,
            prompts,
            schedule,
        }
    }
}

#[async_trait]
impl FitnessFunction for ChainFitness {
    async fn evaluate(&self, genome: &PersonalityGenome) -> TemperaResult<f64> {
        let mut chain = MonteCarloChain::from_config(self.generator.clone(), &self.config, genome.express());
        let states = chain.run(&self.prompts, &self.schedule).await;

        // skip the seed state
        let coherences: Vec<f64> = states
            .iter()
            .skip(1)
            .filter(|s| !s.is_error())
            .map(|s| s.coherence)
            .collect();
        if coherences.is_empty() {
            let reason = states
                .iter()
                .find_map(|s| s.failure.clone())
                .unwrap_or_else(|| "no scored states".to_string());
            return Err(TemperaError::invalid_state(reason));
        }
        Ok(coherences.iter().sum::<f64>() / coherences.len() as f64)
    }
}

/// Statistics of one evaluated generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: usize,
    pub max_fitness: f64,
    pub avg_fitness: f64,
    pub diversity: f64,
    /// Temperature used to mutate the next generation
    pub temperature: f64,
}

/// Generational genetic algorithm over personality genomes
pub struct EvolutionEngine {
    config: EvolutionConfig,
    thermo: ThermoConfig,
    population: Vec<PersonalityGenome>,
    history: Vec<GenerationRecord>,
    best: Option<(PersonalityGenome, f64)>,
    rng: StdRng,
}

impl EvolutionEngine {
    pub fn new(config: EvolutionConfig, thermo: ThermoConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            thermo,
            population: Vec::new(),
            history: Vec::new(),
            best: None,
            rng,
        }
    }

    pub fn from_config(config: &TemperaConfig) -> Self {
        Self::new(config.evolution.clone(), config.thermo.clone())
    }

    pub fn population(&self) -> &[PersonalityGenome] {
        &self.population
    }

    pub fn history(&self) -> &[GenerationRecord] {
        &self.history
    }

    /// Fittest genome seen so far with its score
    pub fn best(&self) -> Option<(&PersonalityGenome, f64)> {
        self.best.as_ref().map(|(g, f)| (g, *f))
    }

    /// Fill the population with independently mutated copies of the seed
    pub fn initialize_population(&mut self, seed: &PersonalityMatrix) {
        let base = PersonalityGenome::new(seed, &self.thermo);
        let (low, high) = (self.config.init_temperature_min, self.config.init_temperature_max);
        self.population = (0..self.config.population_size)
            .map(|_| {
                let temperature = if high > low { self.rng.gen_range(low..high) } else { low };
                base.mutate(temperature, &mut self.rng)
            })
            .collect();
        self.history.clear();
        self.best = None;
        info!("🧬 Population initialized: {} genomes", self.population.len());
    }

    /// Mutation temperature for a generation
    pub fn evolution_temperature(&self, generation: usize, diversity: f64) -> f64 {
        let rising = 0.1 + generation as f64 / 100.0;
        (rising * (-diversity).exp()).min(self.config.max_evolution_temperature)
    }

    /// Mean pairwise distance across the population
    pub fn diversity(&self) -> f64 {
        population_diversity(&self.population)
    }

    /// Run up to `generations` generations.
    ///
    /// Stops early once the best fitness reaches `target`. The returned
    /// history holds one record per evaluated generation. A failing
    /// fitness evaluation aborts the run.
    pub async fn evolve(
        &mut self,
        generations: usize,
        fitness: &dyn FitnessFunction,
        target: Option<f64>,
    ) -> TemperaResult<Vec<GenerationRecord>> {
        if self.population.is_empty() {
            return Err(TemperaError::invalid_state("population not initialized"));
        }
        self.history.clear();

        for generation in 0..generations {
            let scores = self.evaluate(generation, fitness).await?;

            let max_fitness = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg_fitness = scores.iter().sum::<f64>() / scores.len() as f64;
            let diversity = self.diversity();
            let temperature = self.evolution_temperature(generation, diversity);

            if let Some(best_idx) = argmax(&scores) {
                let improved = self.best.as_ref().map_or(true, |(_, f)| scores[best_idx] > *f);
                if improved {
                    self.best = Some((self.population[best_idx].clone(), scores[best_idx]));
                }
            }

            info!(
                "🧬 Generation {}: max={:.3} avg={:.3} diversity={:.3} T={:.3}",
                generation, max_fitness, avg_fitness, diversity, temperature
            );
            self.history.push(GenerationRecord {
                generation,
                max_fitness,
                avg_fitness,
                diversity,
                temperature,
            });

            if target.map_or(false, |t| max_fitness >= t) {
                info!("🎯 Target fitness reached in generation {}", generation);
                break;
            }
            if generation + 1 == generations {
                break;
            }

            self.population = self.breed(&scores, temperature);
        }

        Ok(self.history.clone())
    }

    async fn evaluate(&self, generation: usize, fitness: &dyn FitnessFunction) -> TemperaResult<Vec<f64>> {
        let calls: Vec<_> = self.population.iter().map(|genome| fitness.evaluate(genome)).collect();
        let results: Vec<TemperaResult<f64>> = stream::iter(calls)
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        results
            .into_iter()
            .enumerate()
            .map(|(idx, result)| result.map_err(|e| TemperaError::evaluation(generation, idx, e.to_string())))
            .collect()
    }

    /// Fitness-proportional sampling without replacement of the breeding set
    fn select_parents(&mut self, scores: &[f64]) -> Vec<usize> {
        let n = scores.len();
        let k = ((self.config.selection_pressure * n as f64).ceil() as usize).clamp(2.min(n), n);

        let floor = scores.iter().copied().fold(f64::INFINITY, f64::min).min(0.0);
        let indices: Vec<usize> = (0..n).collect();
        // a small offset keeps zero-fitness genomes selectable
        let weight = |i: &usize| {
            let w = scores[*i] - floor + 1e-9;
            if w.is_finite() {
                w
            } else {
                1e-9
            }
        };

        match indices.choose_multiple_weighted(&mut self.rng, k, weight) {
            Ok(chosen) => chosen.copied().collect(),
            Err(e) => {
                debug!("⚖️ Weighted selection failed ({}), selecting uniformly", e);
                indices.choose_multiple(&mut self.rng, k).copied().collect()
            }
        }
    }

    fn breed(&mut self, scores: &[f64], temperature: f64) -> Vec<PersonalityGenome> {
        let parents = self.select_parents(scores);
        let size = self.config.population_size;
        let mut next = Vec::with_capacity(size);

        while next.len() < size {
            let pair: Vec<usize> = parents.choose_multiple(&mut self.rng, 2).copied().collect();
            let child = match pair[..] {
                [a, b] => self.population[a].crossover(&self.population[b], &mut self.rng),
                [a] => self.population[a].clone(),
                _ => break,
            };
            next.push(child.mutate(temperature, &mut self.rng));
        }
        next
    }
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

/// Mean pairwise genome distance, computed in parallel
pub fn population_diversity(population: &[PersonalityGenome]) -> f64 {
    let n = population.len();
    if n < 2 {
        return 0.0;
    }
    let total: f64 = (0..n)
        .into_par_iter()
        .map(|i| {
            population[i + 1..]
                .iter()
                .map(|other| population[i].distance(other))
                .sum::<f64>()
        })
        .sum();
    total / (n * (n - 1) / 2) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::{BrokenGenerator, EchoGenerator};

    fn seed() -> PersonalityMatrix {
        PersonalityMatrix::new(
            vec!["explore logical patterns".into(), "build reliable systems".into()],
            "precise steady system",
            "A framework of organized knowledge",
        )
    }

    fn engine(population_size: usize) -> EvolutionEngine {
        let config = EvolutionConfig {
            population_size,
            seed: Some(7),
            ..EvolutionConfig::default()
        };
        let mut engine = EvolutionEngine::new(config, ThermoConfig::default());
        engine.initialize_population(&seed());
        engine
    }

    fn goal_length(genome: &PersonalityGenome) -> TemperaResult<f64> {
        Ok(genome.express().goals().iter().map(|g| g.len() as f64).sum::<f64>() / 100.0)
    }

    #[test]
    fn test_initial_population_size() {
        let engine = engine(6);
        assert_eq!(engine.population().len(), 6);
    }

    #[test]
    fn test_evolution_temperature() {
        let engine = engine(4);
        assert!((engine.evolution_temperature(0, 0.0) - 0.1).abs() < 1e-12);
        assert!((engine.evolution_temperature(50, 0.0) - 0.6).abs() < 1e-12);
        assert_eq!(engine.evolution_temperature(10_000, 0.0), 2.0);
        // diversity damps
        assert!(engine.evolution_temperature(50, 1.0) < engine.evolution_temperature(50, 0.1));
    }

    #[test]
    fn test_diversity_of_clones_is_zero() {
        let genome = PersonalityGenome::new(&seed(), &ThermoConfig::default());
        let population = vec![genome.clone(), genome.clone(), genome];
        assert_eq!(population_diversity(&population), 0.0);
        assert_eq!(population_diversity(&population[..1]), 0.0);
    }

    #[tokio::test]
    async fn test_history_length_and_constant_population() {
        let mut engine = engine(8);
        let history = engine.evolve(5, &FnFitness(goal_length), None).await.unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(engine.population().len(), 8);
        for (i, record) in history.iter().enumerate() {
            assert_eq!(record.generation, i);
            assert!(record.max_fitness >= record.avg_fitness);
            assert!(record.temperature <= 2.0);
        }
        assert!(engine.best().is_some());
    }

    #[tokio::test]
    async fn test_target_stops_early() {
        let mut engine = engine(5);
        let history = engine
            .evolve(10, &FnFitness(|_: &PersonalityGenome| -> TemperaResult<f64> { Ok(1.0) }), Some(0.5))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(engine.population().len(), 5);
    }

    #[tokio::test]
    async fn test_evaluation_error_aborts() {
        let mut engine = engine(4);
        let failing = FnFitness(|_: &PersonalityGenome| -> TemperaResult<f64> {
            Err(TemperaError::invalid_state("judge offline"))
        });
        match engine.evolve(3, &failing, None).await {
            Err(TemperaError::Evaluation { generation, genome, reason }) => {
                assert_eq!(generation, 0);
                assert_eq!(genome, 0);
                assert!(reason.contains("judge offline"));
            }
            other => panic!("unexpected {:?}", other.map(|h| h.len())),
        }
    }

    #[tokio::test]
    async fn test_uninitialized_engine_refuses() {
        let mut engine = EvolutionEngine::new(EvolutionConfig::default(), ThermoConfig::default());
        assert!(engine.evolve(1, &FnFitness(goal_length), None).await.is_err());
    }

    #[test]
    fn test_selection_handles_negative_and_zero_scores() {
        let mut engine = engine(4);
        for scores in [[-1.0, -2.0, 0.5, 0.0], [0.0; 4]] {
            let parents = engine.select_parents(&scores);
            assert_eq!(parents.len(), 2);
            assert_ne!(parents[0], parents[1]);
        }
    }

    #[tokio::test]
    async fn test_chain_fitness_is_mean_coherence() {
        let config = TemperaConfig::default();
        let fitness = ChainFitness::new(
            Arc::new(EchoGenerator::default()),
            config,
            vec!["hello world".into()],
            TemperatureSchedule::linear(0.2, 1.0, 3),
        );
        let genome = PersonalityGenome::new(&seed(), &ThermoConfig::default());
        let score = fitness.evaluate(&genome).await.unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[tokio::test]
    async fn test_chain_fitness_fails_without_text() {
        let fitness = ChainFitness::new(
            Arc::new(BrokenGenerator),
            TemperaConfig::default(),
            vec!["hello".into()],
            TemperatureSchedule::constant(0.5, 2),
        );
        let genome = PersonalityGenome::new(&seed(), &ThermoConfig::default());
        assert!(fitness.evaluate(&genome).await.is_err());
    }
}
