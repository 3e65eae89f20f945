//! # Tempera Lab
//!
//! Async experiments on top of `tempera-core`:
//! - **Generator**: language model backends, retries and caching
//! - **Chain**: Metropolis Monte Carlo over a temperature schedule
//! - **Evolution**: genetic algorithm over personality genomes
//! - **Dreams**: free-association sequences under rising temperature
//! - **Storage**: run persistence
//!
//! The engines never own each other. A [`evolution::ChainFitness`]
//! composes a chain into a fitness function without either engine
//! knowing about the other.

pub mod chain;
pub mod config;
pub mod dreams;
pub mod evolution;
pub mod generator;
pub mod storage;

pub use chain::{metropolis_accept, ChainStats, MonteCarloChain, TemperatureSchedule};
pub use config::{LabConfig, Mode};
pub use dreams::{DreamInterpretation, DreamWeaver};
pub use evolution::{ChainFitness, EvolutionEngine, FitnessFunction, FnFitness, GenerationRecord};
pub use generator::{GenerationRequest, Generator, GeneratorStack};
pub use storage::{RunMetadata, RunStore};
