//! # Tempera Core
//!
//! Thermodynamic scoring and genetic encoding of LLM personalities.
//!
//! This crate provides the synchronous building blocks:
//! - **Metrics**: coherence and entropy of a piece of text
//! - **Thermo**: free energy, order parameter and phase of a response
//! - **Personality**: the trait matrix a prompt is built from
//! - **Genome**: chromosomes, mutation, crossover and robustness
//! - **Sampler**: temperature-aware personality proposal strategies
//! - **Landscape**: analysis of a finished temperature sweep
//!
//! ## Design Philosophy
//!
//! Temperature is the single control knob. The same value drives the
//! sampling temperature of the generator, the phase of the response,
//! how far personalities drift and which mutations a genome undergoes.
//!
//! Everything here is deterministic given an `Rng`, so the async engines
//! in `tempera-lab` can be tested with seeded generators.

pub mod config;
pub mod error;
pub mod genome;
pub mod landscape;
pub mod metrics;
pub mod mutation;
pub mod personality;
pub mod sampler;
pub mod thermo;
pub mod traits;

// Re-export main types at crate root
pub use config::TemperaConfig;
pub use error::{GenerationError, TemperaError, TemperaResult};
pub use genome::{Chromosome, Gene, PersonalityGenome, Robustness};
pub use landscape::{validate_energy_landscape, LandscapeReport, PhaseSummary};
pub use metrics::TextMetrics;
pub use mutation::MutationClass;
pub use personality::PersonalityMatrix;
pub use sampler::{build_sampler, FixedSampler, TraitFamily, TraitPoolSampler};
pub use thermo::{Phase, ThermoState, ThermodynamicScorer};
pub use traits::PersonalitySampler;

/// Version of the persisted run format
pub const RUN_FORMAT_VERSION: u32 = 1;
