//! # Traits - Capabilities Plugged Into the Engines
//!
//! The chain and the evolution engine only see these interfaces, so a
//! sampling strategy can be swapped by configuration without touching
//! either engine.

use rand::RngCore;

use crate::personality::PersonalityMatrix;
use crate::thermo::ThermoState;

/// Personality sampling strategy
///
/// - `sample` proposes a personality for a temperature
/// - `validate` decides whether a scored state is admissible
pub trait PersonalitySampler: Send + Sync {
    /// Propose a personality at `temperature`
    fn sample(&self, temperature: f64, rng: &mut dyn RngCore) -> PersonalityMatrix;

    /// Admit or reject a scored state
    fn validate(&self, state: &ThermoState) -> bool;

    /// Name of this strategy (for logging)
    fn name(&self) -> &'static str;
}
