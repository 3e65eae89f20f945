//! # Configuration - Tempera's Experimental Parameters
//!
//! Every constant that shapes a run lives here: the thermodynamic
//! coupling constants, the temperature schedule, population settings
//! and the generator backend.

use serde::{Deserialize, Serialize};

use crate::error::{TemperaError, TemperaResult};
use crate::sampler::TraitFamily;

/// Master configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TemperaConfig {
    /// Thermodynamic constants and phase boundaries
    #[serde(default)]
    pub thermo: ThermoConfig,

    /// Monte Carlo chain settings
    #[serde(default)]
    pub chain: ChainConfig,

    /// Genetic evolution settings
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Generator backend settings
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Personality sampling strategy
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// Where runs are persisted
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Thermodynamic constants
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThermoConfig {
    /// Entropy-term scaling (sigmoid steepness)
    pub beta: f64,

    /// Critical temperature Tc
    pub critical_temperature: f64,

    /// Enthalpy-temperature coupling
    pub alpha: f64,

    /// Scale of the Gaussian noise added to free energy
    pub noise_scale: f64,

    /// Floor that keeps ln(coherence) finite
    pub epsilon: f64,

    /// T1: coherent -> semi-coherent
    pub coherent_to_semi: f64,

    /// T2: semi-coherent -> chaotic
    pub semi_to_chaotic: f64,

    /// Boltzmann constant used by the acceptance rule
    pub boltzmann: f64,
}

impl Default for ThermoConfig {
    fn default() -> Self {
        Self {
            beta: 1.0,
            critical_temperature: 1.0,
            alpha: 0.1,
            noise_scale: 0.1,
            epsilon: 1e-10,
            coherent_to_semi: 0.8,
            semi_to_chaotic: 1.5,
            boltzmann: 1.0,
        }
    }
}

/// Monte Carlo chain settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    /// First temperature of the schedule
    pub base_temperature: f64,

    /// Last temperature of the schedule
    pub max_temperature: f64,

    /// Number of temperatures in the schedule
    pub steps: usize,

    /// Maximum generation requests in flight within one temperature
    pub batch_size: usize,

    /// Temperature of the seed state
    pub initial_temperature: f64,

    /// Fixed RNG seed (None = entropy)
    pub seed: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            base_temperature: 0.1,
            max_temperature: 2.0,
            steps: 20,
            batch_size: 5,
            initial_temperature: 0.1,
            seed: None,
        }
    }
}

/// Genetic evolution settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Constant population size
    pub population_size: usize,

    /// Fraction of the population allowed to breed
    pub selection_pressure: f64,

    /// Temperature range for the initial mutation of each seed copy
    pub init_temperature_min: f64,
    pub init_temperature_max: f64,

    /// Upper clamp of the evolution temperature
    pub max_evolution_temperature: f64,

    /// Fitness evaluations in flight at once
    pub max_concurrency: usize,

    /// Fixed RNG seed (None = entropy)
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            selection_pressure: 0.5,
            init_temperature_min: 0.1,
            init_temperature_max: 2.0,
            max_evolution_temperature: 2.0,
            max_concurrency: 4,
            seed: None,
        }
    }
}

/// Generator backend settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// OpenAI-compatible API root
    pub base_url: String,

    /// Model name sent with every request
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Token budget per response
    pub max_tokens: u32,

    /// Attempts before a request is declared failed
    pub max_retries: u32,

    /// First backoff delay; doubles on each retry
    pub retry_delay_ms: u64,

    /// Optional persistent response cache
    pub cache_path: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 100,
            max_retries: 3,
            retry_delay_ms: 1000,
            cache_path: None,
        }
    }
}

/// Which personality sampler to build
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerStrategy {
    /// Always return the base personality
    Fixed,
    /// Perturb traits from the trait pools
    TraitPool,
}

/// Personality sampling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub strategy: SamplerStrategy,

    /// Trait family favoured when perturbing
    pub bias: Option<TraitFamily>,

    /// States below this coherence fail validation
    pub min_coherence: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            strategy: SamplerStrategy::Fixed,
            bias: None,
            min_coherence: 0.0,
        }
    }
}

/// Run persistence settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub base_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: "data".to_string(),
        }
    }
}

impl TemperaConfig {
    /// Load configuration from file
    pub fn load(path: &str) -> TemperaResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> TemperaResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create config from environment variables
    ///
    /// Reads:
    /// - TEMPERA_STEPS: Temperatures in the chain schedule (default: 20)
    /// - TEMPERA_BATCH_SIZE: Concurrent requests per temperature (default: 5)
    /// - TEMPERA_POPULATION: Evolution population size (default: 10)
    /// - TEMPERA_MODEL: Model name (default: gpt-4)
    /// - TEMPERA_BASE_URL: OpenAI-compatible API root
    /// - TEMPERA_SEED: Seed for chain and evolution RNGs
    /// - TEMPERA_SAMPLER: "fixed" or "trait_pool"
    /// - TEMPERA_CACHE: Path of the persistent response cache
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("TEMPERA_STEPS") {
            config.chain.steps = v;
        }
        if let Some(v) = env_parse("TEMPERA_BATCH_SIZE") {
            config.chain.batch_size = v;
        }
        if let Some(v) = env_parse("TEMPERA_POPULATION") {
            config.evolution.population_size = v;
        }
        if let Ok(model) = std::env::var("TEMPERA_MODEL") {
            config.generator.model = model;
        }
        if let Ok(url) = std::env::var("TEMPERA_BASE_URL") {
            config.generator.base_url = url;
        }
        if let Some(seed) = env_parse::<u64>("TEMPERA_SEED") {
            config.chain.seed = Some(seed);
            config.evolution.seed = Some(seed.wrapping_add(1));
        }
        if let Ok(path) = std::env::var("TEMPERA_CACHE") {
            config.generator.cache_path = Some(path);
        }
        match std::env::var("TEMPERA_SAMPLER").map(|s| s.to_lowercase()).as_deref() {
            Ok("trait_pool") | Ok("traitpool") => config.sampler.strategy = SamplerStrategy::TraitPool,
            Ok("fixed") => config.sampler.strategy = SamplerStrategy::Fixed,
            _ => {}
        }

        config
    }

    /// Reject parameter combinations the engines cannot run with
    pub fn validate(&self) -> TemperaResult<()> {
        let t = &self.thermo;
        if t.critical_temperature <= 0.0 {
            return Err(TemperaError::config("critical_temperature must be > 0"));
        }
        if t.coherent_to_semi >= t.semi_to_chaotic {
            return Err(TemperaError::config(format!(
                "phase boundaries must satisfy T1 < T2 (got {} >= {})",
                t.coherent_to_semi, t.semi_to_chaotic
            )));
        }
        if t.boltzmann <= 0.0 {
            return Err(TemperaError::config("boltzmann must be > 0"));
        }
        if self.chain.batch_size == 0 {
            return Err(TemperaError::config("batch_size must be >= 1"));
        }
        if self.chain.base_temperature <= 0.0 || self.chain.max_temperature < self.chain.base_temperature {
            return Err(TemperaError::config("temperature schedule must be positive and ascending"));
        }
        let e = &self.evolution;
        if e.population_size < 2 {
            return Err(TemperaError::config("population_size must be >= 2"));
        }
        if !(e.selection_pressure > 0.0 && e.selection_pressure <= 1.0) {
            return Err(TemperaError::config("selection_pressure must be in (0, 1]"));
        }
        if e.max_concurrency == 0 {
            return Err(TemperaError::config("max_concurrency must be >= 1"));
        }
        if e.init_temperature_min <= 0.0 || e.init_temperature_max <= e.init_temperature_min {
            return Err(TemperaError::config("initial temperature range must be positive and non-empty"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TemperaConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_boundaries() {
        let mut config = TemperaConfig::default();
        config.thermo.coherent_to_semi = 1.6;
        assert!(matches!(config.validate(), Err(TemperaError::Config(_))));
    }

    #[test]
    fn test_rejects_tiny_population() {
        let mut config = TemperaConfig::default();
        config.evolution.population_size = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("tempera-config-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let mut config = TemperaConfig::default();
        config.chain.steps = 7;
        config.sampler.strategy = SamplerStrategy::TraitPool;
        config.save(&path).unwrap();

        let loaded = TemperaConfig::load(&path).unwrap();
        assert_eq!(loaded.chain.steps, 7);
        assert_eq!(loaded.sampler.strategy, SamplerStrategy::TraitPool);
        std::fs::remove_file(&path).ok();
    }
}
