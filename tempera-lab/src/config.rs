//! Tempera Lab Configuration
//!
//! Driver settings layered on top of the core configuration

use std::env;
use std::str::FromStr;

use tempera_core::error::{TemperaError, TemperaResult};
use tempera_core::TemperaConfig;

/// Experiment the binary runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Monte Carlo sweep over the temperature schedule
    Chain,
    /// Genetic evolution with chain-backed fitness
    Evolve,
    /// Dream sequence plus interpretation
    Dream,
}

impl FromStr for Mode {
    type Err = TemperaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chain" => Ok(Mode::Chain),
            "evolve" => Ok(Mode::Evolve),
            "dream" => Ok(Mode::Dream),
            other => Err(TemperaError::config(format!(
                "unknown mode '{}' (expected chain, evolve or dream)",
                other
            ))),
        }
    }
}

/// Lab configuration
#[derive(Debug, Clone)]
pub struct LabConfig {
    pub mode: Mode,
    pub core: TemperaConfig,
    /// Prompts sent at every temperature
    pub prompts: Vec<String>,
    /// Name used for saved runs
    pub experiment: String,
    pub generations: usize,
    pub target_fitness: Option<f64>,
    pub dream_steps: usize,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Chain,
            core: TemperaConfig::default(),
            prompts: vec![
                "Describe what you see when you close your eyes.".to_string(),
                "What would you change about the world?".to_string(),
                "Explain how you approach a hard problem.".to_string(),
            ],
            experiment: "sweep".to_string(),
            generations: 5,
            target_fitness: None,
            dream_steps: 5,
        }
    }
}

impl LabConfig {
    /// Build from the first CLI argument and environment variables
    ///
    /// Reads:
    /// - TEMPERA_CONFIG: JSON file for the core configuration (else TEMPERA_* overrides)
    /// - TEMPERA_PROMPTS: prompts separated by `|`
    /// - TEMPERA_EXPERIMENT: run name
    /// - TEMPERA_GENERATIONS: evolution generations (default: 5)
    /// - TEMPERA_TARGET: target fitness for early stopping
    /// - TEMPERA_DREAM_STEPS: dream length (default: 5)
    pub fn from_env(mode_arg: Option<&str>) -> TemperaResult<Self> {
        let mut config = Self::default();

        if let Some(mode) = mode_arg {
            config.mode = mode.parse()?;
        }

        config.core = match env::var("TEMPERA_CONFIG") {
            Ok(path) => TemperaConfig::load(&path)?,
            Err(_) => {
                let core = TemperaConfig::from_env();
                core.validate()?;
                core
            }
        };

        if let Ok(prompts) = env::var("TEMPERA_PROMPTS") {
            let prompts: Vec<String> = prompts
                .split('|')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if !prompts.is_empty() {
                config.prompts = prompts;
            }
        }
        if let Ok(name) = env::var("TEMPERA_EXPERIMENT") {
            config.experiment = name;
        }
        if let Some(v) = env::var("TEMPERA_GENERATIONS").ok().and_then(|v| v.parse().ok()) {
            config.generations = v;
        }
        if let Some(v) = env::var("TEMPERA_TARGET").ok().and_then(|v| v.parse().ok()) {
            config.target_fitness = Some(v);
        }
        if let Some(v) = env::var("TEMPERA_DREAM_STEPS").ok().and_then(|v| v.parse().ok()) {
            config.dream_steps = v;
        }

        Ok(config)
    }
}

/// Print startup banner with config info
pub fn print_banner(config: &LabConfig) {
    let core = &config.core;
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║            🌡️  Tempera Lab - Personality Physics          ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Mode: {:>12}                                      ║", format!("{:?}", config.mode));
    println!(
        "║  Schedule: {:>4.2} → {:<4.2} ({:>3} steps)                   ║",
        core.chain.base_temperature, core.chain.max_temperature, core.chain.steps
    );
    println!("║  Prompts: {:>9}                                      ║", config.prompts.len());
    println!("║  Population: {:>6}                                      ║", core.evolution.population_size);
    println!("║  Model: {:>11}                                      ║", core.generator.model);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("chain".parse::<Mode>().unwrap(), Mode::Chain);
        assert_eq!("EVOLVE".parse::<Mode>().unwrap(), Mode::Evolve);
        assert_eq!("dream".parse::<Mode>().unwrap(), Mode::Dream);
        assert!(matches!("sleep".parse::<Mode>(), Err(TemperaError::Config(_))));
    }

    #[test]
    fn test_defaults() {
        let config = LabConfig::default();
        assert_eq!(config.mode, Mode::Chain);
        assert_eq!(config.prompts.len(), 3);
        assert!(config.core.validate().is_ok());
    }
}
