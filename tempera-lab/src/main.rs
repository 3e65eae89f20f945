//! Tempera Lab - Experiment Driver
//!
//! `tempera-lab [chain|evolve|dream]`

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, Level};

use tempera_core::error::TemperaResult;
use tempera_core::sampler::{build_sampler, TraitPoolSampler};
use tempera_core::{validate_energy_landscape, Phase, PersonalityMatrix, PhaseSummary, ThermodynamicScorer};
use tempera_lab::config::print_banner;
use tempera_lab::generator::{self, Generator};
use tempera_lab::{
    ChainFitness, DreamWeaver, EvolutionEngine, LabConfig, Mode, MonteCarloChain, RunStore, TemperatureSchedule,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    let level = match std::env::var("TEMPERA_LOG").map(|v| v.to_lowercase()).as_deref() {
        Ok("debug") => Level::DEBUG,
        Ok("trace") => Level::TRACE,
        Ok("warn") => Level::WARN,
        _ => Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mode = std::env::args().nth(1);
    let config = match LabConfig::from_env(mode.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(2);
        }
    };

    info!("🌡️ Tempera Lab v{}", VERSION);
    print_banner(&config);

    if let Err(e) = run(config).await {
        error!("❌ Experiment failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: LabConfig) -> TemperaResult<()> {
    let stack = generator::from_config(&config.core.generator, config.core.chain.seed)?;

    let mut rng = match config.core.chain.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let personality = TraitPoolSampler::random_personality(&mut rng);
    info!("🎭 Seed personality: {}", personality.goals().join("; "));

    let outcome = match config.mode {
        Mode::Chain => run_chain(&config, stack.generator.clone(), personality).await,
        Mode::Evolve => run_evolve(&config, stack.generator.clone(), personality).await,
        Mode::Dream => run_dream(&config, stack.generator.clone(), personality).await,
    };

    // keep whatever was cached even if the experiment failed
    stack.persist()?;
    outcome
}

async fn run_chain(config: &LabConfig, generator: Arc<dyn Generator>, personality: PersonalityMatrix) -> TemperaResult<()> {
    let mut chain = MonteCarloChain::from_config(generator, &config.core, personality);
    let schedule = TemperatureSchedule::from_config(&config.core);
    let states = chain.run(&config.prompts, &schedule).await;

    let summary = PhaseSummary::from_states(&states);
    for phase in Phase::ordered() {
        info!("📊 {:>13}: {:5.1}%", phase.name(), summary.fraction(phase) * 100.0);
    }
    info!(
        "📊 {} states, {} errors, {} phase transitions, acceptance {:.1}%",
        summary.total,
        summary.errors,
        summary.transitions,
        summary.acceptance_rate * 100.0
    );

    match validate_energy_landscape(&states) {
        Some(report) => info!(
            "⛰️ Transition near T={:.2} (max |dE/dT|={:.3}, sharpness={:.3}, corr={})",
            report.transition_temperature,
            report.max_energy_derivative,
            report.transition_sharpness,
            report
                .energy_temp_correlation
                .map(|c| format!("{:.3}", c))
                .unwrap_or_else(|| "n/a".to_string())
        ),
        None => info!("⛰️ Not enough scored states for a landscape"),
    }

    let store = RunStore::from_config(&config.core.storage)?;
    store.save_run(&states, &config.core, &config.experiment)?;
    Ok(())
}

async fn run_evolve(config: &LabConfig, generator: Arc<dyn Generator>, personality: PersonalityMatrix) -> TemperaResult<()> {
    let core = &config.core;
    // a short sweep per genome keeps evaluation affordable
    let schedule = TemperatureSchedule::linear(core.chain.base_temperature, core.chain.max_temperature, 3);
    let prompts: Vec<String> = config.prompts.iter().take(1).cloned().collect();
    let fitness = ChainFitness::new(generator, core.clone(), prompts, schedule);

    let mut engine = EvolutionEngine::from_config(core);
    engine.initialize_population(&personality);
    let history = engine.evolve(config.generations, &fitness, config.target_fitness).await?;

    if let Some(last) = history.last() {
        info!(
            "🏁 {} generations, final max={:.3} avg={:.3} diversity={:.3}",
            history.len(),
            last.max_fitness,
            last.avg_fitness,
            last.diversity
        );
    }
    if let Some((genome, score)) = engine.best() {
        let robustness = genome.measure_robustness();
        info!(
            "🏆 Best fitness {:.3}: stability={:.3} coherence={:.3} neutral={:.2} percolation T={:.2}",
            score,
            robustness.global_stability,
            robustness.trait_coherence,
            robustness.neutral_network_size,
            robustness.percolation_threshold
        );
        println!("{}", genome.express().system_prompt());
    }
    Ok(())
}

async fn run_dream(config: &LabConfig, generator: Arc<dyn Generator>, personality: PersonalityMatrix) -> TemperaResult<()> {
    let core = &config.core;
    let sampler = build_sampler(&core.sampler, personality.clone());
    let mut weaver = DreamWeaver::new(generator, ThermodynamicScorer::new(core.thermo.clone()), sampler)
        .with_max_tokens(core.generator.max_tokens);
    if let Some(seed) = core.chain.seed {
        weaver = weaver.with_seed(seed);
    }

    let prompt = config.prompts.first().map(String::as_str).unwrap_or("Tell me a dream.");
    let sequence = weaver.dream(personality.clone(), prompt, config.dream_steps).await;
    for state in &sequence {
        info!("💤 T={:.2} [{}] {}", state.temperature, state.phase, state.response);
    }

    let reading = weaver.interpret(&sequence, &personality).await?;
    println!("Narrative:\n{}\n", reading.narrative);
    println!("Meaning:\n{}\n", reading.meaning);
    println!("Lucid:\n{}", reading.lucid);

    let store = RunStore::from_config(&core.storage)?;
    store.save_run(&sequence, core, &format!("{}_dream", config.experiment))?;
    Ok(())
}
