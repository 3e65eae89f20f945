//! # Personality Sampling - Exploring Trait Space
//!
//! Two strategies implement [`PersonalitySampler`]:
//!
//! - [`FixedSampler`] keeps the base personality at every temperature
//! - [`TraitPoolSampler`] redraws goals, self-image and world-view from
//!   curated trait pools, more aggressively as temperature rises

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::{SamplerConfig, SamplerStrategy};
use crate::personality::PersonalityMatrix;
use crate::thermo::ThermoState;
use crate::traits::PersonalitySampler;

/// Trait families personalities are drawn from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitFamily {
    Analytical,
    Creative,
    Social,
    Practical,
}

impl TraitFamily {
    pub fn all() -> [TraitFamily; 4] {
        [
            TraitFamily::Analytical,
            TraitFamily::Creative,
            TraitFamily::Social,
            TraitFamily::Practical,
        ]
    }

    /// Adjectives describing this family
    pub fn traits(&self) -> &'static [&'static str] {
        match self {
            TraitFamily::Analytical => &[
                "analyze", "systematic", "logical", "precise", "methodical",
                "rational", "structured", "investigative", "detailed", "objective",
            ],
            TraitFamily::Creative => &[
                "innovative", "imaginative", "artistic", "expressive", "original",
                "inventive", "experimental", "intuitive", "visionary", "exploratory",
            ],
            TraitFamily::Social => &[
                "collaborative", "empathetic", "communicative", "supportive", "engaging",
                "interactive", "connecting", "inclusive", "responsive", "understanding",
            ],
            TraitFamily::Practical => &[
                "efficient", "pragmatic", "reliable", "focused", "consistent",
                "organized", "purposeful", "steady", "grounded", "results-oriented",
            ],
        }
    }

    /// How this family perceives its environment
    pub fn world_views(&self) -> &'static [&'static str] {
        match self {
            TraitFamily::Analytical => &[
                "system of interconnected principles",
                "framework of logical patterns",
                "structured network of knowledge",
                "complex analytical landscape",
            ],
            TraitFamily::Creative => &[
                "canvas of endless possibilities",
                "dynamic space of innovation",
                "realm of creative exploration",
                "evolving artistic dimension",
            ],
            TraitFamily::Social => &[
                "interconnected community",
                "collaborative ecosystem",
                "network of shared experiences",
                "harmonious social fabric",
            ],
            TraitFamily::Practical => &[
                "organized framework",
                "efficient mechanism",
                "practical foundation",
                "functional environment",
            ],
        }
    }
}

const GOAL_VERBS: &[&str] = &[
    "explore", "develop", "optimize", "create", "analyze",
    "build", "discover", "implement", "investigate", "synthesize",
];

const GOAL_DOMAINS: &[&str] = &[
    "knowledge", "solutions", "systems", "relationships", "innovations",
    "processes", "understanding", "frameworks", "connections", "patterns",
];

/// Goals in a freshly drawn personality
const GOALS_PER_PERSONALITY: usize = 4;

/// Build the sampler named by the configuration
pub fn build_sampler(config: &SamplerConfig, base: PersonalityMatrix) -> Box<dyn PersonalitySampler> {
    match config.strategy {
        SamplerStrategy::Fixed => Box::new(FixedSampler::new(base)),
        SamplerStrategy::TraitPool => Box::new(
            TraitPoolSampler::new(base)
                .with_bias(config.bias)
                .with_min_coherence(config.min_coherence),
        ),
    }
}

/// Always proposes the base personality
#[derive(Clone, Debug)]
pub struct FixedSampler {
    base: PersonalityMatrix,
}

impl FixedSampler {
    pub fn new(base: PersonalityMatrix) -> Self {
        Self { base }
    }
}

impl PersonalitySampler for FixedSampler {
    fn sample(&self, _temperature: f64, _rng: &mut dyn RngCore) -> PersonalityMatrix {
        self.base.clone()
    }

    fn validate(&self, state: &ThermoState) -> bool {
        !state.is_error()
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Perturbs the base personality from the trait pools
#[derive(Clone, Debug)]
pub struct TraitPoolSampler {
    base: PersonalityMatrix,
    bias: Option<TraitFamily>,
    min_coherence: f64,
}

impl TraitPoolSampler {
    pub fn new(base: PersonalityMatrix) -> Self {
        Self {
            base,
            bias: None,
            min_coherence: 0.0,
        }
    }

    pub fn with_bias(mut self, bias: Option<TraitFamily>) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_min_coherence(mut self, min_coherence: f64) -> Self {
        self.min_coherence = min_coherence;
        self
    }

    /// Probability that any one trait is redrawn at `temperature`
    pub fn perturbation_probability(temperature: f64) -> f64 {
        (temperature / 2.0).clamp(0.0, 1.0)
    }

    /// Draw a complete personality from two distinct families
    pub fn random_personality<R: Rng + ?Sized>(rng: &mut R) -> PersonalityMatrix {
        let families: Vec<TraitFamily> = TraitFamily::all()
            .choose_multiple(rng, 2)
            .copied()
            .collect();
        let (primary, secondary) = (families[0], families[1]);

        let goals = (0..GOALS_PER_PERSONALITY)
            .map(|_| {
                let family = if rng.gen_bool(0.5) { primary } else { secondary };
                draw_goal(family, rng)
            })
            .collect();

        PersonalityMatrix::new(
            goals,
            draw_self_image(primary, secondary, rng),
            draw_world_view(primary, secondary, rng),
        )
    }

    /// Pick a family, favouring the bias 2:1 over each other family
    fn pick_family<R: Rng + ?Sized>(&self, rng: &mut R) -> TraitFamily {
        match self.bias {
            Some(bias) => {
                let others: Vec<TraitFamily> = TraitFamily::all().into_iter().filter(|f| *f != bias).collect();
                let roll = rng.gen_range(0..others.len() + 2);
                if roll < 2 {
                    bias
                } else {
                    others[roll - 2]
                }
            }
            None => TraitFamily::all()[rng.gen_range(0..4)],
        }
    }
}

impl PersonalitySampler for TraitPoolSampler {
    fn sample(&self, temperature: f64, rng: &mut dyn RngCore) -> PersonalityMatrix {
        let p = Self::perturbation_probability(temperature);
        let mut personality = self.base.clone();

        for goal in &mut personality.identity.goals {
            if rng.gen_bool(p) {
                let family = self.pick_family(rng);
                *goal = draw_goal(family, rng);
            }
        }
        if rng.gen_bool(p) {
            let (a, b) = (self.pick_family(rng), self.pick_family(rng));
            personality.identity.self_image = draw_self_image(a, b, rng);
        }
        if rng.gen_bool(p) {
            let (a, b) = (self.pick_family(rng), self.pick_family(rng));
            personality.identity.world_view = draw_world_view(a, b, rng);
        }

        personality
    }

    fn validate(&self, state: &ThermoState) -> bool {
        !state.is_error() && state.coherence >= self.min_coherence
    }

    fn name(&self) -> &'static str {
        "trait_pool"
    }
}

fn pick<'a, R: Rng + ?Sized>(pool: &[&'a str], rng: &mut R) -> &'a str {
    pool[rng.gen_range(0..pool.len())]
}

fn draw_goal<R: Rng + ?Sized>(family: TraitFamily, rng: &mut R) -> String {
    format!(
        "{} {} {}",
        pick(GOAL_VERBS, rng),
        pick(family.traits(), rng),
        pick(GOAL_DOMAINS, rng)
    )
}

fn draw_self_image<R: Rng + ?Sized>(a: TraitFamily, b: TraitFamily, rng: &mut R) -> String {
    format!("{} {} system", pick(a.traits(), rng), pick(b.traits(), rng))
}

fn draw_world_view<R: Rng + ?Sized>(a: TraitFamily, b: TraitFamily, rng: &mut R) -> String {
    format!("A {} with {}", pick(a.world_views(), rng), pick(b.world_views(), rng))
}

/// One point of a conformational sweep
#[derive(Clone, Debug)]
pub struct ConformationSample {
    pub temperature: f64,
    pub personality: PersonalityMatrix,
    /// Fraction of the base's identity traits left unchanged
    pub stability: f64,
}

/// Sample personalities at `n` evenly spaced temperatures
pub fn sample_conformational_space<R: Rng>(
    sampler: &dyn PersonalitySampler,
    base: &PersonalityMatrix,
    n: usize,
    range: (f64, f64),
    rng: &mut R,
) -> Vec<ConformationSample> {
    linspace(range.0, range.1, n)
        .into_iter()
        .map(|temperature| {
            let personality = sampler.sample(temperature, rng);
            let stability = identity_overlap(base, &personality);
            ConformationSample {
                temperature,
                personality,
                stability,
            }
        })
        .collect()
}

/// Fraction of goals, self-image and world-view shared position-wise
pub fn identity_overlap(a: &PersonalityMatrix, b: &PersonalityMatrix) -> f64 {
    let goal_slots = a.goals().len().max(b.goals().len());
    let shared_goals = a.goals().iter().zip(b.goals()).filter(|(x, y)| x == y).count();
    let total = goal_slots + 2;
    let shared = shared_goals
        + usize::from(a.self_image() == b.self_image())
        + usize::from(a.world_view() == b.world_view());
    shared as f64 / total as f64
}

/// `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
