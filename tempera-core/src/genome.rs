//! # Personality Genome - The Genetic Code of a Personality
//!
//! A personality is encoded hierarchically:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ PersonalityGenome                                           │
//! │   identity  ─ Chromosome [goal, goal, self-image, ...]      │
//! │   memory    ─ Chromosome [short-term, long-term, archival]  │
//! │   structure ─ Chromosome [input format, tools, output]      │
//! │ neutral networks: trait → variants reached by silent edits  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each gene is one semantic unit of text. Mutation and crossover never
//! touch the receiver: they return a new genome.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ThermoConfig;
use crate::metrics;
use crate::mutation::MutationClass;
use crate::personality::PersonalityMatrix;

pub const IDENTITY: &str = "identity";
pub const MEMORY: &str = "memory";
pub const STRUCTURE: &str = "structure";

/// Fundamental unit of personality information
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    /// The text this gene carries
    pub sequence: String,
    /// Index within its chromosome
    pub position: usize,
    /// Temperature at which the gene becomes mutable
    pub expression_temperature: f64,
    /// Resistance to mutation in [0, 1]
    pub stability: f64,
    /// Personality field this gene expresses (None for placeholders)
    pub phenotype: Option<String>,
}

/// Collection of related genes forming one trait axis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    pub name: String,
    pub genes: Vec<Gene>,
    /// Below this temperature the chromosome never mutates
    pub activation_threshold: f64,
    /// Minimum coherence expected of the expressed text
    pub coherence_requirement: f64,
}

impl Chromosome {
    /// Expressed text, one gene per line
    pub fn text(&self) -> String {
        self.genes
            .iter()
            .map(|g| g.sequence.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Fingerprint of the current sequence content
    pub fn variant_id(&self) -> String {
        let mut hasher = DefaultHasher::new();
        for gene in &self.genes {
            gene.sequence.hash(&mut hasher);
        }
        format!("{:016x}", hasher.finish())
    }

    pub fn mean_stability(&self) -> f64 {
        if self.genes.is_empty() {
            return 0.0;
        }
        self.genes.iter().map(|g| g.stability).sum::<f64>() / self.genes.len() as f64
    }

    /// Whether the expressed text meets the coherence requirement
    pub fn is_coherent(&self) -> bool {
        metrics::coherence(&self.text()) >= self.coherence_requirement
    }
}

/// Per-field gene parameters: (phenotype, stability, expression temperature)
struct FieldSpec {
    phenotype: &'static str,
    stability: f64,
    expression_temperature: f64,
}

const fn field(phenotype: &'static str, stability: f64, expression_temperature: f64) -> FieldSpec {
    FieldSpec {
        phenotype,
        stability,
        expression_temperature,
    }
}

const GOALS: FieldSpec = field("goals", 0.5, 0.6);
const METHODS: FieldSpec = field("methods", 0.4, 0.7);
const SELF_IMAGE: FieldSpec = field("self_image", 0.8, 0.4);
const WORLD_VIEW: FieldSpec = field("world_view", 0.7, 0.5);
const THOUGHTS: FieldSpec = field("thoughts", 0.3, 0.9);
const SHORT_TERM: FieldSpec = field("short_term", 0.2, 0.3);
const LONG_TERM: FieldSpec = field("long_term", 0.5, 0.6);
const ARCHIVAL: FieldSpec = field("archival", 0.8, 1.0);
const INPUT_FORMAT: FieldSpec = field("input_format", 0.6, 0.8);
const TOOLS: FieldSpec = field("tools", 0.7, 1.0);
const OUTPUT_FORMAT: FieldSpec = field("output_format", 0.6, 0.8);

/// Robustness summary of a genome
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Robustness {
    /// Gene-count-weighted mean of per-chromosome mean stability
    pub global_stability: f64,
    /// Mean coherence of each chromosome's expressed text
    pub trait_coherence: f64,
    /// Mean cardinality of the neutral networks
    pub neutral_network_size: f64,
    /// Mean temperature at which a gene's mutation probability reaches ½
    pub percolation_threshold: f64,
}

/// The genetic structure of a personality
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonalityGenome {
    pub chromosomes: BTreeMap<String, Chromosome>,
    pub neutral_networks: BTreeMap<String, BTreeSet<String>>,
    critical_temperature: f64,
    semi_to_chaotic: f64,
}

impl PersonalityGenome {
    /// Encode a personality
    pub fn new(personality: &PersonalityMatrix, thermo: &ThermoConfig) -> Self {
        let identity = &personality.identity;
        let memory = &personality.memory;
        let structure = &personality.structure;

        let mut genome = Self {
            chromosomes: BTreeMap::new(),
            neutral_networks: BTreeMap::new(),
            critical_temperature: thermo.critical_temperature,
            semi_to_chaotic: thermo.semi_to_chaotic,
        };

        let mut genes = GeneBuilder::default();
        genes.list(&GOALS, &identity.goals);
        genes.list(&METHODS, &identity.methods);
        genes.scalar(&SELF_IMAGE, &identity.self_image);
        genes.scalar(&WORLD_VIEW, &identity.world_view);
        genes.list(&THOUGHTS, &identity.thoughts);
        genome.insert(IDENTITY, genes.finish(), 0.3, 0.6);

        let mut genes = GeneBuilder::default();
        genes.list(&SHORT_TERM, &memory.short_term);
        genes.list(&LONG_TERM, &memory.long_term);
        genes.list(&ARCHIVAL, &memory.archival);
        genome.insert(MEMORY, genes.finish(), 0.1, 0.3);

        let mut genes = GeneBuilder::default();
        genes.scalar(&INPUT_FORMAT, &structure.input_format);
        genes.list(&TOOLS, &structure.tools);
        genes.scalar(&OUTPUT_FORMAT, &structure.output_format);
        genome.insert(STRUCTURE, genes.finish(), 0.6, 0.8);

        genome
    }

    fn insert(&mut self, name: &str, genes: Vec<Gene>, activation_threshold: f64, coherence_requirement: f64) {
        let chromosome = Chromosome {
            name: name.to_string(),
            genes,
            activation_threshold,
            coherence_requirement,
        };
        self.neutral_networks
            .insert(name.to_string(), BTreeSet::from([chromosome.variant_id()]));
        self.chromosomes.insert(name.to_string(), chromosome);
    }

    pub fn chromosome(&self, name: &str) -> Option<&Chromosome> {
        self.chromosomes.get(name)
    }

    pub fn gene_count(&self) -> usize {
        self.chromosomes.values().map(|c| c.genes.len()).sum()
    }

    /// `min((1 - stability) · exp((T - Te) / Tc), 1)`
    pub fn mutation_probability(&self, gene: &Gene, temperature: f64) -> f64 {
        let base = 1.0 - gene.stability;
        let factor = ((temperature - gene.expression_temperature) / self.critical_temperature).exp();
        (base * factor).clamp(0.0, 1.0)
    }

    /// Mutation class used at a temperature
    pub fn mutation_class(&self, temperature: f64) -> MutationClass {
        MutationClass::for_temperature(temperature, self.critical_temperature, self.semi_to_chaotic)
    }

    /// Temperature-dependent mutation of a copy
    pub fn mutate<R: Rng + ?Sized>(&self, temperature: f64, rng: &mut R) -> PersonalityGenome {
        let mut child = self.clone();
        let class = self.mutation_class(temperature);

        for (name, chromosome) in child.chromosomes.iter_mut() {
            if chromosome.activation_threshold >= temperature {
                continue;
            }

            let mut silent_change = false;
            for gene in chromosome.genes.iter_mut() {
                let p = self.mutation_probability(gene, temperature);
                if rng.gen::<f64>() < p {
                    let mutated = class.apply(&gene.sequence, rng);
                    if mutated != gene.sequence {
                        silent_change |= class == MutationClass::Synonymous;
                        gene.sequence = mutated;
                    }
                }
            }

            if silent_change {
                child
                    .neutral_networks
                    .entry(name.clone())
                    .or_default()
                    .insert(chromosome.variant_id());
            }
        }

        child
    }

    /// Inherit each trait axis wholesale from one parent
    pub fn crossover<R: Rng + ?Sized>(&self, other: &PersonalityGenome, rng: &mut R) -> PersonalityGenome {
        let mut child = self.clone();
        for (name, chromosome) in &other.chromosomes {
            if child.chromosomes.contains_key(name) && rng.gen_bool(0.5) {
                child.chromosomes.insert(name.clone(), chromosome.clone());
                if let Some(network) = other.neutral_networks.get(name) {
                    child.neutral_networks.insert(name.clone(), network.clone());
                }
            }
        }
        child
    }

    /// Normalized dissimilarity between aligned chromosomes.
    ///
    /// Symmetric, in [0, 1], zero iff every chromosome carries the same
    /// genes in the same order. A trait present in only one genome counts
    /// as fully dissimilar.
    pub fn distance(&self, other: &PersonalityGenome) -> f64 {
        let names: BTreeSet<&String> = self.chromosomes.keys().chain(other.chromosomes.keys()).collect();
        if names.is_empty() {
            return 0.0;
        }

        let total: f64 = names
            .iter()
            .map(|name| match (self.chromosomes.get(*name), other.chromosomes.get(*name)) {
                (Some(a), Some(b)) => chromosome_distance(a, b),
                _ => 1.0,
            })
            .sum();
        total / names.len() as f64
    }

    pub fn measure_robustness(&self) -> Robustness {
        Robustness {
            global_stability: self.global_stability(),
            trait_coherence: self.trait_coherence(),
            neutral_network_size: self.neutral_network_size(),
            percolation_threshold: self.percolation_threshold(),
        }
    }

    fn global_stability(&self) -> f64 {
        let (weighted, weights) = self
            .chromosomes
            .values()
            .filter(|c| !c.genes.is_empty())
            .fold((0.0, 0.0), |(sum, n), c| {
                let w = c.genes.len() as f64;
                (sum + c.mean_stability() * w, n + w)
            });
        if weights > 0.0 {
            weighted / weights
        } else {
            0.0
        }
    }

    fn trait_coherence(&self) -> f64 {
        if self.chromosomes.is_empty() {
            return 0.0;
        }
        self.chromosomes
            .values()
            .map(|c| metrics::coherence(&c.text()))
            .sum::<f64>()
            / self.chromosomes.len() as f64
    }

    fn neutral_network_size(&self) -> f64 {
        if self.neutral_networks.is_empty() {
            return 0.0;
        }
        self.neutral_networks.values().map(|n| n.len()).sum::<usize>() as f64
            / self.neutral_networks.len() as f64
    }

    fn percolation_threshold(&self) -> f64 {
        let thresholds: Vec<f64> = self
            .chromosomes
            .values()
            .flat_map(|c| c.genes.iter())
            .filter(|g| g.stability < 1.0)
            .map(|g| {
                let t = g.expression_temperature + self.critical_temperature * (0.5 / (1.0 - g.stability)).ln();
                t.max(0.0)
            })
            .collect();
        if thresholds.is_empty() {
            return 0.0;
        }
        thresholds.iter().sum::<f64>() / thresholds.len() as f64
    }

    /// Decode back into a personality
    pub fn express(&self) -> PersonalityMatrix {
        let mut personality = PersonalityMatrix::default();
        for gene in self.chromosomes.values().flat_map(|c| c.genes.iter()) {
            let Some(phenotype) = gene.phenotype.as_deref() else {
                continue;
            };
            let text = gene.sequence.clone();
            match phenotype {
                "goals" => personality.identity.goals.push(text),
                "methods" => personality.identity.methods.push(text),
                "self_image" => personality.identity.self_image = text,
                "world_view" => personality.identity.world_view = text,
                "thoughts" => personality.identity.thoughts.push(text),
                "short_term" => personality.memory.short_term.push(text),
                "long_term" => personality.memory.long_term.push(text),
                "archival" => personality.memory.archival.push(text),
                "input_format" => personality.structure.input_format = text,
                "tools" => personality.structure.tools.push(text),
                "output_format" => personality.structure.output_format = text,
                other => tracing::debug!("🧬 Unknown phenotype {} ignored", other),
            }
        }
        personality
    }
}

#[derive(Default)]
struct GeneBuilder {
    genes: Vec<Gene>,
}

impl GeneBuilder {
    fn push(&mut self, spec: &FieldSpec, sequence: &str) {
        self.genes.push(Gene {
            sequence: sequence.to_string(),
            position: self.genes.len(),
            expression_temperature: spec.expression_temperature,
            stability: spec.stability,
            phenotype: Some(spec.phenotype.to_string()),
        });
    }

    fn list(&mut self, spec: &FieldSpec, items: &[String]) {
        for item in items.iter().filter(|s| !s.trim().is_empty()) {
            self.push(spec, item);
        }
    }

    fn scalar(&mut self, spec: &FieldSpec, value: &str) {
        if !value.trim().is_empty() {
            self.push(spec, value);
        }
    }

    /// Chromosomes are never empty: an axis with no content carries one
    /// inert placeholder gene.
    fn finish(mut self) -> Vec<Gene> {
        if self.genes.is_empty() {
            self.genes.push(Gene {
                sequence: String::new(),
                position: 0,
                expression_temperature: 0.0,
                stability: 1.0,
                phenotype: None,
            });
        }
        self.genes
    }
}

/// Mean gene distance by position. A gene without a partner, or paired
/// with a gene of another phenotype, counts 1.0.
fn chromosome_distance(a: &Chromosome, b: &Chromosome) -> f64 {
    let len = a.genes.len().max(b.genes.len());
    if len == 0 {
        return 0.0;
    }

    let total: f64 = (0..len)
        .map(|i| match (a.genes.get(i), b.genes.get(i)) {
            (Some(x), Some(y)) if x.phenotype == y.phenotype => normalized_levenshtein(&x.sequence, &y.sequence),
            _ => 1.0,
        })
        .sum();
    total / len as f64
}

/// Levenshtein distance over chars divided by the longer length
pub fn normalized_levenshtein(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()] as f64 / longest as f64
}
