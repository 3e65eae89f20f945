//! # Thermodynamics - Scoring Text as a Physical State
//!
//! Generated text is mapped to a heuristic free energy:
//!
//! ```text
//! H  = -ln(coherence + ε) · (1 + α·T)                      enthalpy
//! S' = sigmoid(β·T) · 1/(1 + |1 - T/Tc|) · entropy          entropy term
//! m  = (1 - T/Tc)^½  if T < Tc,  exp(-T/Tc) otherwise       order parameter
//! F  = H - T·S' + m·|T - Tc|                                free energy
//! E  = F + noise(T)                                         total energy
//! ```
//!
//! Nothing here is a measured physical quantity. The scores only need to
//! be comparable across a temperature sweep.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::ThermoConfig;
use crate::metrics::TextMetrics;
use crate::personality::{PersonalityMatrix, PersonalityRecord};

/// Discrete phase of a state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "coherent")]
    Coherent,
    #[serde(rename = "semi-coherent")]
    SemiCoherent,
    #[serde(rename = "chaotic")]
    Chaotic,
    /// Generation failed; numeric fields are zero
    #[serde(rename = "error")]
    Error,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Coherent => "coherent",
            Phase::SemiCoherent => "semi-coherent",
            Phase::Chaotic => "chaotic",
            Phase::Error => "error",
        }
    }

    /// The three physical phases, coldest first
    pub fn ordered() -> [Phase; 3] {
        [Phase::Coherent, Phase::SemiCoherent, Phase::Chaotic]
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One scored point of a chain
#[derive(Clone, Debug, PartialEq)]
pub struct ThermoState {
    pub temperature: f64,
    pub energy: f64,
    pub entropy: f64,
    pub enthalpy: f64,
    pub coherence: f64,
    pub order_parameter: f64,
    pub delta_energy: f64,
    pub phase: Phase,
    pub personality: PersonalityMatrix,
    pub response: String,
    /// Why generation failed, for `Phase::Error` states
    pub failure: Option<String>,
}

impl ThermoState {
    /// Placeholder for a failed generation. Numbers stay at zero so that
    /// aggregates over unfiltered chains never see NaN.
    pub fn failed(temperature: f64, personality: PersonalityMatrix, reason: impl Into<String>) -> Self {
        Self {
            temperature,
            energy: 0.0,
            entropy: 0.0,
            enthalpy: 0.0,
            coherence: 0.0,
            order_parameter: 0.0,
            delta_energy: 0.0,
            phase: Phase::Error,
            personality,
            response: String::new(),
            failure: Some(reason.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.phase == Phase::Error
    }

    pub fn to_record(&self) -> StateRecord {
        StateRecord {
            temperature: self.temperature,
            energy: self.energy,
            entropy: self.entropy,
            enthalpy: self.enthalpy,
            coherence: self.coherence,
            personality: self.personality.to_record(),
            phase: self.phase,
            response: self.response.clone(),
            order_parameter: Some(self.order_parameter),
            delta_energy: Some(self.delta_energy),
            failure: self.failure.clone(),
        }
    }

    pub fn from_record(record: &StateRecord) -> Self {
        Self {
            temperature: record.temperature,
            energy: record.energy,
            entropy: record.entropy,
            enthalpy: record.enthalpy,
            coherence: record.coherence,
            order_parameter: record.order_parameter.unwrap_or_default(),
            delta_energy: record.delta_energy.unwrap_or_default(),
            phase: record.phase,
            personality: PersonalityMatrix::from_record(&record.personality),
            response: record.response.clone(),
            failure: record.failure.clone(),
        }
    }
}

/// Persisted JSON shape of a state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub temperature: f64,
    pub energy: f64,
    pub entropy: f64,
    pub enthalpy: f64,
    pub coherence: f64,
    pub personality: PersonalityRecord,
    pub phase: Phase,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_parameter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Noise-free decomposition of a state's free energy
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnergyTerms {
    pub coherence: f64,
    pub entropy: f64,
    pub order_parameter: f64,
    pub enthalpy: f64,
    pub entropy_term: f64,
    pub free_energy: f64,
}

/// Converts text + temperature into [`ThermoState`]s
#[derive(Clone, Debug, Default)]
pub struct ThermodynamicScorer {
    params: ThermoConfig,
}

impl ThermodynamicScorer {
    pub fn new(params: ThermoConfig) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ThermoConfig {
        &self.params
    }

    pub fn critical_temperature(&self) -> f64 {
        self.params.critical_temperature
    }

    /// Mean-field order parameter
    pub fn order_parameter(&self, temperature: f64) -> f64 {
        let tc = self.params.critical_temperature;
        let ratio = temperature / tc;
        if temperature < tc {
            (1.0 - ratio).max(0.0).sqrt()
        } else {
            (-ratio).exp()
        }
    }

    pub fn enthalpy(&self, coherence: f64, temperature: f64) -> f64 {
        let base = -(coherence + self.params.epsilon).ln();
        base * (1.0 + self.params.alpha * temperature)
    }

    pub fn entropy_term(&self, entropy: f64, temperature: f64) -> f64 {
        let scale = sigmoid(self.params.beta * temperature);
        let critical = 1.0 / (1.0 + (1.0 - temperature / self.params.critical_temperature).abs());
        scale * critical * entropy
    }

    pub fn free_energy(&self, enthalpy: f64, entropy_term: f64, order_parameter: f64, temperature: f64) -> f64 {
        let basic = enthalpy - temperature * entropy_term;
        basic + order_parameter * (temperature - self.params.critical_temperature).abs()
    }

    /// Two zero-mean Gaussian fluctuations: thermal plus critical
    pub fn noise<R: Rng + ?Sized>(&self, temperature: f64, rng: &mut R) -> f64 {
        let base_scale = self.params.noise_scale * (1.0 - (-temperature).exp());
        let critical = 1.0 + 1.0 / (1.0 + (temperature - self.params.critical_temperature).abs());
        gaussian(base_scale, rng) + gaussian(self.params.noise_scale * critical * 0.1, rng)
    }

    /// Phase from the temperature boundaries. Coherence is ignored.
    pub fn determine_phase(&self, _coherence: f64, temperature: f64) -> Phase {
        if temperature < self.params.coherent_to_semi {
            Phase::Coherent
        } else if temperature < self.params.semi_to_chaotic {
            Phase::SemiCoherent
        } else {
            Phase::Chaotic
        }
    }

    /// Deterministic part of the score
    pub fn energy_terms(&self, metrics: TextMetrics, temperature: f64) -> EnergyTerms {
        let order_parameter = self.order_parameter(temperature);
        let enthalpy = self.enthalpy(metrics.coherence, temperature);
        let entropy_term = self.entropy_term(metrics.entropy, temperature);
        EnergyTerms {
            coherence: metrics.coherence,
            entropy: metrics.entropy,
            order_parameter,
            enthalpy,
            entropy_term,
            free_energy: self.free_energy(enthalpy, entropy_term, order_parameter, temperature),
        }
    }

    /// Score a response at a temperature
    pub fn score<R: Rng + ?Sized>(
        &self,
        text: &str,
        temperature: f64,
        previous_energy: Option<f64>,
        personality: &PersonalityMatrix,
        rng: &mut R,
    ) -> ThermoState {
        let terms = self.energy_terms(TextMetrics::extract(text), temperature);
        let energy = terms.free_energy + self.noise(temperature, rng);

        ThermoState {
            temperature,
            energy,
            entropy: terms.entropy,
            enthalpy: terms.enthalpy,
            coherence: terms.coherence,
            order_parameter: terms.order_parameter,
            delta_energy: previous_energy.map(|prev| energy - prev).unwrap_or(0.0),
            phase: self.determine_phase(terms.coherence, temperature),
            personality: personality.clone(),
            response: text.to_string(),
            failure: None,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn gaussian<R: Rng + ?Sized>(std_dev: f64, rng: &mut R) -> f64 {
    if std_dev <= 0.0 || !std_dev.is_finite() {
        return 0.0;
    }
    match Normal::new(0.0, std_dev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn scorer() -> ThermodynamicScorer {
        ThermodynamicScorer::default()
    }

    #[test]
    fn test_phase_partitions_temperature() {
        let s = scorer();
        assert_eq!(s.determine_phase(0.9, 0.1), Phase::Coherent);
        assert_eq!(s.determine_phase(0.9, 0.79), Phase::Coherent);
        assert_eq!(s.determine_phase(0.9, 0.8), Phase::SemiCoherent);
        assert_eq!(s.determine_phase(0.0, 1.49), Phase::SemiCoherent);
        assert_eq!(s.determine_phase(0.0, 1.5), Phase::Chaotic);
        assert_eq!(s.determine_phase(1.0, 5.0), Phase::Chaotic);
    }

    #[test]
    fn test_phase_is_monotone_in_temperature() {
        let s = scorer();
        let rank = |p: Phase| Phase::ordered().iter().position(|q| *q == p).unwrap();
        let mut last = 0;
        for i in 1..400 {
            let t = i as f64 * 0.01;
            let r = rank(s.determine_phase(0.5, t));
            assert!(r >= last);
            last = r;
        }
        assert_eq!(last, 2);
    }

    #[test]
    fn test_order_parameter() {
        let s = scorer();
        assert!((s.order_parameter(0.0) - 1.0).abs() < 1e-12);
        assert!((s.order_parameter(0.75) - 0.5).abs() < 1e-12);
        assert!((s.order_parameter(1.0) - (-1.0f64).exp()).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&s.order_parameter(3.0)));
    }

    #[test]
    fn test_zero_coherence_is_finite() {
        let h = scorer().enthalpy(0.0, 1.0);
        assert!(h.is_finite());
        assert!(h > 0.0);
    }

    #[test]
    fn test_worked_example_free_energy() {
        // enthalpy baseline without temperature coupling, entropy term
        // stubbed to the raw word entropy
        let text = "the cat sat on the mat the cat ran";
        let coherence = crate::metrics::unique_word_ratio(text);
        let word_entropy = crate::metrics::word_entropy(text);

        let mut params = ThermoConfig::default();
        params.alpha = 0.0;
        let s = ThermodynamicScorer::new(params);

        let enthalpy = s.enthalpy(coherence, 0.5);
        assert!((enthalpy - 0.405).abs() < 0.001);
        let basic = enthalpy - 0.5 * word_entropy;
        assert!((basic - (-0.433)).abs() < 0.01);
    }

    #[test]
    fn test_score_without_noise_matches_terms() {
        let mut params = ThermoConfig::default();
        params.noise_scale = 0.0;
        let s = ThermodynamicScorer::new(params);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let text = "Structured answers help. They stay on topic.";

        let terms = s.energy_terms(TextMetrics::extract(text), 0.6);
        let state = s.score(text, 0.6, Some(1.0), &PersonalityMatrix::default(), &mut rng);
        assert_eq!(state.energy, terms.free_energy);
        assert!((state.delta_energy - (terms.free_energy - 1.0)).abs() < 1e-12);
        assert_eq!(state.phase, Phase::Coherent);
    }

    #[test]
    fn test_first_state_has_zero_delta() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let state = scorer().score("anything at all", 1.2, None, &PersonalityMatrix::default(), &mut rng);
        assert_eq!(state.delta_energy, 0.0);
        assert_eq!(state.phase, Phase::SemiCoherent);
    }

    #[test]
    fn test_noise_is_zero_mean() {
        let s = scorer();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let n = 20_000;
        let mean = (0..n).map(|_| s.noise(1.5, &mut rng)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.005);
    }

    #[test]
    fn test_critical_fluctuation_survives_low_temperature() {
        let s = scorer();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let n = 50_000;
        let t: f64 = 0.01;
        let draws: Vec<f64> = (0..n).map(|_| s.noise(t, &mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let sd = (draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64).sqrt();

        // default noise scale 0.1, critical temperature 1.0
        let thermal = 0.1 * (1.0 - (-t).exp());
        let critical = 0.1 * (1.0 + 1.0 / (1.0 + (t - 1.0).abs())) * 0.1;
        let expected = (thermal * thermal + critical * critical).sqrt();
        assert!((sd - expected).abs() / expected < 0.05);
    }

    #[test]
    fn test_record_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let personality = PersonalityMatrix::new(
            vec!["explore patterns".into()],
            "curious system",
            "A canvas of endless possibilities",
        );
        let state = scorer().score("The sky is wide. Birds fly.", 1.7, Some(0.2), &personality, &mut rng);

        let json = serde_json::to_string(&state.to_record()).unwrap();
        let parsed: StateRecord = serde_json::from_str(&json).unwrap();
        let back = ThermoState::from_record(&parsed);

        assert!((back.energy - state.energy).abs() < 1e-12);
        assert!((back.entropy - state.entropy).abs() < 1e-12);
        assert!((back.enthalpy - state.enthalpy).abs() < 1e-12);
        assert!((back.coherence - state.coherence).abs() < 1e-12);
        assert_eq!(back.phase, Phase::Chaotic);
        assert_eq!(back.personality.to_record(), personality.to_record());
        assert_eq!(back.response, state.response);
        assert!(json.contains("\"phase\":\"chaotic\""));
    }

    #[test]
    fn test_failed_state_is_well_defined() {
        let state = ThermoState::failed(0.9, PersonalityMatrix::default(), "timeout");
        assert!(state.is_error());
        assert_eq!(state.energy, 0.0);
        assert!(!state.energy.is_nan());
        assert_eq!(state.failure.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_failed_state_keeps_reason_through_record() {
        let state = ThermoState::failed(1.1, PersonalityMatrix::default(), "rate limited");
        let json = serde_json::to_string(&state.to_record()).unwrap();
        let parsed: StateRecord = serde_json::from_str(&json).unwrap();
        let back = ThermoState::from_record(&parsed);
        assert!(back.is_error());
        assert_eq!(back.failure.as_deref(), Some("rate limited"));

        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let ok = scorer().score("fine words", 0.4, None, &PersonalityMatrix::default(), &mut rng);
        assert!(!serde_json::to_string(&ok.to_record()).unwrap().contains("failure"));
    }
}
