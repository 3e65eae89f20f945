//! # Energy Landscape - Reading a Finished Chain
//!
//! Summary statistics over a sequence of states: where the energy
//! changes fastest with temperature, how the phases are populated, and
//! how often the chain moved.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::metrics::variance;
use crate::thermo::{Phase, ThermoState};

/// Shape of energy as a function of temperature
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandscapeReport {
    /// Pearson correlation between temperature and energy (None if undefined)
    pub energy_temp_correlation: Option<f64>,
    /// Largest |dE/dT|
    pub max_energy_derivative: f64,
    /// Temperature where |dE/dT| peaks
    pub transition_temperature: f64,
    /// Standard deviation of dE/dT
    pub transition_sharpness: f64,
}

/// Analyze the energy landscape of the non-error states.
///
/// Returns `None` when fewer than two usable states remain.
pub fn validate_energy_landscape(states: &[ThermoState]) -> Option<LandscapeReport> {
    let mut points: Vec<(f64, f64)> = states
        .iter()
        .filter(|s| !s.is_error())
        .map(|s| (s.temperature, s.energy))
        .collect();
    if points.len() < 2 {
        return None;
    }
    points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let temps: Vec<f64> = points.iter().map(|p| p.0).collect();
    let energies: Vec<f64> = points.iter().map(|p| p.1).collect();
    let derivative = gradient(&energies, &temps);

    let (peak_idx, peak) = derivative
        .iter()
        .map(|d| d.abs())
        .enumerate()
        .fold((0, 0.0), |best, (i, d)| if d > best.1 { (i, d) } else { best });

    Some(LandscapeReport {
        energy_temp_correlation: pearson(&temps, &energies),
        max_energy_derivative: peak,
        transition_temperature: temps[peak_idx],
        transition_sharpness: variance(&derivative).sqrt(),
    })
}

/// Second-order central differences inside, first-order at the edges.
/// Coincident sample points contribute a zero slope.
fn gradient(values: &[f64], coords: &[f64]) -> Vec<f64> {
    let n = values.len();
    let slope = |dy: f64, dx: f64| if dx.abs() > f64::EPSILON { dy / dx } else { 0.0 };

    (0..n)
        .map(|i| {
            if i == 0 {
                slope(values[1] - values[0], coords[1] - coords[0])
            } else if i == n - 1 {
                slope(values[n - 1] - values[n - 2], coords[n - 1] - coords[n - 2])
            } else {
                let h0 = coords[i] - coords[i - 1];
                let h1 = coords[i + 1] - coords[i];
                if h0.abs() <= f64::EPSILON || h1.abs() <= f64::EPSILON {
                    return slope(values[i + 1] - values[i - 1], coords[i + 1] - coords[i - 1]);
                }
                let a = -h1 / (h0 * (h0 + h1));
                let b = (h1 - h0) / (h0 * h1);
                let c = h0 / (h1 * (h0 + h1));
                a * values[i - 1] + b * values[i] + c * values[i + 1]
            }
        })
        .collect()
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let cov: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let vx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
    let vy: f64 = ys.iter().map(|y| (y - my).powi(2)).sum();
    let denom = (vx * vy).sqrt();
    if denom > 0.0 && denom.is_finite() {
        Some(cov / denom)
    } else {
        None
    }
}

/// Phase occupancy and chain mobility
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub total: usize,
    pub errors: usize,
    pub counts: HashMap<Phase, usize>,
    /// Fraction of steps whose state differs from the previous entry
    pub acceptance_rate: f64,
    /// Number of adjacent non-error entries whose phase differs
    pub transitions: usize,
}

impl PhaseSummary {
    pub fn from_states(states: &[ThermoState]) -> Self {
        let mut summary = Self {
            total: states.len(),
            ..Self::default()
        };
        for state in states {
            if state.is_error() {
                summary.errors += 1;
            } else {
                *summary.counts.entry(state.phase).or_insert(0) += 1;
            }
        }

        let valid: Vec<&ThermoState> = states.iter().filter(|s| !s.is_error()).collect();
        summary.transitions = valid.windows(2).filter(|w| w[0].phase != w[1].phase).count();

        let moves = valid
            .windows(2)
            .filter(|w| w[0].response != w[1].response || w[0].energy != w[1].energy)
            .count();
        if valid.len() > 1 {
            summary.acceptance_rate = moves as f64 / (valid.len() - 1) as f64;
        }
        summary
    }

    /// Fraction of non-error states in a phase
    pub fn fraction(&self, phase: Phase) -> f64 {
        let valid = self.total - self.errors;
        if valid == 0 {
            return 0.0;
        }
        self.counts.get(&phase).copied().unwrap_or(0) as f64 / valid as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personality::PersonalityMatrix;

    fn state(t: f64, e: f64, phase: Phase, response: &str) -> ThermoState {
        ThermoState {
            temperature: t,
            energy: e,
            entropy: 0.0,
            enthalpy: 0.0,
            coherence: 0.5,
            order_parameter: 0.0,
            delta_energy: 0.0,
            phase,
            personality: PersonalityMatrix::default(),
            response: response.to_string(),
            failure: None,
        }
    }

    #[test]
    fn test_gradient_of_line() {
        let g = gradient(&[0.0, 2.0, 4.0, 6.0], &[0.0, 1.0, 2.0, 3.0]);
        for d in g {
            assert!((d - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_landscape_finds_step() {
        let states = vec![
            state(0.1, 0.0, Phase::Coherent, "a"),
            state(0.5, 0.0, Phase::Coherent, "b"),
            state(0.9, 0.1, Phase::SemiCoherent, "c"),
            state(1.0, 3.0, Phase::SemiCoherent, "d"),
            state(1.6, 3.1, Phase::Chaotic, "e"),
        ];
        let report = validate_energy_landscape(&states).unwrap();
        assert!(report.energy_temp_correlation.unwrap() > 0.7);
        assert!(report.transition_temperature >= 0.9 && report.transition_temperature <= 1.0);
        assert!(report.transition_sharpness > 0.0);
    }

    #[test]
    fn test_landscape_ignores_errors() {
        let mut states = vec![state(0.1, 1.0, Phase::Coherent, "a")];
        states.push(ThermoState::failed(0.5, PersonalityMatrix::default(), "boom"));
        assert!(validate_energy_landscape(&states).is_none());
    }

    #[test]
    fn test_flat_energy_has_no_correlation() {
        let states = vec![
            state(0.1, 1.0, Phase::Coherent, "a"),
            state(0.2, 1.0, Phase::Coherent, "a"),
        ];
        let report = validate_energy_landscape(&states).unwrap();
        assert_eq!(report.energy_temp_correlation, None);
        assert_eq!(report.max_energy_derivative, 0.0);
    }

    #[test]
    fn test_phase_summary() {
        let states = vec![
            state(0.1, 1.0, Phase::Coherent, "a"),
            state(0.2, 1.0, Phase::Coherent, "a"),
            state(0.9, 0.5, Phase::SemiCoherent, "b"),
            ThermoState::failed(1.0, PersonalityMatrix::default(), "x"),
            state(1.6, 0.2, Phase::Chaotic, "c"),
        ];
        let summary = PhaseSummary::from_states(&states);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.transitions, 2);
        assert!((summary.acceptance_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((summary.fraction(Phase::Coherent) - 0.5).abs() < 1e-12);
    }
}
