//! # Run Storage - Persisting Chains to Disk
//!
//! ```text
//! {base_dir}/
//!   generations/{run_id}.json   state records
//!   metadata/{run_id}.json      parameters, timestamp, sample count
//! ```
//!
//! Run ids read `{name}_{YYYYmmdd_HHMMSS}_{param hash}`, with a `_N` suffix
//! when a run with that id already exists.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tempera_core::config::StorageConfig;
use tempera_core::error::{TemperaError, TemperaResult};
use tempera_core::thermo::StateRecord;
use tempera_core::{ThermoState, RUN_FORMAT_VERSION};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Sidecar describing one saved run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub timestamp: String,
    pub experiment_name: String,
    pub parameters: serde_json::Value,
    pub n_samples: usize,
    pub data_path: PathBuf,
    #[serde(default)]
    pub format_version: u32,
}

impl RunMetadata {
    /// `YYYYmmdd` part of the timestamp
    pub fn date(&self) -> &str {
        self.timestamp.get(..8).unwrap_or(&self.timestamp)
    }
}

pub struct RunStore {
    data_dir: PathBuf,
    metadata_dir: PathBuf,
}

impl RunStore {
    /// Open a store, creating its directories
    pub fn open(base_dir: impl AsRef<Path>) -> TemperaResult<Self> {
        let base = base_dir.as_ref();
        let store = Self {
            data_dir: base.join("generations"),
            metadata_dir: base.join("metadata"),
        };
        fs::create_dir_all(&store.data_dir)?;
        fs::create_dir_all(&store.metadata_dir)?;
        Ok(store)
    }

    pub fn from_config(config: &StorageConfig) -> TemperaResult<Self> {
        Self::open(&config.base_dir)
    }

    /// Build a run id from its parts
    pub fn run_id(name: &str, timestamp: &str, parameters: &serde_json::Value) -> String {
        let mut hasher = DefaultHasher::new();
        parameters.to_string().hash(&mut hasher);
        format!("{}_{}_{:08x}", name, timestamp, hasher.finish() as u32)
    }

    /// Save states with their parameters; returns the run id
    pub fn save_run<P: Serialize>(&self, states: &[ThermoState], parameters: &P, name: &str) -> TemperaResult<String> {
        let parameters = serde_json::to_value(parameters)?;
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let run_id = self.unused_id(Self::run_id(name, &timestamp, &parameters));

        let records: Vec<StateRecord> = states.iter().map(ThermoState::to_record).collect();
        let data_path = self.data_dir.join(format!("{}.json", run_id));
        fs::write(&data_path, serde_json::to_string_pretty(&records)?)?;

        let metadata = RunMetadata {
            run_id: run_id.clone(),
            timestamp,
            experiment_name: name.to_string(),
            parameters,
            n_samples: records.len(),
            data_path,
            format_version: RUN_FORMAT_VERSION,
        };
        fs::write(self.metadata_path(&run_id), serde_json::to_string_pretty(&metadata)?)?;

        info!("💾 Saved run {} ({} states)", run_id, records.len());
        Ok(run_id)
    }

    /// Load the states and metadata of a run
    pub fn load_run(&self, run_id: &str) -> TemperaResult<(Vec<ThermoState>, RunMetadata)> {
        let metadata_path = self.metadata_path(run_id);
        if !metadata_path.exists() {
            return Err(TemperaError::storage(format!("No metadata found for run {}", run_id)));
        }
        let metadata: RunMetadata = serde_json::from_str(&fs::read_to_string(&metadata_path)?)?;

        if !metadata.data_path.exists() {
            return Err(TemperaError::storage(format!(
                "No data found at {}",
                metadata.data_path.display()
            )));
        }
        let records: Vec<StateRecord> = serde_json::from_str(&fs::read_to_string(&metadata.data_path)?)?;
        let states = records.iter().map(ThermoState::from_record).collect();
        Ok((states, metadata))
    }

    /// Metadata of saved runs, filtered by experiment name and by
    /// inclusive `YYYYmmdd` date bounds. Sorted by run id.
    pub fn list_runs(
        &self,
        name: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> TemperaResult<Vec<RunMetadata>> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.metadata_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let metadata: RunMetadata = match fs::read_to_string(&path)
                .map_err(TemperaError::from)
                .and_then(|raw| serde_json::from_str(&raw).map_err(TemperaError::from))
            {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("💾 Skipping unreadable metadata {}: {}", path.display(), e);
                    continue;
                }
            };

            if name.map_or(false, |n| metadata.experiment_name != n) {
                continue;
            }
            if start_date.map_or(false, |d| metadata.date() < d) {
                continue;
            }
            if end_date.map_or(false, |d| metadata.date() > d) {
                continue;
            }
            runs.push(metadata);
        }
        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        Ok(runs)
    }

    /// `base`, or `base_N` with the smallest N not yet taken
    fn unused_id(&self, base: String) -> String {
        let mut id = base.clone();
        let mut n = 0;
        while self.metadata_path(&id).exists() {
            n += 1;
            id = format!("{}_{}", base, n);
        }
        id
    }

    fn metadata_path(&self, run_id: &str) -> PathBuf {
        self.metadata_dir.join(format!("{}.json", run_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempera_core::{PersonalityMatrix, ThermodynamicScorer};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn temp_store(name: &str) -> (RunStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("tempera-store-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        (RunStore::open(&dir).unwrap(), dir)
    }

    fn states() -> Vec<ThermoState> {
        let scorer = ThermodynamicScorer::default();
        let personality = PersonalityMatrix::new(vec!["explore".into()], "curious", "open");
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        vec![
            scorer.score("the cat sat on the mat", 0.3, None, &personality, &mut rng),
            scorer.score("dogs run far. birds fly high", 1.2, Some(0.5), &personality, &mut rng),
            ThermoState::failed(1.8, personality, "timeout"),
        ]
    }

    #[test]
    fn test_run_id_shape() {
        let id = RunStore::run_id("sweep", "20240101_120000", &serde_json::json!({"steps": 3}));
        assert!(id.starts_with("sweep_20240101_120000_"));
        assert_eq!(id.rsplit('_').next().map(str::len), Some(8));
        let again = RunStore::run_id("sweep", "20240101_120000", &serde_json::json!({"steps": 3}));
        assert_eq!(id, again);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (store, dir) = temp_store("roundtrip");
        let original = states();
        let id = store.save_run(&original, &serde_json::json!({"steps": 3}), "sweep").unwrap();

        let (loaded, metadata) = store.load_run(&id).unwrap();
        assert_eq!(metadata.n_samples, 3);
        assert_eq!(metadata.format_version, RUN_FORMAT_VERSION);
        assert_eq!(loaded.len(), original.len());
        for (a, b) in original.iter().zip(&loaded) {
            assert!((a.energy - b.energy).abs() < 1e-9);
            assert_eq!(a.phase, b.phase);
            assert_eq!(a.response, b.response);
            assert_eq!(a.personality.to_record(), b.personality.to_record());
        }
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_same_second_saves_do_not_collide() {
        let (store, dir) = temp_store("collide");
        let params = serde_json::json!({"steps": 3});
        let first = store.save_run(&states()[..1], &params, "sweep").unwrap();
        let second = store.save_run(&states(), &params, "sweep").unwrap();
        let third = store.save_run(&states(), &params, "sweep").unwrap();

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(store.load_run(&first).unwrap().1.n_samples, 1);
        assert_eq!(store.load_run(&second).unwrap().1.n_samples, 3);
        assert_eq!(store.list_runs(Some("sweep"), None, None).unwrap().len(), 3);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_run_is_storage_error() {
        let (store, dir) = temp_store("missing");
        assert!(matches!(store.load_run("nope"), Err(TemperaError::Storage(_))));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_list_runs_filters() {
        let (store, dir) = temp_store("list");
        store.save_run(&states(), &serde_json::json!({"a": 1}), "alpha").unwrap();
        store.save_run(&states(), &serde_json::json!({"b": 2}), "beta").unwrap();
        fs::write(dir.join("metadata").join("junk.json"), "{").unwrap();

        assert_eq!(store.list_runs(None, None, None).unwrap().len(), 2);
        let alpha = store.list_runs(Some("alpha"), None, None).unwrap();
        assert_eq!(alpha.len(), 1);
        assert_eq!(alpha[0].experiment_name, "alpha");
        assert!(store.list_runs(None, Some("99991231"), None).unwrap().is_empty());
        assert!(store.list_runs(None, None, Some("19700101")).unwrap().is_empty());
        let _ = fs::remove_dir_all(dir);
    }
}
