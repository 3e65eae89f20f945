//! Persistent response cache
//!
//! The cache is an explicit object handed to [`CachedGenerator`]. Lookups
//! and inserts are independent: two concurrent misses on the same key
//! both call the backend and the last insert wins.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use tempera_core::error::{GenerationError, TemperaResult};

use super::{GenerationRequest, Generator};

pub struct ResponseCache {
    entries: DashMap<String, String>,
    path: Option<PathBuf>,
}

impl ResponseCache {
    /// In-memory only
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            path: None,
        }
    }

    /// Load from `path`, starting empty if the file is missing or corrupt
    pub fn load_or_create(path: &Path) -> Self {
        let cache = Self {
            entries: DashMap::new(),
            path: Some(path.to_path_buf()),
        };

        if path.exists() {
            match fs::read_to_string(path).map(|raw| serde_json::from_str::<HashMap<String, String>>(&raw)) {
                Ok(Ok(entries)) => {
                    info!("💾 Response cache loaded: {} entries", entries.len());
                    for (key, text) in entries {
                        cache.entries.insert(key, text);
                    }
                }
                Ok(Err(e)) => warn!("💾 Response cache corrupted, starting fresh: {}", e),
                Err(e) => warn!("💾 Cannot read response cache: {}", e),
            }
        }
        cache
    }

    /// Write to the backing file, if any
    pub fn save(&self) -> TemperaResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let snapshot: HashMap<String, String> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(())
    }

    pub fn key(request: &GenerationRequest) -> String {
        format!(
            "{:.3}|{}|{}|{}",
            request.temperature,
            request.max_tokens,
            request.system_prompt.as_deref().unwrap_or(""),
            request.prompt
        )
    }

    pub fn get(&self, request: &GenerationRequest) -> Option<String> {
        self.entries.get(&Self::key(request)).map(|v| v.value().clone())
    }

    pub fn insert(&self, request: &GenerationRequest, text: String) {
        self.entries.insert(Self::key(request), text);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves repeated requests from a [`ResponseCache`]. Failures are not cached.
pub struct CachedGenerator<G> {
    inner: G,
    cache: Arc<ResponseCache>,
}

impl<G: Generator> CachedGenerator<G> {
    pub fn new(inner: G, cache: Arc<ResponseCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }
}

#[async_trait]
impl<G: Generator> Generator for CachedGenerator<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        if let Some(hit) = self.cache.get(request) {
            debug!("💾 Cache hit at T={:.2}", request.temperature);
            return Ok(hit);
        }

        let text = self.inner.generate(request).await?;
        self.cache.insert(request, text.clone());
        Ok(text)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
