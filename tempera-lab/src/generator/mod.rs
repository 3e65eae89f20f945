//! # Generators - Where the Text Comes From
//!
//! Every engine talks to a language model through the [`Generator`]
//! capability. Adapters stack:
//!
//! ```text
//! CachedGenerator ─► RetryingGenerator ─► OpenAiGenerator
//!                                     └─► SyntheticGenerator (offline)
//! ```
//!
//! A batch always answers with one `Result` per request, in request
//! order. A failed item never aborts its siblings.

mod cache;
mod openai;
mod retry;
mod synthetic;

pub use cache::{CachedGenerator, ResponseCache};
pub use openai::OpenAiGenerator;
pub use retry::RetryingGenerator;
pub use synthetic::SyntheticGenerator;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::info;

use tempera_core::config::GeneratorConfig;
use tempera_core::error::{GenerationError, TemperaResult};

/// One call to the language model
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, temperature: f64) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            temperature,
            max_tokens: 100,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Text generation backend
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate one response
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Generate many responses with at most `max_concurrency` in flight.
    ///
    /// Results come back in request order.
    async fn generate_batch(
        &self,
        requests: &[GenerationRequest],
        max_concurrency: usize,
    ) -> Vec<Result<String, GenerationError>> {
        let calls: Vec<_> = requests.iter().map(|request| self.generate(request)).collect();
        stream::iter(calls).buffered(max_concurrency.max(1)).collect().await
    }

    /// Backend name (for logging)
    fn name(&self) -> &str;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        (**self).generate(request).await
    }

    async fn generate_batch(
        &self,
        requests: &[GenerationRequest],
        max_concurrency: usize,
    ) -> Vec<Result<String, GenerationError>> {
        (**self).generate_batch(requests, max_concurrency).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A configured generator plus the cache it writes to
pub struct GeneratorStack {
    pub generator: Arc<dyn Generator>,
    pub cache: Option<Arc<ResponseCache>>,
}

impl GeneratorStack {
    /// Flush the response cache, if one is configured
    pub fn persist(&self) -> TemperaResult<()> {
        match &self.cache {
            Some(cache) => {
                cache.save()?;
                info!("💾 Response cache saved: {} entries", cache.len());
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Build the generator stack for a configuration.
///
/// Uses the HTTP backend when the configured API key variable is set,
/// the synthetic backend otherwise. Both are wrapped in retries, and in
/// a persistent cache when `cache_path` is set.
pub fn from_config(config: &GeneratorConfig, seed: Option<u64>) -> TemperaResult<GeneratorStack> {
    let backend: Arc<dyn Generator> = match std::env::var(&config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => {
            info!("🌐 Using {} at {}", config.model, config.base_url);
            Arc::new(OpenAiGenerator::new(config, key)?)
        }
        _ => {
            info!("🧪 {} not set, using the synthetic generator", config.api_key_env);
            Arc::new(match seed {
                Some(seed) => SyntheticGenerator::seeded(seed),
                None => SyntheticGenerator::new(),
            })
        }
    };

    let retrying = RetryingGenerator::from_config(backend, config);
    match &config.cache_path {
        Some(path) => {
            let cache = Arc::new(ResponseCache::load_or_create(std::path::Path::new(path)));
            Ok(GeneratorStack {
                generator: Arc::new(CachedGenerator::new(retrying, cache.clone())),
                cache: Some(cache),
            })
        }
        None => Ok(GeneratorStack {
            generator: Arc::new(retrying),
            cache: None,
        }),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted generators shared by the engine tests

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the prompt, optionally failing the first `failures` calls
    #[derive(Default)]
    pub struct EchoGenerator {
        pub calls: AtomicUsize,
        pub failures: usize,
    }

    impl EchoGenerator {
        pub fn failing(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(GenerationError::http(format!("scripted failure {}", n)));
            }
            Ok(format!("echo {}", request.prompt))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    /// Fails every call
    pub struct BrokenGenerator;

    #[async_trait]
    impl Generator for BrokenGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            Err(GenerationError::Api {
                status: 503,
                message: "unavailable".into(),
            })
        }

        fn name(&self) -> &str {
            "broken"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps on every call while tracking how many calls overlap
    #[derive(Default)]
    struct SlowGenerator {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Generator for SlowGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            // later prompts finish sooner
            let index: u64 = request.prompt.trim_start_matches('p').parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(5 + (9 - index.min(9)) * 3)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(request.prompt.clone())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_batch_bounds_concurrency() {
        let generator = SlowGenerator::default();
        let requests: Vec<GenerationRequest> = (0..9)
            .map(|i| GenerationRequest::new(format!("p{}", i), 0.5))
            .collect();
        let results = generator.generate_batch(&requests, 3).await;

        assert_eq!(generator.peak.load(Ordering::SeqCst), 3);
        assert_eq!(generator.in_flight.load(Ordering::SeqCst), 0);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_deref(), Ok(format!("p{}", i).as_str()));
        }
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let generator = EchoGenerator::default();
        let requests: Vec<GenerationRequest> = (0..7)
            .map(|i| GenerationRequest::new(format!("p{}", i), 0.5))
            .collect();
        let results = generator.generate_batch(&requests, 3).await;
        assert_eq!(results.len(), 7);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_deref(), Ok(format!("echo p{}", i).as_str()));
        }
    }

    #[tokio::test]
    async fn test_batch_item_failures_are_per_item() {
        let generator = EchoGenerator::failing(2);
        let requests: Vec<GenerationRequest> = (0..4)
            .map(|i| GenerationRequest::new(format!("p{}", i), 0.5))
            .collect();
        // concurrency 1 keeps the scripted failures on the first two items
        let results = generator.generate_batch(&requests, 1).await;
        assert!(results[0].is_err());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_deref(), Ok("echo p2"));
        assert_eq!(results[3].as_deref(), Ok("echo p3"));
    }

    #[tokio::test]
    async fn test_arc_forwards() {
        let generator: Arc<dyn Generator> = Arc::new(EchoGenerator::default());
        let out = generator.generate(&GenerationRequest::new("hi", 0.1)).await;
        assert_eq!(out.as_deref(), Ok("echo hi"));
        assert_eq!(generator.name(), "echo");
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("q", 0.7)
            .with_system_prompt("be brief")
            .with_max_tokens(42);
        assert_eq!(request.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(request.max_tokens, 42);
    }

    #[test]
    fn test_from_config_without_key_is_synthetic() {
        let config = GeneratorConfig {
            api_key_env: "TEMPERA_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..GeneratorConfig::default()
        };
        let stack = from_config(&config, Some(1)).unwrap();
        assert_eq!(stack.generator.name(), "synthetic");
        assert!(stack.cache.is_none());
        stack.persist().unwrap();
    }
}
