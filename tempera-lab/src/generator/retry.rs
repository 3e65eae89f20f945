//! Bounded retries with exponential backoff

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use tempera_core::config::GeneratorConfig;
use tempera_core::error::GenerationError;

use super::{GenerationRequest, Generator};

/// Retries a failing backend, doubling the delay after every attempt
pub struct RetryingGenerator<G> {
    inner: G,
    max_retries: u32,
    base_delay: Duration,
}

impl<G: Generator> RetryingGenerator<G> {
    pub fn new(inner: G, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    pub fn from_config(inner: G, config: &GeneratorConfig) -> Self {
        Self::new(inner, config.max_retries, Duration::from_millis(config.retry_delay_ms))
    }

    /// Delay before attempt `attempt + 1`: `base · 2^(attempt-1)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: Generator> Generator for RetryingGenerator<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut last = String::new();
        for attempt in 1..=self.max_retries {
            match self.inner.generate(request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    last = e.to_string();
                    if attempt < self.max_retries {
                        let delay = self.backoff(attempt);
                        warn!(
                            "🔁 Attempt {}/{} failed: {}. Retrying in {:?}",
                            attempt, self.max_retries, e, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        warn!("❌ Generation failed after {} attempts: {}", self.max_retries, last);
        Err(GenerationError::Exhausted {
            attempts: self.max_retries,
            last,
        })
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
