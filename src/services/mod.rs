//! External capability interfaces.
//!
//! Embedding and text generation are black-box services: text goes in, a
//! vector or text comes out, and any call may fail or time out. The pipeline
//! only talks to them through the two traits below and a [`CallPolicy`] that
//! bounds every call with a timeout and at most one retry.

mod offline;
mod ollama;

pub use offline::OfflineServices;
pub use ollama::OllamaClient;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ServiceSettings;

/// Errors that can occur during a service call.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("rate limited by service")]
    RateLimited,
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ServiceError {
    /// Whether a second attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ServiceError::Malformed(_))
    }
}

/// Turns text into a vector.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Short identifier used in logs and provenance.
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

/// A prompt for the generative service.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
}

/// Turns a prompt into text.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Short identifier used in logs and provenance.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError>;
}

/// Timeout and retry policy applied to every external call.
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retries: u32,
}

impl CallPolicy {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries: retries.min(1),
        }
    }

    pub fn from_settings(settings: &ServiceSettings) -> Self {
        Self::new(Duration::from_millis(settings.timeout_ms), settings.retries)
    }

    /// Run `call` under the timeout, retrying once on a retryable failure.
    pub async fn call<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ServiceError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries && e.is_retryable() => {
                    attempt += 1;
                    debug!(call = label, error = %e, "retrying service call");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from_settings(&ServiceSettings::default())
    }
}
