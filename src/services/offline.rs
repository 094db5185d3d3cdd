//! Stand-in used when no external services should be contacted.

use async_trait::async_trait;

use super::{EmbeddingService, GenerationRequest, GenerativeService, ServiceError};

/// Refuses every call, so the service-backed stages degrade cleanly while the
/// deterministic stages still produce complete output.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineServices;

#[async_trait]
impl EmbeddingService for OfflineServices {
    fn name(&self) -> &str {
        "offline"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        Err(ServiceError::Unavailable("offline mode".to_string()))
    }
}

#[async_trait]
impl GenerativeService for OfflineServices {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String, ServiceError> {
        Err(ServiceError::Unavailable("offline mode".to_string()))
    }
}
