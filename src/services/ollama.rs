//! Ollama-compatible HTTP client.
//!
//! Embeddings: POST {base}/api/embed
//! Generation: POST {base}/api/chat (non-streaming)

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbeddingService, GenerationRequest, GenerativeService, ServiceError};
use crate::config::ServiceSettings;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    http: Client,
    base_url: String,
    embedding_model: String,
    generation_model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .user_agent(concat!("repointel/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            embedding_model: settings.embedding_model.clone(),
            generation_model: settings.generation_model.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout(self.timeout)
                } else {
                    ServiceError::Network(e)
                }
            })?;

        match response.status().as_u16() {
            200..=299 => Ok(response),
            429 => Err(ServiceError::RateLimited),
            status => Err(ServiceError::Unavailable(format!("HTTP {} from {}", status, url))),
        }
    }
}

#[async_trait]
impl EmbeddingService for OllamaClient {
    fn name(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let request = EmbedRequest {
            model: &self.embedding_model,
            input: [text],
        };
        let response: EmbedResponse = self
            .post("/api/embed", &request)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        response
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::Malformed("no embedding returned".to_string()))
    }
}

#[async_trait]
impl GenerativeService for OllamaClient {
    fn name(&self) -> &str {
        &self.generation_model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let body = ChatRequest {
            model: &self.generation_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
            },
        };

        let response: ChatResponse = self
            .post("/api/chat", &body)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        Ok(response.message.content)
    }
}
