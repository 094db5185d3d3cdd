//! Entity and workflow extraction.
//!
//! A fixed list of domain queries is answered one at a time. Each query
//! retrieves the most similar chunks from the index, asks the generative
//! service for a JSON answer grounded in those chunks, and keeps whatever
//! records parse. The output is model-generated and not reproducible; it is
//! tagged as such and never feeds the score.

mod parse;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::index::{ChunkIndex, ScoredChunk};
use crate::services::{CallPolicy, EmbeddingService, GenerationRequest, GenerativeService};
use crate::state::{Degraded, DegradedKind, Stage};

/// What a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Entity,
    Endpoint,
    DataModel,
    Integration,
    Workflow,
    RequestPath,
    BackgroundJob,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Entity => "entity",
            RecordKind::Endpoint => "endpoint",
            RecordKind::DataModel => "data_model",
            RecordKind::Integration => "integration",
            RecordKind::Workflow => "workflow",
            RecordKind::RequestPath => "request_path",
            RecordKind::BackgroundJob => "background_job",
        }
    }

    /// Heading used in reports.
    pub fn title(&self) -> &'static str {
        match self {
            RecordKind::Entity => "Domain entities",
            RecordKind::Endpoint => "API endpoints",
            RecordKind::DataModel => "Data models",
            RecordKind::Integration => "External integrations",
            RecordKind::Workflow => "Primary flows",
            RecordKind::RequestPath => "Request paths",
            RecordKind::BackgroundJob => "Background jobs",
        }
    }

    pub fn is_workflow(&self) -> bool {
        matches!(
            self,
            RecordKind::Workflow | RecordKind::RequestPath | RecordKind::BackgroundJob
        )
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One question put to the generative service.
#[derive(Debug, Clone, Copy)]
pub struct DomainQuery {
    pub kind: RecordKind,
    /// Subject used in degraded records.
    pub name: &'static str,
    /// Retrieval text and instruction.
    pub question: &'static str,
}

/// Queries in execution order.
pub const DOMAIN_QUERIES: [DomainQuery; 7] = [
    DomainQuery {
        kind: RecordKind::Entity,
        name: "domain-entities",
        question: "Which domain entities does this application model (for example User, Order, Product)?",
    },
    DomainQuery {
        kind: RecordKind::Endpoint,
        name: "api-endpoints",
        question: "Which API endpoints or routes does this application expose (for example \"GET /users\")?",
    },
    DomainQuery {
        kind: RecordKind::DataModel,
        name: "data-models",
        question: "Which database tables or persisted data models does this application define?",
    },
    DomainQuery {
        kind: RecordKind::Integration,
        name: "external-integrations",
        question: "Which third-party services, APIs or external systems does this application integrate with?",
    },
    DomainQuery {
        kind: RecordKind::Workflow,
        name: "primary-flows",
        question: "What are the primary user flows (for example \"User registers -> verifies email -> logs in\")?",
    },
    DomainQuery {
        kind: RecordKind::RequestPath,
        name: "request-paths",
        question: "Which request paths go from request through processing to response (for example \"POST /orders -> validate -> create order -> 201\")?",
    },
    DomainQuery {
        kind: RecordKind::BackgroundJob,
        name: "background-jobs",
        question: "Which background tasks, scheduled jobs or queue consumers does this application run?",
    },
];

const SYSTEM_PROMPT: &str = "You are a senior software architect analysing a code repository. \
Answer only from the code evidence you are given.";

/// Where a record's evidence came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub path: String,
    pub start: usize,
    pub end: usize,
}

impl<'a> From<&ScoredChunk<'a>> for SourceRef {
    fn from(hit: &ScoredChunk<'a>) -> Self {
        Self {
            path: hit.chunk.path.clone(),
            start: hit.chunk.range.start,
            end: hit.chunk.range.end,
        }
    }
}

/// How a record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Produced by a generative model; may differ between runs.
    Generated,
}

/// An entity or workflow record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub kind: RecordKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// In [0, 1].
    pub confidence: f32,
    pub provenance: Provenance,
    /// Service that produced the record.
    pub generated_by: String,
    pub sources: Vec<SourceRef>,
}

/// The extraction stage's section of the analysis state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Extraction {
    pub entities: Vec<ExtractedRecord>,
    pub workflows: Vec<ExtractedRecord>,
}

impl Extraction {
    pub fn of_kind(&self, kind: RecordKind) -> impl Iterator<Item = &ExtractedRecord> {
        let list = if kind.is_workflow() {
            &self.workflows
        } else {
            &self.entities
        };
        list.iter().filter(move |r| r.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.workflows.is_empty()
    }
}

/// Extraction stage result.
#[derive(Debug)]
pub struct ExtractOutput {
    pub extraction: Extraction,
    pub degraded: Vec<Degraded>,
}

/// Run every domain query against the index.
///
/// A failing query contributes no records and one degraded entry; the
/// remaining queries still run.
pub async fn extract_domain(
    index: &ChunkIndex,
    embedder: Arc<dyn EmbeddingService>,
    generator: Arc<dyn GenerativeService>,
    settings: &Settings,
) -> ExtractOutput {
    let policy = CallPolicy::from_settings(&settings.services);
    let mut extraction = Extraction::default();
    let mut degraded = Vec::new();

    for query in DOMAIN_QUERIES.iter() {
        match run_query(query, index, embedder.as_ref(), generator.as_ref(), policy, settings).await {
            Ok(records) => {
                debug!(query = query.name, records = records.len(), "query answered");
                let target = if query.kind.is_workflow() {
                    &mut extraction.workflows
                } else {
                    &mut extraction.entities
                };
                target.extend(records);
            }
            Err(message) => {
                warn!(query = query.name, error = %message, "domain query degraded");
                degraded.push(Degraded::new(
                    Stage::Extraction,
                    DegradedKind::Query,
                    query.name,
                    message,
                ));
            }
        }
    }

    info!(
        entities = extraction.entities.len(),
        workflows = extraction.workflows.len(),
        "extraction complete"
    );
    ExtractOutput {
        extraction,
        degraded,
    }
}

async fn run_query(
    query: &DomainQuery,
    index: &ChunkIndex,
    embedder: &dyn EmbeddingService,
    generator: &dyn GenerativeService,
    policy: CallPolicy,
    settings: &Settings,
) -> Result<Vec<ExtractedRecord>, String> {
    let vector = policy
        .call("embed-query", || embedder.embed(query.question))
        .await
        .map_err(|e| format!("query embedding failed: {}", e))?;

    let hits = index.nearest(&vector, settings.index.top_k);
    if hits.is_empty() {
        return Err("no indexed chunks to ground the query".to_string());
    }

    let request = GenerationRequest {
        system: SYSTEM_PROMPT.to_string(),
        prompt: build_prompt(query, &hits, settings.index.max_context_chars),
        temperature: settings.services.temperature,
    };
    let raw = policy
        .call("generate", || generator.generate(&request))
        .await
        .map_err(|e| format!("generation failed: {}", e))?;

    let parsed = parse::parse_records(&raw)?;
    let sources: Vec<SourceRef> = hits.iter().map(SourceRef::from).collect();

    let mut seen = HashSet::new();
    let records = parsed
        .into_iter()
        .filter(|r| !r.name.is_empty() && seen.insert(r.name.to_lowercase()))
        .map(|r| ExtractedRecord {
            kind: query.kind,
            name: r.name,
            detail: r.detail,
            confidence: r.confidence,
            provenance: Provenance::Generated,
            generated_by: generator.name().to_string(),
            sources: sources.clone(),
        })
        .collect();
    Ok(records)
}

/// Question, formatted evidence and answer schema. Evidence is cut at
/// `max_context_chars` characters.
fn build_prompt(query: &DomainQuery, hits: &[ScoredChunk<'_>], max_context_chars: usize) -> String {
    let mut context = String::new();
    let mut remaining = max_context_chars;
    for hit in hits {
        let block = format!(
            "### {} (bytes {}-{})\n{}\n\n",
            hit.chunk.path, hit.chunk.range.start, hit.chunk.range.end, hit.chunk.text
        );
        let len = block.chars().count();
        if len <= remaining {
            context.push_str(&block);
            remaining -= len;
        } else {
            context.extend(block.chars().take(remaining));
            break;
        }
    }

    format!(
        "{question}\n\nRelevant code:\n{context}\
Return ONLY a JSON object of the form \
{{\"records\": [{{\"name\": \"...\", \"detail\": \"...\", \"confidence\": 0.0}}]}}. \
Use an empty list if nothing applies.",
        question = query.question,
        context = context,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Chunk;
    use crate::services::ServiceError;
    use async_trait::async_trait;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingService for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
            Ok(vec![1.0, 0.0])
        }
    }

    /// Answers by matching a word in the prompt.
    struct Scripted;

    #[async_trait]
    impl GenerativeService for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
            let prompt = &request.prompt;
            if prompt.contains("domain entities") {
                Ok("<think>hmm</think>```json\n{\"records\": [\"User\", {\"name\": \"Order\", \"confidence\": 3}, \"user\"]}\n```".to_string())
            } else if prompt.contains("API endpoints") {
                Ok("I could not find anything useful.".to_string())
            } else if prompt.contains("background tasks") {
                Err(ServiceError::RateLimited)
            } else {
                Ok("{\"records\": []}".to_string())
            }
        }
    }

    fn index() -> ChunkIndex {
        ChunkIndex::new(vec![
            Chunk {
                path: "app/models.py".to_string(),
                range: 0..40,
                text: "class User(Base):\n    id = Column(Integer)".to_string(),
                embedding: Some(vec![1.0, 0.1]),
            },
            Chunk {
                path: "app/orders.py".to_string(),
                range: 0..20,
                text: "class Order: pass".to_string(),
                embedding: Some(vec![0.5, 0.5]),
            },
        ])
    }

    #[tokio::test]
    async fn test_extract_domain_isolates_failing_queries() {
        let output = extract_domain(
            &index(),
            Arc::new(FixedEmbedder),
            Arc::new(Scripted),
            &Settings::default(),
        )
        .await;

        let names: Vec<&str> = output
            .extraction
            .entities
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["User", "Order"]);

        let order = &output.extraction.entities[1];
        assert_eq!(order.confidence, 1.0);
        assert_eq!(order.provenance, Provenance::Generated);
        assert_eq!(order.generated_by, "scripted");
        assert_eq!(order.sources[0].path, "app/models.py");
        assert_eq!(output.extraction.entities[0].confidence, 0.5);

        let subjects: Vec<&str> = output.degraded.iter().map(|d| d.subject.as_str()).collect();
        assert_eq!(subjects, vec!["api-endpoints", "background-jobs"]);
        assert!(output.degraded.iter().all(|d| d.kind == DegradedKind::Query));
        assert!(output.extraction.workflows.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_degrades_every_query() {
        let output = extract_domain(
            &ChunkIndex::default(),
            Arc::new(FixedEmbedder),
            Arc::new(Scripted),
            &Settings::default(),
        )
        .await;
        assert!(output.extraction.is_empty());
        assert_eq!(output.degraded.len(), DOMAIN_QUERIES.len());
    }

    #[test]
    fn test_prompt_context_is_capped() {
        let index = index();
        let hits = index.nearest(&[1.0, 0.0], 10);
        let prompt = build_prompt(&DOMAIN_QUERIES[0], &hits, 30);
        assert!(prompt.contains("### app/models.py"));
        assert!(!prompt.contains("app/orders.py"));
        assert!(prompt.ends_with("Use an empty list if nothing applies."));
    }
}
