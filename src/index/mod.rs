//! Semantic chunk index.
//!
//! Text-bearing files are cut at the boundaries the scanner recorded, each
//! chunk is embedded through the [`EmbeddingService`], and queries are
//! answered by cosine similarity. A chunk whose embedding fails stays in the
//! index without a vector and is never returned by a query.

pub mod chunk;

use futures::stream::{self, StreamExt};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::scan::Inventory;
use crate::services::{CallPolicy, EmbeddingService};
use crate::state::{Degraded, DegradedKind, Stage};

/// A slice of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub path: String,
    pub range: Range<usize>,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Stable identifier: `path#start-end`.
    pub fn id(&self) -> String {
        format!("{}#{}-{}", self.path, self.range.start, self.range.end)
    }
}

/// A query hit.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// The index stage's section of the analysis state.
#[derive(Debug, Clone, Default)]
pub struct ChunkIndex {
    chunks: Vec<Chunk>,
}

impl ChunkIndex {
    pub fn new(mut chunks: Vec<Chunk>) -> Self {
        chunks.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then(a.range.start.cmp(&b.range.start))
        });
        Self { chunks }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks that can take part in retrieval.
    pub fn embedded_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.embedding.is_some()).count()
    }

    /// The `k` chunks most similar to `query`.
    ///
    /// Ties are broken by path, then by offset, so results are reproducible.
    /// Chunks without a vector, with a different dimension or with a zero
    /// norm are skipped.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<ScoredChunk<'_>> {
        let mut scored: Vec<ScoredChunk<'_>> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let vector = chunk.embedding.as_deref()?;
                let score = cosine_similarity(query, vector)?;
                Some(ScoredChunk { chunk, score })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.path.cmp(&b.chunk.path))
                .then_with(|| a.chunk.range.start.cmp(&b.chunk.range.start))
        });
        scored.truncate(k);
        scored
    }
}

/// Cosine similarity, or `None` when the vectors are not comparable.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Index stage result.
#[derive(Debug)]
pub struct IndexOutput {
    pub index: ChunkIndex,
    pub degraded: Vec<Degraded>,
}

/// Read, chunk and embed every text-bearing file in the inventory.
///
/// At most `workers` embedding calls are in flight at once. Dropping the
/// returned future abandons outstanding calls.
pub async fn build_index(
    root: &Path,
    inventory: &Inventory,
    embedder: Arc<dyn EmbeddingService>,
    policy: CallPolicy,
    workers: usize,
) -> IndexOutput {
    let mut degraded = Vec::new();
    let mut pending = Vec::new();

    for file in inventory.files.iter().filter(|f| !f.chunks.is_empty()) {
        let text = match tokio::fs::read_to_string(root.join(&file.path)).await {
            Ok(text) => text,
            Err(e) => {
                degraded.push(Degraded::new(
                    Stage::Index,
                    DegradedKind::File,
                    &file.path,
                    e.to_string(),
                ));
                continue;
            }
        };

        for range in &file.chunks {
            match text.get(range.clone()) {
                Some(slice) if !slice.trim().is_empty() => pending.push(Chunk {
                    path: file.path.clone(),
                    range: range.clone(),
                    text: slice.to_string(),
                    embedding: None,
                }),
                Some(_) => {}
                None => degraded.push(Degraded::new(
                    Stage::Index,
                    DegradedKind::File,
                    &file.path,
                    "file changed since it was scanned",
                )),
            }
        }
    }

    debug!(chunks = pending.len(), "embedding chunks");

    let results: Vec<(Chunk, Result<Vec<f32>, String>)> = stream::iter(pending)
        .map(|chunk| {
            let embedder = Arc::clone(&embedder);
            async move {
                let result = policy
                    .call("embed", || embedder.embed(&chunk.text))
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|v| {
                        if v.is_empty() {
                            Err("empty embedding".to_string())
                        } else {
                            Ok(v)
                        }
                    });
                (chunk, result)
            }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut chunks = Vec::with_capacity(results.len());
    let mut failed = Vec::new();
    for (mut chunk, result) in results {
        match result {
            Ok(vector) => chunk.embedding = Some(vector),
            Err(message) => failed.push(Degraded::new(
                Stage::Index,
                DegradedKind::Chunk,
                chunk.id(),
                message,
            )),
        }
        chunks.push(chunk);
    }
    failed.sort_by(|a, b| a.subject.cmp(&b.subject));
    degraded.extend(failed);

    let index = ChunkIndex::new(chunks);
    info!(
        chunks = index.len(),
        embedded = index.embedded_count(),
        "chunk index built"
    );
    IndexOutput { index, degraded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::scan::scan_repository;
    use crate::services::ServiceError;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    fn chunk(path: &str, start: usize, embedding: Option<Vec<f32>>) -> Chunk {
        Chunk {
            path: path.to_string(),
            range: start..start + 10,
            text: "x".to_string(),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn test_nearest_breaks_ties_by_path_then_offset() {
        let index = ChunkIndex::new(vec![
            chunk("b.py", 0, Some(vec![1.0, 0.0])),
            chunk("a.py", 20, Some(vec![2.0, 0.0])),
            chunk("a.py", 0, Some(vec![1.0, 0.0])),
            chunk("c.py", 0, Some(vec![0.0, 1.0])),
            chunk("d.py", 0, None),
            chunk("e.py", 0, Some(vec![1.0, 0.0, 0.0])),
        ]);

        let hits = index.nearest(&[1.0, 0.0], 3);
        let ids: Vec<String> = hits.iter().map(|h| h.chunk.id()).collect();
        assert_eq!(ids, vec!["a.py#0-10", "a.py#20-30", "b.py#0-10"]);

        let all = index.nearest(&[1.0, 0.0], 10);
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].chunk.path, "c.py");
    }

    struct FailOn(&'static str);

    #[async_trait]
    impl EmbeddingService for FailOn {
        fn name(&self) -> &str {
            "fail-on"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
            if text.contains(self.0) {
                Err(ServiceError::Unavailable("model crashed".to_string()))
            } else {
                Ok(vec![text.len() as f32, 1.0])
            }
        }
    }

    #[tokio::test]
    async fn test_failed_embedding_degrades_one_chunk() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("good.py"), "x = 1\n").unwrap();
        std::fs::write(temp.path().join("bad.py"), "POISON = 2\n").unwrap();
        std::fs::write(temp.path().join("blank.txt"), "   \n\n").unwrap();

        let settings = Settings::default();
        let scan = scan_repository(temp.path(), &settings).unwrap();
        let output = build_index(
            temp.path(),
            &scan.inventory,
            Arc::new(FailOn("POISON")),
            CallPolicy::new(Duration::from_secs(1), 1),
            4,
        )
        .await;

        assert_eq!(output.index.len(), 2);
        assert_eq!(output.index.embedded_count(), 1);
        assert_eq!(output.degraded.len(), 1);
        assert_eq!(output.degraded[0].kind, DegradedKind::Chunk);
        assert_eq!(output.degraded[0].subject, "bad.py#0-11");

        let hits = output.index.nearest(&[1.0, 0.2], 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.path, "good.py");
    }
}
