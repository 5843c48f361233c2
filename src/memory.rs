//! Per-user persistent memory chunks: semantic recall with a deterministic
//! keyword fallback.
//!
//! Each user gets a private directory named by their normalized id; chunks are
//! appended to a JSONL file and flushed synchronously. Append-only, no update
//! or delete. Semantic similarity can miss short exact-keyword facts
//! ("my favorite color is blue" vs. query "color"), so recall additionally
//! scans all chunks for a fixed vocabulary and unions the matches in.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ai::{cosine_similarity, EmbedCache, Embedder};
use crate::facts::normalize_user;
use crate::util::{blocking, now_ms};

/// Fallback vocabulary. False positives and negatives are expected; this is
/// a heuristic, not a precision mechanism.
pub const KEYWORD_VOCAB: &[&str] = &["name", "live", "city", "from", "favorite", "like", "love"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryChunk {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct VectorMemory {
    root: PathBuf,
    embed_cache: EmbedCache,
}

impl VectorMemory {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            embed_cache: EmbedCache::new(128),
        }
    }

    fn user_file(&self, user: &str) -> PathBuf {
        self.root.join(normalize_user(user)).join("chunks.jsonl")
    }

    fn load_chunks(&self, user: &str) -> Vec<MemoryChunk> {
        let raw = match std::fs::read_to_string(self.user_file(user)) {
            Ok(r) => r,
            Err(_) => return vec![],
        };
        raw.lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(chunk) => Some(chunk),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable memory chunk");
                    None
                }
            })
            .collect()
    }

    /// Embed `text` and append it to the user's collection. Embedding failure
    /// stores the chunk without a vector (the keyword fallback keeps it
    /// reachable); I/O failure is logged and dropped.
    pub async fn store(
        &self,
        embedder: &dyn Embedder,
        user: &str,
        text: &str,
        metadata: HashMap<String, String>,
    ) {
        let embedding = match embedder.embed(&[text.to_string()]).await {
            Ok(mut embs) if !embs.is_empty() => Some(embs.remove(0)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "embedding failed, storing chunk without vector");
                None
            }
        };
        let chunk = MemoryChunk {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            metadata,
            embedding,
            created_at: now_ms(),
        };
        let this = self.clone();
        let owner = user.to_string();
        match blocking(move || this.append(&owner, &chunk)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(user = %normalize_user(user), error = %e, "memory store failed")
            }
            Err(e) => warn!(error = %e, "memory store task failed"),
        }
    }

    fn append(&self, user: &str, chunk: &MemoryChunk) -> std::io::Result<()> {
        let path = self.user_file(user);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut line = serde_json::to_vec(chunk)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        f.write_all(&line)?;
        f.sync_all()
    }

    /// Return up to `k` chunk texts: nearest by cosine similarity, then the
    /// keyword-fallback union. An empty collection returns empty without
    /// touching the embedder.
    pub async fn recall(
        &self,
        embedder: &dyn Embedder,
        user: &str,
        query: &str,
        k: usize,
    ) -> Vec<String> {
        let this = self.clone();
        let owner = user.to_string();
        let chunks = match blocking(move || this.load_chunks(&owner)).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "memory load task failed");
                return vec![];
            }
        };
        if chunks.is_empty() || k == 0 {
            return vec![];
        }

        let mut results: Vec<String> = Vec::new();

        let query_emb = match self.embed_cache.get(query) {
            Some(e) => Some(e),
            None => match embedder.embed(&[query.to_string()]).await {
                Ok(mut embs) if !embs.is_empty() => {
                    let e = embs.remove(0);
                    self.embed_cache.insert(query.to_string(), e.clone());
                    Some(e)
                }
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "query embedding failed, keyword fallback only");
                    None
                }
            },
        };

        if let Some(qemb) = query_emb {
            let mut scored: Vec<(f64, &MemoryChunk)> = chunks
                .iter()
                .filter_map(|c| {
                    c.embedding
                        .as_ref()
                        .map(|e| (cosine_similarity(&qemb, e), c))
                })
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
            for (_, chunk) in scored.into_iter().take(k) {
                results.push(chunk.text.clone());
            }
        }

        // keyword fallback: append vocabulary matches not already present
        for chunk in &chunks {
            let lower = chunk.text.to_lowercase();
            if KEYWORD_VOCAB.iter().any(|kw| lower.contains(kw))
                && !results.iter().any(|r| r == &chunk.text)
            {
                results.push(chunk.text.clone());
            }
        }

        results.truncate(k);
        debug!(user = %normalize_user(user), query, returned = results.len(), "recall");
        results
    }

    pub fn count(&self, user: &str) -> usize {
        self.load_chunks(user).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Returns a constant unit vector and counts calls.
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
            Err(ChatError::AiBackend("embedding backend down".into()))
        }
    }

    fn memory() -> (tempfile::TempDir, VectorMemory) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mem = VectorMemory::open(dir.path().join("memory"));
        (dir, mem)
    }

    #[tokio::test]
    async fn empty_collection_skips_embedder() {
        let (_dir, mem) = memory();
        let embedder = CountingEmbedder::new();
        let out = mem.recall(&embedder, "sam", "anything", 3).await;
        assert!(out.is_empty());
        assert_eq!(embedder.calls(), 0, "empty collection must not embed the query");
    }

    #[tokio::test]
    async fn store_then_recall_roundtrip() {
        let (_dir, mem) = memory();
        let embedder = CountingEmbedder::new();
        mem.store(&embedder, "sam", "my favorite color is blue", HashMap::new())
            .await;
        assert_eq!(mem.count("sam"), 1);

        let out = mem.recall(&embedder, "sam", "color", 3).await;
        assert_eq!(out, vec!["my favorite color is blue".to_string()]);
    }

    #[tokio::test]
    async fn keyword_fallback_survives_embedding_outage() {
        let (_dir, mem) = memory();
        // stored without a vector, recalled without a query embedding
        mem.store(&FailingEmbedder, "sam", "I live in Portland", HashMap::new())
            .await;
        let out = mem.recall(&FailingEmbedder, "sam", "where", 3).await;
        assert_eq!(out, vec!["I live in Portland".to_string()]);
    }

    #[tokio::test]
    async fn recall_truncates_to_k() {
        let (_dir, mem) = memory();
        let embedder = CountingEmbedder::new();
        for i in 0..5 {
            mem.store(&embedder, "sam", &format!("fact {i} about my favorite things"), HashMap::new())
                .await;
        }
        let out = mem.recall(&embedder, "sam", "favorite", 2).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let (_dir, mem) = memory();
        let embedder = CountingEmbedder::new();
        mem.store(&embedder, "sam", "my name is Sam", HashMap::new()).await;
        let out = mem.recall(&embedder, "alex", "name", 3).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn query_embedding_is_cached() {
        let (_dir, mem) = memory();
        let embedder = CountingEmbedder::new();
        mem.store(&embedder, "sam", "i love hiking", HashMap::new()).await;
        assert_eq!(embedder.calls(), 1); // store

        mem.recall(&embedder, "sam", "hiking", 3).await;
        mem.recall(&embedder, "sam", "hiking", 3).await;
        // second recall hits the cache
        assert_eq!(embedder.calls(), 2);
    }
}
