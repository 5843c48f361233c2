//! Talks to OpenAI-compatible APIs for the chat completion and embeddings.
//!
//! The orchestrator only sees the `LlmClient` and `Embedder` traits, so tests
//! inject counting doubles instead of a live backend.

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ChatError;

fn ai_err(msg: impl Into<String>) -> ChatError {
    ChatError::AiBackend(msg.into())
}

const AI_TIMEOUT: Duration = Duration::from_secs(30);

/// One non-streaming chat completion per turn.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ChatError>;
}

/// Converts text to fixed-dimension float vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError>;
}

#[derive(Clone)]
pub struct AiConfig {
    pub llm_url: String,
    pub llm_key: String,
    pub llm_model: String,
    pub embed_url: String,
    pub embed_key: String,
    pub embed_model: String,
    pub client: reqwest::Client,
}

impl AiConfig {
    /// Returns `None` if `ZETA_LLM_URL` is not set; the caller decides whether
    /// that is fatal (it is, at startup).
    pub fn from_env() -> Option<Self> {
        let llm_url = std::env::var("ZETA_LLM_URL").ok()?;
        let llm_key = std::env::var("ZETA_LLM_KEY").unwrap_or_default();
        let llm_model =
            std::env::var("ZETA_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        let embed_url = std::env::var("ZETA_EMBED_URL").unwrap_or_else(|_| {
            // Only rewrite if this looks like a chat completions endpoint
            if llm_url.contains("/chat/completions") {
                llm_url.replace("/chat/completions", "/embeddings")
            } else {
                format!("{}/embeddings", llm_url.trim_end_matches('/'))
            }
        });
        let embed_key = std::env::var("ZETA_EMBED_KEY").unwrap_or_else(|_| llm_key.clone());
        let embed_model = std::env::var("ZETA_EMBED_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".into());

        let client = reqwest::Client::builder()
            .timeout(AI_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Some(Self {
            llm_url,
            llm_key,
            llm_model,
            embed_url,
            embed_key,
            embed_model,
            client,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmClient for AiConfig {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ChatError> {
        let req = ChatRequest {
            model: self.llm_model.clone(),
            messages: vec![
                ChatMessage { role: "system".into(), content: system.into() },
                ChatMessage { role: "user".into(), content: user.into() },
            ],
            temperature: 0.2,
        };

        let mut builder = self.client.post(&self.llm_url).json(&req);
        if !self.llm_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.llm_key));
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ai_err(format!("LLM request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ai_err(format!("LLM returned {status}: {body}")));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ai_err(format!("LLM response parse failed: {e}")))?;
        Ok(chat
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for AiConfig {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let req = EmbedRequest {
            model: self.embed_model.clone(),
            input: texts.to_vec(),
        };

        let mut builder = self.client.post(&self.embed_url).json(&req);
        if !self.embed_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.embed_key));
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ai_err(format!("embedding request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ai_err(format!("embedding API returned {status}: {body}")));
        }

        let embed_resp: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| ai_err(format!("embedding response parse failed: {e}")))?;

        let embeddings: Vec<Vec<f32>> =
            embed_resp.data.into_iter().map(|d| d.embedding).collect();
        if embeddings.len() != texts.len() {
            return Err(ai_err(format!(
                "embedding count mismatch: sent {} texts, got {} embeddings",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }
}

/// Small LRU cache for query embeddings to avoid repeated API calls.
/// Key = query text, Value = embedding vector.
#[derive(Clone)]
pub struct EmbedCache {
    inner: Arc<parking_lot::Mutex<LruCache<String, Vec<f32>>>>,
}

impl EmbedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(parking_lot::Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(128).unwrap()),
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.inner.lock().get(key).cloned()
    }

    pub fn insert(&self, key: String, value: Vec<f32>) {
        self.inner.lock().put(key, value);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for i in 0..a.len() {
        let (ai, bi) = (a[i] as f64, b[i] as f64);
        dot += ai * bi;
        na += ai * ai;
        nb += bi * bi;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
