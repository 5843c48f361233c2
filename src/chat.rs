//! Conversation orchestrator: composes the rules, the stores, and one LLM
//! call into a single turn.
//!
//! Per-turn state machine, each early return terminal:
//! refusal → identity → tone → greeting → direct answer → recall → LLM →
//! tone suffix → self-disclosure write-back. The greeting and direct-answer
//! paths never reach the LLM; the refusal path never writes a store.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use crate::ai::{Embedder, LlmClient};
use crate::facts::FactStore;
use crate::memory::VectorMemory;
use crate::persona::{self, Tone};
use crate::prompts;
use crate::util::{blocking, truncate_chars};

/// How many chunks a turn pulls into the prompt.
pub const RECALL_K: usize = 3;

const DISCLOSURE_TRIGGERS: &[&str] = &[
    "my name is",
    "i live in",
    "i'm from",
    "i am from",
    "my favorite",
    "i like",
    "i love",
];

const CITY_TRIGGERS: &[&str] = &["i live in", "i'm from", "i am from"];

/// Session-scoped view of a user. Created on their first turn, mutated when a
/// name is extracted, never persisted except via the fact store side-channel.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: String,
    pub name: Option<String>,
    pub bot_name: String,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, bot_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
            bot_name: bot_name.into(),
        }
    }
}

/// Uniform index chooser for the greeting list. Production uses `rand`;
/// tests inject a deterministic one.
pub type Chooser = Arc<dyn Fn(usize) -> usize + Send + Sync>;

pub struct ChatEngine {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn Embedder>,
    pub memory: VectorMemory,
    pub facts: FactStore,
    choose: Chooser,
}

#[derive(Debug)]
pub struct TurnReply {
    pub reply: String,
    pub tone: Tone,
}

impl ChatEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn Embedder>,
        memory: VectorMemory,
        facts: FactStore,
    ) -> Self {
        Self {
            llm,
            embedder,
            memory,
            facts,
            choose: Arc::new(|n| rand::thread_rng().gen_range(0..n)),
        }
    }

    pub fn with_chooser(mut self, choose: Chooser) -> Self {
        self.choose = choose;
        self
    }

    pub async fn chat_turn(&self, profile: &mut UserProfile, input: &str) -> TurnReply {
        let lowered = input.to_lowercase();

        // grounding refusal: terminal, no store write, no LLM call
        if let Some(refusal) = persona::grounded_response(input) {
            return TurnReply { reply: refusal.to_string(), tone: Tone::Neutral };
        }

        if let Some(identity) = persona::maintain_identity(input, profile) {
            return TurnReply { reply: identity, tone: Tone::Neutral };
        }

        let tone = persona::adapt_tone(input);

        // a bare "hi" should cost nothing, so this runs ahead of recall + LLM
        if let Some(greeting) = self.greeting_reply(input) {
            return TurnReply { reply: greeting, tone };
        }

        // canonical questions answered from the stores, LLM bypassed
        if let Some(direct) = self.direct_answer(profile, &lowered).await {
            return TurnReply { reply: direct, tone };
        }

        let recalled = self
            .memory
            .recall(self.embedder.as_ref(), &profile.user_id, input, RECALL_K)
            .await;
        let facts_block = recalled.join("\n");
        debug!(
            user = %profile.user_id,
            recalled = recalled.len(),
            preview = %truncate_chars(&facts_block, 80),
            "memory recalled"
        );

        let system = prompts::system_preamble(&profile.bot_name, &facts_block);
        let raw = match self.llm.complete(&system, input).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "LLM call failed, substituting apology");
                prompts::APOLOGY_REPLY.to_string()
            }
        };

        let reply = persona::natural_response(&raw, tone);

        self.capture_disclosure(profile, input, &lowered).await;

        TurnReply { reply, tone }
    }

    /// Raw recall path, surfaced on the debug API.
    pub async fn recall_raw(&self, user: &str, query: &str, k: usize) -> Vec<String> {
        self.memory.recall(self.embedder.as_ref(), user, query, k).await
    }

    fn greeting_reply(&self, input: &str) -> Option<String> {
        let lowered = input.trim().to_lowercase();
        let normalized =
            lowered.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
        if prompts::GREETING_TOKENS.contains(&normalized) {
            let idx = (self.choose)(prompts::GREETING_REPLIES.len());
            Some(prompts::GREETING_REPLIES[idx % prompts::GREETING_REPLIES.len()].to_string())
        } else {
            None
        }
    }

    async fn direct_answer(&self, profile: &UserProfile, lowered: &str) -> Option<String> {
        let key = if lowered.contains("what's my name") || lowered.contains("what is my name") {
            "name"
        } else if lowered.contains("where do i live") {
            "city"
        } else {
            return None;
        };

        let facts = self.facts.clone();
        let owner = profile.user_id.clone();
        let stored = blocking(move || facts.get_fact(&owner, key))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "fact lookup task failed");
                None
            });
        if let Some(value) = stored {
            return Some(match key {
                "name" => prompts::name_reply(&value),
                _ => prompts::city_reply(&value),
            });
        }

        // fact store is empty for this key, fall back to the raw utterances
        let recalled = self
            .memory
            .recall(self.embedder.as_ref(), &profile.user_id, key, RECALL_K)
            .await;
        if let Some(chunk) = recalled.first() {
            return Some(prompts::remembered_reply(chunk));
        }
        Some(prompts::UNKNOWN_REPLY.to_string())
    }

    /// Self-disclosure write-back: conservative extraction into the fact
    /// store, plus the raw utterance into vector memory.
    async fn capture_disclosure(&self, profile: &mut UserProfile, input: &str, lowered: &str) {
        if !DISCLOSURE_TRIGGERS.iter().any(|t| lowered.contains(t)) {
            return;
        }

        if let Some(name) = extract_after(input, "my name is") {
            self.write_fact(&profile.user_id, "name", &name).await;
            profile.name = Some(name);
        }
        for trigger in CITY_TRIGGERS {
            if let Some(city) = extract_after(input, trigger) {
                self.write_fact(&profile.user_id, "city", &city).await;
                break;
            }
        }

        let mut metadata = HashMap::new();
        metadata.insert("user".to_string(), profile.user_id.clone());
        metadata.insert("kind".to_string(), "self_disclosure".to_string());
        self.memory
            .store(self.embedder.as_ref(), &profile.user_id, input, metadata)
            .await;
    }

    /// Fact writes run on the spawn_blocking pool like every other store
    /// access; a failed join is logged, the write itself never errors.
    async fn write_fact(&self, user: &str, key: &'static str, value: &str) {
        let facts = self.facts.clone();
        let (owner, value) = (user.to_string(), value.to_string());
        if let Err(e) = blocking(move || facts.update_fact(&owner, key, &value)).await {
            warn!(error = %e, "fact write task failed");
        }
    }
}

/// First purely-alphabetic token after a trigger phrase, original casing
/// preserved. Returns `None` when the trigger is absent or nothing
/// extractable follows.
fn extract_after(input: &str, trigger: &str) -> Option<String> {
    let lowered = input.to_lowercase();
    let pos = lowered.find(trigger)?;
    // byte offsets line up for ASCII input; `get` degrades to None on the
    // rare case-folding length change instead of panicking
    let rest = input.get(pos + trigger.len()..)?;
    rest.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphabetic()))
        .find(|w| !w.is_empty() && w.chars().all(|c| c.is_alphabetic()))
        .map(|w| w.to_string())
}
