//! zeta — personality-consistent chat companion with per-user long-term
//! memory. Rule-based heuristics + one LLM call per turn.

pub mod ai;
pub mod api;
pub mod chat;
pub mod error;
pub mod facts;
pub mod memory;
pub mod persona;
pub mod prompts;
pub mod util;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use chat::{ChatEngine, UserProfile};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChatEngine>,
    pub bot_name: String,
    sessions: Arc<Mutex<HashMap<String, UserProfile>>>,
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(engine: Arc<ChatEngine>, bot_name: impl Into<String>) -> Self {
        Self {
            engine,
            bot_name: bot_name.into(),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            started_at: std::time::Instant::now(),
        }
    }

    /// Session profiles live only for the lifetime of the process.
    pub fn profile(&self, user_id: &str) -> UserProfile {
        self.sessions
            .lock()
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id, &self.bot_name))
            .clone()
    }

    pub fn save_profile(&self, profile: UserProfile) {
        self.sessions.lock().insert(profile.user_id.clone(), profile);
    }
}
