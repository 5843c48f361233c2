//! HTTP surface: one chat endpoint plus the debug paths the UI shell uses.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::ChatError;
use crate::persona::Tone;
use crate::util::blocking;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/memory/query", get(memory_query))
        .route("/facts/{user}/{key}", get(get_fact))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state)
}

fn default_user() -> String {
    "local_user".into()
}

#[derive(Deserialize)]
struct ChatTurnRequest {
    #[serde(default = "default_user")]
    user_id: String,
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct ChatTurnResponse {
    reply: String,
    tone: Tone,
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatTurnRequest>,
) -> Result<Json<ChatTurnResponse>, ChatError> {
    if req.text.trim().is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    let mut profile = state.profile(&req.user_id);
    let turn = state.engine.chat_turn(&mut profile, &req.text).await;
    state.save_profile(profile);
    Ok(Json(ChatTurnResponse { reply: turn.reply, tone: turn.tone }))
}

#[derive(Deserialize)]
struct MemoryQueryParams {
    user: Option<String>,
    #[serde(default)]
    q: String,
    k: Option<usize>,
}

/// Raw recall path, equivalent to the "query memory" debug box in the UI.
async fn memory_query(
    State(state): State<AppState>,
    Query(params): Query<MemoryQueryParams>,
) -> Result<Json<serde_json::Value>, ChatError> {
    if params.q.trim().is_empty() {
        return Err(ChatError::EmptyQuery);
    }
    let user = params.user.unwrap_or_else(default_user);
    let k = params.k.unwrap_or(3).min(20);
    let chunks = state.engine.recall_raw(&user, &params.q, k).await;
    Ok(Json(serde_json::json!({ "user": user, "chunks": chunks })))
}

async fn get_fact(
    State(state): State<AppState>,
    Path((user, key)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ChatError> {
    let facts = state.engine.facts.clone();
    let (u, k) = (user.clone(), key.clone());
    let value = blocking(move || facts.get_fact(&u, &k)).await?;
    match value {
        Some(value) => Ok(Json(serde_json::json!({
            "user": user,
            "key": key,
            "value": value,
        }))),
        None => Err(ChatError::NotFound),
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "bot": state.bot_name,
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
