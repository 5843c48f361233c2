//! zeta — chat companion backed by an LLM call and per-user long-term memory.

use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use zeta::ai::AiConfig;
use zeta::chat::ChatEngine;
use zeta::facts::FactStore;
use zeta::memory::VectorMemory;
use zeta::AppState;

#[derive(Parser)]
#[command(name = "zeta", version, about = "Chat companion with long-term memory")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3942", env = "ZETA_PORT")]
    port: u16,

    /// Data directory (fact file + per-user memory collections)
    #[arg(short, long, default_value = "zeta-data", env = "ZETA_DATA")]
    data: String,

    /// Bot persona name
    #[arg(short, long, default_value = "Zeta", env = "ZETA_BOT_NAME")]
    bot_name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    // missing LLM configuration is fatal at startup; everything after
    // startup degrades instead of failing
    let ai = Arc::new(
        AiConfig::from_env()
            .expect("ZETA_LLM_URL must be set (OpenAI-compatible chat completions endpoint)"),
    );

    let data = std::path::PathBuf::from(&args.data);
    let facts = FactStore::open(data.join("user_facts.json"));
    let memory = VectorMemory::open(data.join("memory"));

    let engine = Arc::new(ChatEngine::new(ai.clone(), ai, memory, facts));
    let state = AppState::new(engine, &args.bot_name);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        data = %args.data,
        bot = %args.bot_name,
        "zeta starting"
    );

    let app = zeta::api::router(state);
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    info!("shutting down");
}
