//! Counsel Voice - telephony relationship-counselor bot
//!
//! A websocket service driving a node-based conversation flow for voice
//! calls: each call walks a fixed graph of nodes, and function calls from
//! the model layer move it between them.

mod api;
mod config;
mod conversation;
mod llm;
mod recording;
mod runtime;
mod speech;
mod state_machine;
mod system_prompt;

use api::{create_router, AppState};
use config::ServerConfig;
use recording::{AudioBuffer, WavRecordingSink};
use runtime::{DiscardRecordings, RecordingSink, SessionManager};
use state_machine::HandlerRegistry;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counsel_voice=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = ServerConfig::from_env()?;

    let recorder: Arc<dyn RecordingSink> = if config.recording_enabled {
        tracing::info!(dir = %config.recordings_dir.display(), "Recording calls");
        Arc::new(WavRecordingSink::new(&config.recordings_dir))
    } else {
        tracing::warn!("Call recording disabled");
        Arc::new(DiscardRecordings)
    };

    let sessions = SessionManager::new(
        Arc::new(HandlerRegistry::standard()),
        recorder,
        AudioBuffer::new(config.sample_rate, config.channels).with_max_bytes(config.max_recording_bytes),
    );
    let state = AppState::new(sessions);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.addr();
    tracing::info!("Counsel voice server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
