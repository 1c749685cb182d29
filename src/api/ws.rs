//! Websocket transport for call sessions
//!
//! One connection is one session: connecting starts it, `stop` or closing
//! the socket ends it. A session ended from elsewhere closes the socket
//! after its `session_ended` frame. Inbound frames are decoded into session events;
//! everything the session publishes is written back as outbound frames.

use super::types::{decode_media, ConnectParams, InboundFrame, OutboundFrame};
use super::AppState;
use crate::recording::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};
use crate::runtime::{SessionHandle, SessionManager};
use crate::state_machine::Event;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid media payload: {0}")]
    InvalidMedia(#[from] base64::DecodeError),
    #[error("Frame is for session '{got}', connection is bound to '{expected}'")]
    SessionMismatch { expected: String, got: String },
}

/// What the connection should do after a frame
#[derive(Debug, PartialEq)]
pub enum FrameAction {
    Forward(Event),
    Ignore,
    Stop,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let sessions = Arc::clone(&state.sessions);
    ws.on_upgrade(move |socket| handle_socket(socket, sessions, params.session_id))
}

async fn handle_socket(socket: WebSocket, sessions: Arc<SessionManager>, session_id: Option<String>) {
    let (mut sender, mut receiver) = socket.split();

    let handle = match sessions.start_session(session_id).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "Refusing websocket session");
            if let Ok(text) = serde_json::to_string(&OutboundFrame::error(e.to_string())) {
                let _ = sender.send(Message::Text(text)).await;
            }
            let _ = sender.close().await;
            return;
        }
    };
    let session_id = handle.session_id().to_string();
    tracing::info!(session_id = %session_id, "Websocket connected");

    let (tx, mut rx) = mpsc::channel::<OutboundFrame>(256);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode outbound frame");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    // Subscribe before starting so the opening utterance is not missed
    let mut subscription = handle.subscribe();
    let forward_tx = tx.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            if forward_tx.send(event.into()).await.is_err() {
                break;
            }
        }
        subscription.unsubscribe();
    });

    if handle.send(Event::SessionStart).await.is_ok() {
        tokio::select! {
            () = receive_frames(&mut receiver, &handle, &tx) => {}
            () = handle.released() => {
                tracing::info!(session_id = %session_id, "Session released elsewhere, closing socket");
            }
        }
    }

    if let Err(e) = handle.send(Event::SessionEnd).await {
        tracing::debug!(session_id = %session_id, error = %e, "Session already closed");
    }
    drop(handle);

    // Let the runtime flush what it published before release
    drop(tx);
    let _ = forward_task.await;
    let _ = send_task.await;
    tracing::info!(session_id = %session_id, "Websocket disconnected");
}

async fn receive_frames(
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    handle: &SessionHandle,
    tx: &mpsc::Sender<OutboundFrame>,
) {
    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match decode_frame(&text, handle.session_id()) {
            Ok(FrameAction::Forward(event)) => {
                if handle.send(event).await.is_err() {
                    break;
                }
            }
            Ok(FrameAction::Ignore) => {}
            Ok(FrameAction::Stop) => break,
            Err(e) => {
                tracing::warn!(session_id = %handle.session_id(), error = %e, "Bad inbound frame");
                let _ = tx.send(OutboundFrame::error(e.to_string())).await;
            }
        }
    }
}

/// Decode one inbound text frame for the session bound to this connection
pub fn decode_frame(text: &str, session_id: &str) -> Result<FrameAction, FrameError> {
    let check = |claimed: Option<String>| match claimed {
        Some(got) if got != session_id => Err(FrameError::SessionMismatch {
            expected: session_id.to_string(),
            got,
        }),
        _ => Ok(()),
    };

    match serde_json::from_str::<InboundFrame>(text)? {
        InboundFrame::Start {
            session_id: claimed,
            sample_rate,
            channels,
        } => {
            check(claimed)?;
            if sample_rate.is_none() && channels.is_none() {
                return Ok(FrameAction::Ignore);
            }
            Ok(FrameAction::Forward(Event::AudioFormat {
                sample_rate: sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
                channels: channels.unwrap_or(DEFAULT_CHANNELS),
            }))
        }
        InboundFrame::Media { payload } => Ok(FrameAction::Forward(Event::Audio {
            pcm: decode_media(&payload)?,
        })),
        InboundFrame::Transcript { text } => {
            Ok(FrameAction::Forward(Event::UserTranscript { text }))
        }
        InboundFrame::FunctionCall {
            session_id: claimed,
            function_name,
            arguments,
        } => {
            check(claimed)?;
            Ok(FrameAction::Forward(Event::FunctionCall {
                name: function_name,
                arguments,
            }))
        }
        InboundFrame::Stop => Ok(FrameAction::Stop),
    }
}
