//! Runtime for live call sessions
//!
//! Each session owns its state and runs in its own task. Transports talk to
//! it through a [`SessionHandle`]: events go in over an mpsc channel and
//! [`SessionEvent`]s come back out over a broadcast channel.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::llm::{LlmContext, ToolDefinition};
use crate::recording::AudioBuffer;
use crate::state_machine::{Event, HandlerRegistry, SessionContext, SessionState};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};

/// Events sent to session subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Cleaned utterance for the speech output
    BotSpeaking { text: String },
    /// Functions the model may call from the active node
    Functions { definitions: Vec<ToolDefinition> },
    /// Conversation snapshot for the model layer
    Context { context: LlmContext },
    FunctionResult { name: String, result: Value },
    Ended { status: String },
    Error { message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session '{0}' is already active")]
    AlreadyActive(String),
    #[error("Session '{0}' is closed")]
    Closed(String),
    #[error("Session '{0}' not found")]
    NotFound(String),
}

/// Handle to interact with a running session
pub struct SessionHandle {
    session_id: String,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    stage_rx: watch::Receiver<&'static str>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Queue an event; events are applied in the order they are sent
    pub async fn send(&self, event: Event) -> Result<(), SessionError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| SessionError::Closed(self.session_id.clone()))
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.broadcast_tx.subscribe(),
        }
    }

    /// Label of the current stage (`pending`, a node name, `ended`, `released`)
    pub fn stage(&self) -> &'static str {
        *self.stage_rx.borrow()
    }

    /// Resolves once the session has been released or its runtime is gone
    pub async fn released(&self) {
        let mut stage = self.stage_rx.clone();
        let _ = stage
            .wait_for(|label| *label == SessionState::Released.label())
            .await;
    }
}

/// Subscriber side of a session's event stream
///
/// Dropping it, or calling [`Subscription::unsubscribe`], stops delivery.
pub struct Subscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl Subscription {
    /// Next event, or `None` once the session has shut down
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Session subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub stage: &'static str,
}

/// Manager for all live sessions
pub struct SessionManager {
    registry: Arc<HandlerRegistry>,
    recorder: Arc<dyn RecordingSink>,
    /// Empty buffer cloned for each session: audio format and size cap
    audio: AudioBuffer,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionManager {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        recorder: Arc<dyn RecordingSink>,
        audio: AudioBuffer,
    ) -> Self {
        Self {
            registry,
            recorder,
            audio,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Spawn a runtime for a new session; a fresh UUID is used when no id is given
    pub async fn start_session(
        self: &Arc<Self>,
        session_id: Option<String>,
    ) -> Result<Arc<SessionHandle>, SessionError> {
        let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return Err(SessionError::AlreadyActive(session_id));
        }

        let (event_tx, event_rx) = mpsc::channel(64);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (stage_tx, stage_rx) = watch::channel("pending");

        let runtime = SessionRuntime::new(
            SessionContext::new(&session_id, Arc::clone(&self.registry)),
            self.audio.clone(),
            Arc::clone(&self.recorder),
            event_rx,
            broadcast_tx.clone(),
            stage_tx,
        );

        let handle = Arc::new(SessionHandle {
            session_id: session_id.clone(),
            event_tx,
            broadcast_tx,
            stage_rx,
        });
        sessions.insert(session_id.clone(), Arc::clone(&handle));
        drop(sessions);

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            runtime.run().await;
            manager.sessions.write().await.remove(&session_id);
            tracing::info!(session_id = %session_id, "Session runtime finished");
        });

        Ok(handle)
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<_> = sessions
            .values()
            .map(|h| SessionSummary {
                session_id: h.session_id.clone(),
                stage: h.stage(),
            })
            .collect();
        summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        summaries
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Ask a session to release its state and persist its recording
    pub async fn end_session(&self, session_id: &str) -> Result<(), SessionError> {
        let handle = self
            .get(session_id)
            .await
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        handle.send(Event::SessionEnd).await
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockRecordingSink;
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn manager(recorder: Arc<MockRecordingSink>) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            Arc::new(HandlerRegistry::standard()),
            recorder,
            AudioBuffer::new(8000, 1),
        ))
    }

    async fn next(sub: &mut Subscription) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("session closed")
    }

    async fn wait_until_gone(manager: &SessionManager, id: &str) {
        for _ in 0..100 {
            if manager.get(id).await.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {id} never finished");
    }

    #[tokio::test]
    async fn test_start_generates_id_when_missing() {
        let manager = manager(Arc::new(MockRecordingSink::new()));
        let handle = manager.start_session(None).await.unwrap();

        assert!(uuid::Uuid::parse_str(handle.session_id()).is_ok());
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_session_rejected() {
        let manager = manager(Arc::new(MockRecordingSink::new()));
        manager.start_session(Some("a".to_string())).await.unwrap();

        let err = manager
            .start_session(Some("a".to_string()))
            .await
            .err()
            .unwrap();
        assert_eq!(err, SessionError::AlreadyActive("a".to_string()));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let manager = manager(Arc::new(MockRecordingSink::new()));
        let a = manager.start_session(Some("a".to_string())).await.unwrap();
        let b = manager.start_session(Some("b".to_string())).await.unwrap();
        let mut sub_a = a.subscribe();
        let mut sub_b = b.subscribe();

        a.send(Event::SessionStart).await.unwrap();
        b.send(Event::SessionStart).await.unwrap();
        assert!(matches!(next(&mut sub_a).await, SessionEvent::BotSpeaking { .. }));
        assert!(matches!(next(&mut sub_b).await, SessionEvent::BotSpeaking { .. }));

        a.send(Event::FunctionCall {
            name: "collect_user_info".to_string(),
            arguments: json!({"name": "Alex", "age": 30}),
        })
        .await
        .unwrap();
        // drain a until its function result arrives
        loop {
            if let SessionEvent::FunctionResult { .. } = next(&mut sub_a).await {
                break;
            }
        }

        assert_eq!(a.stage(), "preferences");
        assert_eq!(b.stage(), "initial");
        let listed = manager.list().await;
        assert_eq!(
            listed,
            vec![
                SessionSummary {
                    session_id: "a".to_string(),
                    stage: "preferences"
                },
                SessionSummary {
                    session_id: "b".to_string(),
                    stage: "initial"
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_end_session_removes_and_records() {
        let recorder = Arc::new(MockRecordingSink::new());
        let manager = manager(recorder.clone());
        let handle = manager.start_session(Some("c".to_string())).await.unwrap();

        handle.send(Event::SessionStart).await.unwrap();
        handle.send(Event::Audio { pcm: vec![0, 1] }).await.unwrap();
        manager.end_session("c").await.unwrap();
        wait_until_gone(&manager, "c").await;

        let saved = recorder.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].audio, vec![0, 1]);
        assert_eq!(
            manager.end_session("c").await,
            Err(SessionError::NotFound("c".to_string()))
        );
    }

    #[tokio::test]
    async fn test_released_resolves_after_end_session() {
        let manager = manager(Arc::new(MockRecordingSink::new()));
        let handle = manager.start_session(Some("e".to_string())).await.unwrap();
        let mut sub = handle.subscribe();
        handle.send(Event::SessionStart).await.unwrap();

        manager.end_session("e").await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle.released())
            .await
            .expect("session never released");

        loop {
            if let SessionEvent::Ended { status } = next(&mut sub).await {
                assert_eq!(status, "released");
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_unsubscribed_session_keeps_running() {
        let manager = manager(Arc::new(MockRecordingSink::new()));
        let handle = manager.start_session(Some("d".to_string())).await.unwrap();
        handle.subscribe().unsubscribe();

        handle.send(Event::SessionStart).await.unwrap();
        let mut sub = handle.subscribe();
        handle
            .send(Event::UserTranscript {
                text: "hi".to_string(),
            })
            .await
            .unwrap();

        loop {
            if let SessionEvent::Context { context } = next(&mut sub).await {
                if context.messages.iter().any(|t| t.content == "hi") {
                    break;
                }
            }
        }
    }
}
