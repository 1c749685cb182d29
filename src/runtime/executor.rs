//! Session runtime executor

use super::traits::RecordingSink;
use super::SessionEvent;
use crate::conversation::ConversationState;
use crate::recording::AudioBuffer;
use crate::speech::clean_for_speech;
use crate::state_machine::{
    transition, Effect, Event, Node, SessionContext, SessionState, TransitionError,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Drives one session: applies events in arrival order, one at a time
pub struct SessionRuntime {
    context: SessionContext,
    state: SessionState,
    /// `None` before the first reset and after release
    conversation: Option<ConversationState>,
    audio: AudioBuffer,
    recorder: Arc<dyn RecordingSink>,
    event_rx: mpsc::Receiver<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    stage_tx: watch::Sender<&'static str>,
    recording_task: Option<JoinHandle<()>>,
}

impl SessionRuntime {
    pub fn new(
        context: SessionContext,
        audio: AudioBuffer,
        recorder: Arc<dyn RecordingSink>,
        event_rx: mpsc::Receiver<Event>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
        stage_tx: watch::Sender<&'static str>,
    ) -> Self {
        Self {
            context,
            state: SessionState::Pending,
            conversation: None,
            audio,
            recorder,
            event_rx,
            broadcast_tx,
            stage_tx,
            recording_task: None,
        }
    }

    pub async fn run(mut self) {
        let session_id = self.context.session_id.clone();
        tracing::info!(session_id = %session_id, "Starting session runtime");

        while let Some(event) = self.event_rx.recv().await {
            // Errors are already reported to subscribers
            let _ = self.process_event(event);
            if self.state == SessionState::Released {
                break;
            }
        }

        // Transport vanished without a stop: release anyway
        if self.state != SessionState::Released {
            let _ = self.process_event(Event::SessionEnd);
        }

        if let Some(task) = self.recording_task.take() {
            let _ = task.await;
        }

        tracing::info!(session_id = %session_id, "Session runtime stopped");
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = match transition(&self.state, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    stage = self.state.label(),
                    error = %e,
                    "Rejected session event"
                );
                let _ = self.broadcast_tx.send(SessionEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let old_label = self.state.label();
        self.state = result.new_state;
        if old_label != self.state.label() {
            tracing::info!(
                session_id = %self.context.session_id,
                from = old_label,
                to = self.state.label(),
                functions = ?self.state.active_node().map(Node::function_names),
                "Stage changed"
            );
            let _ = self.stage_tx.send(self.state.label());
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ResetConversation => match self.conversation.as_mut() {
                Some(conversation) => conversation.reset(),
                None => self.conversation = Some(ConversationState::new()),
            },
            Effect::RecordUserName { name } => {
                if let Some(conversation) = self.conversation.as_mut() {
                    conversation.record_user_name(name);
                }
            }
            Effect::AppendTurn { turn } => {
                if let Some(conversation) = self.conversation.as_mut() {
                    conversation.append(turn);
                }
            }
            Effect::Speak { text } => {
                let _ = self.broadcast_tx.send(SessionEvent::BotSpeaking {
                    text: clean_for_speech(&text),
                });
            }
            Effect::RegisterFunctions { definitions } => {
                let _ = self.broadcast_tx.send(SessionEvent::Functions { definitions });
            }
            Effect::PublishContext => {
                if let (Some(conversation), Some(node)) =
                    (self.conversation.as_ref(), self.state.active_node())
                {
                    let _ = self.broadcast_tx.send(SessionEvent::Context {
                        context: conversation.llm_context(node),
                    });
                }
            }
            Effect::FunctionResult { name, result } => {
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::FunctionResult { name, result });
            }
            Effect::NotifyEnded { status } => {
                let _ = self.broadcast_tx.send(SessionEvent::Ended { status });
            }
            Effect::SetAudioFormat {
                sample_rate,
                channels,
            } => {
                self.audio.set_format(sample_rate, channels);
            }
            Effect::BufferAudio { pcm } => {
                self.audio.extend(&pcm);
            }
            Effect::PersistRecording => {
                tracing::debug!(
                    session_id = %self.context.session_id,
                    bytes = self.audio.len(),
                    "Handing recording to sink"
                );
                let recording = self.audio.take_recording(&self.context.session_id);
                let recorder = Arc::clone(&self.recorder);
                self.recording_task = Some(tokio::spawn(async move {
                    let session_id = recording.session_id.clone();
                    if let Err(e) = recorder.save(recording).await {
                        tracing::error!(session_id = %session_id, error = %e, "Failed to save recording");
                    }
                }));
            }
            Effect::ReleaseConversation => {
                if let Some(conversation) = self.conversation.take() {
                    tracing::debug!(
                        session_id = %self.context.session_id,
                        turns = conversation.len(),
                        user_name = conversation.user_name().unwrap_or("unknown"),
                        "Conversation released"
                    );
                }
            }
        }
    }
}
