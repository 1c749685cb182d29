//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::recording::RecordingError;
use async_trait::async_trait;
use std::sync::Arc;

/// Raw call audio handed over at session end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub session_id: String,
    /// Interleaved 16-bit little-endian PCM
    pub audio: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Recording {
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }
}

/// Destination for session recordings
#[async_trait]
pub trait RecordingSink: Send + Sync {
    /// Persist a recording; empty recordings may be skipped
    async fn save(&self, recording: Recording) -> Result<(), RecordingError>;
}

#[async_trait]
impl<T: RecordingSink + ?Sized> RecordingSink for Arc<T> {
    async fn save(&self, recording: Recording) -> Result<(), RecordingError> {
        (**self).save(recording).await
    }
}

/// Sink that drops every recording, used when recording is disabled
pub struct DiscardRecordings;

#[async_trait]
impl RecordingSink for DiscardRecordings {
    async fn save(&self, recording: Recording) -> Result<(), RecordingError> {
        tracing::debug!(
            session_id = %recording.session_id,
            bytes = recording.audio.len(),
            "Recording disabled, discarding audio"
        );
        Ok(())
    }
}
