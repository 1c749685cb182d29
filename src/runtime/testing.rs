//! Mock implementations for testing
//!
//! These mocks enable runtime tests without touching the filesystem.

use super::traits::{Recording, RecordingSink};
use crate::recording::RecordingError;
use async_trait::async_trait;
use std::sync::Mutex;

/// Recording sink that keeps everything it is given
#[derive(Default)]
pub struct MockRecordingSink {
    saved: Mutex<Vec<Recording>>,
    fail: bool,
}

impl MockRecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose every save fails
    pub fn failing() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn saved(&self) -> Vec<Recording> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordingSink for MockRecordingSink {
    async fn save(&self, recording: Recording) -> Result<(), RecordingError> {
        if self.fail {
            return Err(RecordingError::Io(std::io::Error::other("mock failure")));
        }
        self.saved.lock().unwrap().push(recording);
        Ok(())
    }
}
