//! Call audio buffering and WAV persistence

use crate::runtime::{Recording, RecordingSink};
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Telephony audio is 8 kHz mono
pub const DEFAULT_SAMPLE_RATE: u32 = 8000;
pub const DEFAULT_CHANNELS: u16 = 1;
/// One hour of 16-bit 8 kHz mono
pub const DEFAULT_MAX_RECORDING_BYTES: usize = 8000 * 2 * 60 * 60;

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Recording task failed: {0}")]
    Task(String),
}

/// Accumulates raw PCM for one session, up to `max_bytes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    pcm: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    max_bytes: usize,
    truncated: bool,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            pcm: Vec::new(),
            sample_rate,
            channels,
            max_bytes: DEFAULT_MAX_RECORDING_BYTES,
            truncated: false,
        }
    }

    /// Cap the buffered audio; rounded down to whole 16-bit samples
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes & !1;
        self
    }

    pub fn set_format(&mut self, sample_rate: u32, channels: u16) {
        self.sample_rate = sample_rate;
        self.channels = channels;
    }

    /// Append PCM; audio past the cap is dropped with a single warning
    pub fn extend(&mut self, pcm: &[u8]) {
        let room = self.max_bytes.saturating_sub(self.pcm.len());
        if pcm.len() > room && !self.truncated {
            tracing::warn!(
                max_bytes = self.max_bytes,
                "Recording size limit reached, dropping further audio"
            );
            self.truncated = true;
        }
        self.pcm.extend_from_slice(&pcm[..pcm.len().min(room)]);
    }

    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    /// Drain the buffer into a recording for `session_id`
    pub fn take_recording(&mut self, session_id: &str) -> Recording {
        self.truncated = false;
        Recording {
            session_id: session_id.to_string(),
            audio: std::mem::take(&mut self.pcm),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)
    }
}

/// Writes each recording as a 16-bit PCM WAV file
pub struct WavRecordingSink {
    dir: PathBuf,
}

impl WavRecordingSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `{session_id}_recording_{YYYYmmdd_HHMMSS}.wav` inside the sink directory
    fn file_path(&self, session_id: &str) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.dir.join(format!("{session_id}_recording_{stamp}.wav"))
    }
}

#[async_trait]
impl RecordingSink for WavRecordingSink {
    async fn save(&self, recording: Recording) -> Result<(), RecordingError> {
        if recording.is_empty() {
            tracing::info!(session_id = %recording.session_id, "No audio data to save");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.file_path(&recording.session_id);
        let target = path.clone();

        tokio::task::spawn_blocking(move || write_wav(&target, &recording))
            .await
            .map_err(|e| RecordingError::Task(e.to_string()))??;

        tracing::info!(path = %path.display(), "Recording saved");
        Ok(())
    }
}

/// Encode little-endian 16-bit PCM bytes as a WAV file; a trailing odd byte is dropped
pub fn write_wav(path: &Path, recording: &Recording) -> Result<(), RecordingError> {
    let spec = WavSpec {
        channels: recording.channels,
        sample_rate: recording.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for chunk in recording.audio.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
    }
    writer.finalize()?;
    Ok(())
}
