use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a capture/transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "capture-2026-08-24-memo")
    pub session_id: String,

    /// Upper bound on how long `stop()` waits for the engine's final result
    /// Default: 5000 ms
    pub final_result_timeout: Duration,

    /// Cadence of the elapsed-duration tick while recording
    /// Default: 100 ms
    pub tick_interval: Duration,

    /// How long a surfaced error state stays visible before the session
    /// auto-resets to idle
    pub error_reset: Duration,

    /// Pause between the cancel and start halves of `restart()`
    pub restart_delay: Duration,

    /// Audio capture settings
    pub audio: AudioCaptureConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("capture-{}", uuid::Uuid::new_v4()),
            final_result_timeout: Duration::from_millis(5000),
            tick_interval: Duration::from_millis(100),
            error_reset: Duration::from_millis(1500),
            restart_delay: Duration::from_millis(100),
            audio: AudioCaptureConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Configuration handed to the audio input device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioCaptureConfig {
    /// Sample rate for captured audio
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Tap buffer size in frames
    pub buffer_size: usize,

    /// Device session category (e.g., "record")
    pub category: String,

    /// Device session mode (e.g., "measurement")
    pub mode: String,
}

impl Default for AudioCaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // Speech engines expect 16kHz
            channels: 1,        // Mono
            buffer_size: 1024,
            category: "record".to_string(),
            mode: "measurement".to_string(),
        }
    }
}
