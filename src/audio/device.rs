use anyhow::Result;
use tokio::sync::{mpsc, watch};

use crate::config::AudioCaptureConfig;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the stream started
    pub timestamp_ms: u64,
}

/// Audio input device abstraction
///
/// Platform implementations sit on top of the OS audio stack. Buffer delivery
/// happens on the device's own producer context; the tap only forwards frames
/// into the provided channel and never touches session state.
#[async_trait::async_trait]
pub trait AudioInputDevice: Send + Sync {
    /// Configure the device session for recording
    fn configure(&mut self, config: &AudioCaptureConfig) -> Result<()>;

    /// Install a data tap that forwards captured buffers into `frames`
    fn install_tap(&mut self, buffer_size: usize, frames: mpsc::Sender<AudioFrame>) -> Result<()>;

    /// Remove the installed tap
    fn remove_tap(&mut self);

    /// Start the input stream
    async fn start(&mut self) -> Result<()>;

    /// Stop the input stream
    async fn stop(&mut self);

    /// Whether the stream is currently running
    fn is_running(&self) -> bool;

    /// Deactivate the device session. Failures here are recoverable and are
    /// logged and swallowed by the capture layer.
    fn deactivate(&mut self) -> Result<()>;

    /// Availability notifications; `false` means the device went away
    fn availability(&self) -> watch::Receiver<bool>;
}
