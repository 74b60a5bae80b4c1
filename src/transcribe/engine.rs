use tokio::sync::mpsc;

use crate::audio::AudioFrame;
use crate::error::EngineError;

/// Events emitted by a speech engine during one recognition attempt.
///
/// Exactly one of `Final`, `Cancelled`, or `Failed` ends the attempt.
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// Interim (partial) hypothesis; this system discards these
    Interim(String),
    /// Completed transcript for the attempt
    Final(String),
    /// The attempt was cancelled before completing
    Cancelled,
    /// The engine failed after a successful start
    Failed(String),
}

/// Control surface for an in-flight recognition attempt
pub trait RecognitionControl: Send + Sync {
    /// Signal that no more audio will be appended; the engine then emits its
    /// terminal event
    fn end_of_audio(&self);

    /// Request immediate termination. The engine emits at most one terminal
    /// event afterwards, never two. Safe to call after termination.
    fn cancel(&self);
}

/// A live recognition attempt: its event feed plus its control handle
pub struct RecognitionStream {
    pub events: mpsc::Receiver<RecognitionEvent>,
    pub control: Box<dyn RecognitionControl>,
}

/// Speech-to-text engine abstraction
///
/// The engine consumes streamed audio buffers and reports results through the
/// returned `RecognitionStream`.
#[async_trait::async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Whether recognition is available on this device/locale
    fn is_available(&self) -> bool;

    /// Begin a recognition attempt over the given audio stream
    async fn begin(
        &self,
        frames: mpsc::Receiver<AudioFrame>,
    ) -> Result<RecognitionStream, EngineError>;
}
