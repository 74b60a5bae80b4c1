use thiserror::Error;

/// Failures reported by the audio capture layer.
///
/// Configuration and stream-start failures are distinct so callers can tell
/// whether the device was ever usable. Both leave the capture session exactly
/// as if `acquire` had never been called.
#[derive(Debug, Error)]
pub enum AudioError {
    /// `acquire` was called while a stream is already acquired.
    #[error("audio capture already acquired")]
    AlreadyAcquired,

    /// The input device could not be configured for recording.
    #[error("failed to configure input device: {0}")]
    Configure(String),

    /// The device was configured but the stream failed to start.
    #[error("failed to start audio stream: {0}")]
    StreamStart(String),
}

/// Failures reported by the speech engine when starting recognition.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine is not available on this device/locale.
    #[error("speech recognition unavailable")]
    Unavailable,

    /// The engine refused the recognition request.
    #[error("recognition request rejected: {0}")]
    Rejected(String),
}

/// Structured error kinds surfaced through `SessionState::Error`.
///
/// Kinds participate in equality so two error states with different causes
/// never compare equal. A `stop()` that completes without a transcript is not
/// an error; it is signaled as a `None` result instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionErrorKind {
    /// Microphone or speech permission was denied. Not retried automatically.
    #[error("speech recognition permission denied")]
    PermissionDenied,

    /// Recognition is unavailable, either at start or because the capture
    /// resource went away mid-session.
    #[error("speech recognition unavailable")]
    Unavailable,

    /// Device configuration or stream-start failure.
    #[error("audio device error: {0}")]
    AudioDevice(String),

    /// Engine-reported failure after a successful start. Cancellation is not
    /// a recognition error and never maps here.
    #[error("recognition error: {0}")]
    Recognition(String),
}

impl From<EngineError> for SessionErrorKind {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable => SessionErrorKind::Unavailable,
            EngineError::Rejected(detail) => SessionErrorKind::Recognition(detail),
        }
    }
}
