pub mod audio;
pub mod config;
pub mod error;
pub mod permission;
pub mod session;
pub mod transcribe;

pub use audio::{AudioCaptureSession, AudioFrame, AudioInputDevice, StreamHandle};
pub use config::{AudioCaptureConfig, SessionConfig};
pub use error::{AudioError, EngineError, SessionErrorKind};
pub use permission::{PermissionAuthority, PermissionGate, PermissionStatus};
pub use session::{CaptureSession, FinalResultAwaiter, SessionState, SessionStats};
pub use transcribe::{
    RecognitionControl, RecognitionEvent, RecognitionStream, SpeechEngine, TerminalEvent,
    TranscriptionChannel,
};
