//! Capture session orchestration
//!
//! This module provides the `CaptureSession` state machine that manages:
//! - Permission acquisition
//! - Audio-device tap lifecycle
//! - Coordination with the speech-to-text engine
//! - The bounded wait for a final transcript
//! - Cancellation, timeout, and guaranteed cleanup on every exit path

mod awaiter;
mod session;
mod state;
mod stats;

pub use awaiter::FinalResultAwaiter;
pub use session::CaptureSession;
pub use state::SessionState;
pub use stats::SessionStats;
