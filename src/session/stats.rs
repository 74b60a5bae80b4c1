use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of a capture session for downstream consumers
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Session identifier from the configuration
    pub session_id: String,

    /// Current state label ("idle", "recording", ...)
    pub state: String,

    /// When audio capture started, if a recording is live
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds elapsed since capture started (0.0 when not recording)
    pub elapsed_secs: f64,
}
