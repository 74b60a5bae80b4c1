use crate::error::SessionErrorKind;

/// Observable state of a capture session. Exactly one variant is active at a
/// time; every transition is published.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No session in flight
    Idle,
    /// Awaiting microphone/speech authorization
    RequestingPermission,
    /// Audio stream acquired and running, recognition in progress
    Recording,
    /// Audio released, waiting for the engine's final result
    Processing,
    /// A final transcript was obtained (transient, followed by `Idle`)
    Completed(String),
    /// A failure was surfaced (auto-resets to `Idle` shortly after)
    Error(SessionErrorKind),
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::RequestingPermission => "requesting_permission",
            SessionState::Recording => "recording",
            SessionState::Processing => "processing",
            SessionState::Completed(_) => "completed",
            SessionState::Error(_) => "error",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_equality_preserves_the_kind() {
        let denied = SessionState::Error(SessionErrorKind::PermissionDenied);
        let unavailable = SessionState::Error(SessionErrorKind::Unavailable);

        assert_eq!(
            denied,
            SessionState::Error(SessionErrorKind::PermissionDenied)
        );
        assert_ne!(denied, unavailable);
    }

    #[test]
    fn completed_equality_compares_the_transcript() {
        assert_eq!(
            SessionState::Completed("hello".into()),
            SessionState::Completed("hello".into())
        );
        assert_ne!(
            SessionState::Completed("hello".into()),
            SessionState::Completed("world".into())
        );
    }
}
