//! Microphone and speech-recognition authorization
//!
//! Wraps the OS permission subsystem behind `PermissionAuthority` and applies
//! the capture policy: never prompt when microphone access is already denied,
//! prompt at most once while undetermined, and request speech authorization
//! only after the microphone is granted.

use std::sync::Arc;

use tracing::{debug, warn};

/// Authorization status reported by the permission subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// OS-level permission subsystem
///
/// Implementations are backed by platform permission callbacks. Requests must
/// resolve eventually; they never block the caller indefinitely.
#[async_trait::async_trait]
pub trait PermissionAuthority: Send + Sync {
    /// Current microphone permission without prompting
    fn microphone_status(&self) -> PermissionStatus;

    /// Prompt for microphone access, returns whether it was granted
    async fn request_microphone(&self) -> bool;

    /// Prompt for speech-recognition authorization
    async fn request_speech(&self) -> bool;
}

/// Resolves microphone and speech-recognition authorization, idempotently
pub struct PermissionGate {
    authority: Arc<dyn PermissionAuthority>,
}

impl PermissionGate {
    pub fn new(authority: Arc<dyn PermissionAuthority>) -> Self {
        Self { authority }
    }

    /// Returns true only if both microphone and speech permission are granted.
    ///
    /// Safe to call repeatedly; an already-denied microphone short-circuits
    /// without prompting.
    pub async fn authorize(&self) -> bool {
        match self.authority.microphone_status() {
            PermissionStatus::Denied => {
                warn!("microphone permission already denied, not prompting");
                return false;
            }
            PermissionStatus::Undetermined => {
                debug!("requesting microphone permission");
                if !self.authority.request_microphone().await {
                    warn!("microphone permission denied by user");
                    return false;
                }
            }
            PermissionStatus::Granted => {}
        }

        let granted = self.authority.request_speech().await;
        if !granted {
            warn!("speech recognition authorization denied");
        }
        granted
    }
}
