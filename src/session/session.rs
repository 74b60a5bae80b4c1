use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::awaiter::FinalResultAwaiter;
use super::state::SessionState;
use super::stats::SessionStats;
use crate::audio::{AudioCaptureSession, AudioInputDevice, StreamHandle};
use crate::config::SessionConfig;
use crate::error::SessionErrorKind;
use crate::permission::{PermissionAuthority, PermissionGate};
use crate::transcribe::{SpeechEngine, TerminalEvent, TranscriptionChannel};

/// Inbound events marshalled onto the session's serialized interior
struct SessionEvent {
    epoch: u64,
    kind: SessionEventKind,
}

enum SessionEventKind {
    Terminal(TerminalEvent),
    DeviceUnavailable,
}

/// Ephemeral per-attempt record. Created at `start`, destroyed on every exit
/// path; nothing outlives one session.
struct ActiveRecording {
    epoch: u64,
    started_instant: Instant,
    started_at: DateTime<Utc>,
    channel: TranscriptionChannel,
    awaiter: FinalResultAwaiter,
    /// Terminal forwarder, availability watcher, and elapsed ticker
    tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    state: SessionState,
    /// Bumped at every session boundary; events carrying an older epoch are
    /// stale and ignored. This is how `cancel` always wins a race against an
    /// in-flight `stop`.
    epoch: u64,
    capture: AudioCaptureSession,
    recording: Option<ActiveRecording>,
}

struct Shared {
    config: SessionConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionState>,
    transitions: broadcast::Sender<SessionState>,
    elapsed_tx: watch::Sender<Duration>,
}

impl Shared {
    fn set_state(&self, inner: &mut Inner, state: SessionState) {
        if inner.state != state {
            info!("session state: {} -> {}", inner.state.label(), state.label());
        }
        inner.state = state.clone();
        self.state_tx.send_replace(state.clone());
        let _ = self.transitions.send(state);
    }

    /// Tear down every acquired resource. Safe on every exit path: resolves
    /// any pending completion with `None` so a suspended `stop()` never
    /// hangs, cancels the recognition attempt, and releases the audio stream.
    async fn teardown(&self, inner: &mut Inner) {
        inner.epoch = inner.epoch.wrapping_add(1);

        if let Some(rec) = inner.recording.take() {
            rec.awaiter.resolve(None);
            rec.channel.cancel();
            for task in rec.tasks {
                task.abort();
            }
        }

        inner.capture.release().await;
        self.elapsed_tx.send_replace(Duration::ZERO);
    }

    /// Surface an error state and schedule the auto-reset back to idle.
    fn fail(shared: &Arc<Shared>, inner: &mut Inner, kind: SessionErrorKind) {
        warn!("capture session error: {kind}");
        inner.epoch = inner.epoch.wrapping_add(1);
        let epoch = inner.epoch;
        shared.set_state(inner, SessionState::Error(kind));

        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            tokio::time::sleep(shared.config.error_reset).await;
            let mut inner = shared.inner.lock().await;
            if inner.epoch == epoch && matches!(inner.state, SessionState::Error(_)) {
                shared.set_state(&mut inner, SessionState::Idle);
            }
        });
    }
}

/// The capture/transcription session state machine.
///
/// Sequences permission acquisition, the audio-device tap lifecycle, and the
/// speech engine under a single serialized interior, and publishes every state
/// transition. Public operations are safe to call in any state: out-of-place
/// calls are rejected without effect rather than failing.
pub struct CaptureSession {
    shared: Arc<Shared>,
    gate: PermissionGate,
    engine: Arc<dyn SpeechEngine>,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl CaptureSession {
    /// Create a session over the given collaborators and spawn its event pump.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: SessionConfig,
        authority: Arc<dyn PermissionAuthority>,
        device: Box<dyn AudioInputDevice>,
        engine: Arc<dyn SpeechEngine>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let (transitions, _) = broadcast::channel(64);
        let (elapsed_tx, _) = watch::channel(Duration::ZERO);
        let (events_tx, events_rx) = mpsc::channel(16);

        let audio = config.audio.clone();
        let shared = Arc::new(Shared {
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                epoch: 0,
                capture: AudioCaptureSession::new(device, audio),
                recording: None,
            }),
            state_tx,
            transitions,
            elapsed_tx,
        });

        tokio::spawn(event_pump(Arc::clone(&shared), events_rx));

        Self {
            shared,
            gate: PermissionGate::new(authority),
            engine,
            events_tx,
        }
    }

    /// Begin a capture attempt: resolve permissions, acquire the audio stream,
    /// and start recognition. Rejected without effect unless the session is
    /// idle.
    pub async fn start(&self) {
        let start_epoch = {
            let mut inner = self.shared.inner.lock().await;
            if !inner.state.is_idle() {
                debug!("start ignored: session is {}", inner.state.label());
                return;
            }

            if !self.engine.is_available() {
                Shared::fail(&self.shared, &mut inner, SessionErrorKind::Unavailable);
                return;
            }

            inner.epoch = inner.epoch.wrapping_add(1);
            self.shared
                .set_state(&mut inner, SessionState::RequestingPermission);
            inner.epoch
        };

        // Suspension point: the OS permission prompt.
        let granted = self.gate.authorize().await;

        let mut inner = self.shared.inner.lock().await;
        // A cancel or restart may have raced the permission prompt.
        if inner.epoch != start_epoch || inner.state != SessionState::RequestingPermission {
            debug!("start abandoned: session changed while awaiting permission");
            return;
        }

        if !granted {
            Shared::fail(&self.shared, &mut inner, SessionErrorKind::PermissionDenied);
            return;
        }

        let StreamHandle {
            frames,
            mut availability,
        } = match inner.capture.acquire().await {
            Ok(stream) => stream,
            Err(e) => {
                Shared::fail(
                    &self.shared,
                    &mut inner,
                    SessionErrorKind::AudioDevice(e.to_string()),
                );
                return;
            }
        };

        let mut channel = match TranscriptionChannel::begin(self.engine.as_ref(), frames).await {
            Ok(channel) => channel,
            Err(e) => {
                inner.capture.release().await;
                Shared::fail(&self.shared, &mut inner, e.into());
                return;
            }
        };

        let epoch = start_epoch;
        let awaiter = FinalResultAwaiter::new();
        let started_instant = Instant::now();
        let mut tasks = Vec::with_capacity(3);

        // Forward the engine's terminal event onto the serialized interior.
        if let Some(mut terminal) = channel.take_terminal() {
            let events = self.events_tx.clone();
            tasks.push(tokio::spawn(async move {
                if let Some(event) = terminal.recv().await {
                    let _ = events
                        .send(SessionEvent {
                            epoch,
                            kind: SessionEventKind::Terminal(event),
                        })
                        .await;
                }
            }));
        }

        // Watch device availability for the lifetime of this attempt.
        {
            let events = self.events_tx.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    if !*availability.borrow_and_update() {
                        let _ = events
                            .send(SessionEvent {
                                epoch,
                                kind: SessionEventKind::DeviceUnavailable,
                            })
                            .await;
                        break;
                    }
                    if availability.changed().await.is_err() {
                        break;
                    }
                }
            }));
        }

        // Elapsed-duration tick while recording.
        {
            let shared = Arc::clone(&self.shared);
            let tick = self.shared.config.tick_interval;
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(tick).await;
                    {
                        let inner = shared.inner.lock().await;
                        if inner.epoch != epoch || inner.state != SessionState::Recording {
                            break;
                        }
                    }
                    shared.elapsed_tx.send_replace(started_instant.elapsed());
                }
            }));
        }

        inner.recording = Some(ActiveRecording {
            epoch,
            started_instant,
            started_at: Utc::now(),
            channel,
            awaiter,
            tasks,
        });
        self.shared.set_state(&mut inner, SessionState::Recording);
        info!("recording started (session {})", self.shared.config.session_id);
    }

    /// Stop capturing and wait (bounded) for the final transcript.
    ///
    /// Releases the audio side immediately, signals end-of-audio to the
    /// engine, and suspends until the final result arrives, the timeout
    /// elapses, or a cancel unblocks the wait. Returns the transcript, or
    /// `None` when there is none; never returns before all hardware resources
    /// are released. Calling `stop` while not recording is a no-op returning
    /// `None` immediately.
    pub async fn stop(&self) -> Option<String> {
        let (awaiter, epoch) = {
            let mut inner = self.shared.inner.lock().await;
            if inner.state != SessionState::Recording {
                debug!("stop ignored: session is {}", inner.state.label());
                return None;
            }

            let epoch = {
                let Inner {
                    capture, recording, ..
                } = &mut *inner;
                let rec = match recording.as_mut() {
                    Some(rec) => rec,
                    None => return None,
                };

                // Audio side only; the engine keeps the buffers it already has.
                capture.release().await;
                rec.channel.end_of_audio();
                rec.epoch
            };

            let awaiter = match inner.recording.as_ref() {
                Some(rec) => rec.awaiter.clone(),
                None => return None,
            };
            self.shared.set_state(&mut inner, SessionState::Processing);
            (awaiter, epoch)
        };

        let result = awaiter.wait(self.shared.config.final_result_timeout).await;

        let mut inner = self.shared.inner.lock().await;
        if inner.epoch != epoch {
            // A cancel (or failure teardown) won the race; no transcript is
            // delivered even if one arrived.
            return None;
        }

        self.shared.teardown(&mut inner).await;
        if inner.state == SessionState::Processing {
            match &result {
                Some(text) => {
                    self.shared
                        .set_state(&mut inner, SessionState::Completed(text.clone()));
                    self.shared.set_state(&mut inner, SessionState::Idle);
                }
                None => {
                    debug!("stop completed without a transcript");
                    self.shared.set_state(&mut inner, SessionState::Idle);
                }
            }
        }
        result
    }

    /// Cancel the session from any state: tear down all resources, discard
    /// any in-flight result, and return to idle. A no-op when already idle.
    pub async fn cancel(&self) {
        let mut inner = self.shared.inner.lock().await;
        if inner.state.is_idle() && inner.recording.is_none() {
            debug!("cancel ignored: session already idle");
            return;
        }

        info!("cancelling capture session");
        self.shared.teardown(&mut inner).await;
        self.shared.set_state(&mut inner, SessionState::Idle);
    }

    /// Cancel, pause briefly, and start a fresh attempt.
    pub async fn restart(&self) {
        self.cancel().await;
        tokio::time::sleep(self.shared.config.restart_delay).await;
        self.start().await;
    }

    /// Current-state observable (coalescing; always holds the latest state)
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Transition feed; every state change is delivered in order
    pub fn transitions(&self) -> broadcast::Receiver<SessionState> {
        self.shared.transitions.subscribe()
    }

    /// Elapsed recording duration, updated at the configured tick cadence
    pub fn elapsed(&self) -> watch::Receiver<Duration> {
        self.shared.elapsed_tx.subscribe()
    }

    pub async fn current_state(&self) -> SessionState {
        self.shared.inner.lock().await.state.clone()
    }

    /// Snapshot of the session for downstream consumers
    pub async fn stats(&self) -> SessionStats {
        let inner = self.shared.inner.lock().await;
        SessionStats {
            session_id: self.shared.config.session_id.clone(),
            state: inner.state.label().to_string(),
            started_at: inner.recording.as_ref().map(|rec| rec.started_at),
            elapsed_secs: inner
                .recording
                .as_ref()
                .map(|rec| rec.started_instant.elapsed().as_secs_f64())
                .unwrap_or(0.0),
        }
    }
}

/// Marshals off-executor events (recognition terminal events, availability
/// changes) onto the serialized session interior, in arrival order.
async fn event_pump(shared: Arc<Shared>, mut events: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        let mut inner = shared.inner.lock().await;

        if inner.epoch != event.epoch {
            debug!("discarding stale session event");
            continue;
        }

        match event.kind {
            SessionEventKind::Terminal(TerminalEvent::Final(text)) => match inner.state.clone() {
                SessionState::Processing => {
                    // Resolve the outstanding stop() wait.
                    if let Some(rec) = inner.recording.as_ref() {
                        rec.awaiter.resolve(Some(text));
                    }
                }
                SessionState::Recording => {
                    // The engine finished on its own before stop() was called.
                    info!("final result delivered while still recording");
                    shared.teardown(&mut inner).await;
                    shared.set_state(&mut inner, SessionState::Completed(text));
                    shared.set_state(&mut inner, SessionState::Idle);
                }
                _ => {}
            },
            SessionEventKind::Terminal(TerminalEvent::Cancelled) => {
                // Cancellation-originated termination is not an error.
                if let Some(rec) = inner.recording.as_ref() {
                    rec.awaiter.resolve(None);
                }
                if inner.state == SessionState::Recording {
                    shared.teardown(&mut inner).await;
                    shared.set_state(&mut inner, SessionState::Idle);
                }
            }
            SessionEventKind::Terminal(TerminalEvent::Failed(detail)) => {
                shared.teardown(&mut inner).await;
                Shared::fail(&shared, &mut inner, SessionErrorKind::Recognition(detail));
            }
            SessionEventKind::DeviceUnavailable => {
                if inner.state != SessionState::Recording {
                    continue;
                }
                shared.teardown(&mut inner).await;
                Shared::fail(&shared, &mut inner, SessionErrorKind::Unavailable);
            }
        }
    }
}
