use tokio::sync::mpsc;
use tracing::{debug, info};

use super::engine::{RecognitionControl, RecognitionEvent, SpeechEngine};
use crate::audio::AudioFrame;
use crate::error::EngineError;

/// The single terminal notification ending a recognition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// The engine delivered a final transcript
    Final(String),
    /// The attempt ended because it was cancelled; not an error
    Cancelled,
    /// Genuine recognition failure
    Failed(String),
}

/// Wraps one recognition attempt against the speech engine.
///
/// Interim results are discarded (live partial transcription is intentionally
/// disabled); only the terminal event is surfaced, exactly once, through the
/// receiver returned by [`TranscriptionChannel::take_terminal`].
pub struct TranscriptionChannel {
    control: Box<dyn RecognitionControl>,
    terminal: Option<mpsc::Receiver<TerminalEvent>>,
}

impl TranscriptionChannel {
    /// Submit the audio stream to the engine and start pumping its events.
    pub async fn begin(
        engine: &dyn SpeechEngine,
        frames: mpsc::Receiver<AudioFrame>,
    ) -> Result<Self, EngineError> {
        let stream = engine.begin(frames).await?;
        let super::engine::RecognitionStream { mut events, control } = stream;

        let (terminal_tx, terminal_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let terminal = match event {
                    RecognitionEvent::Interim(text) => {
                        debug!("discarding interim result ({} chars)", text.len());
                        continue;
                    }
                    RecognitionEvent::Final(text) => TerminalEvent::Final(text),
                    RecognitionEvent::Cancelled => TerminalEvent::Cancelled,
                    RecognitionEvent::Failed(detail) => TerminalEvent::Failed(detail),
                };

                // One terminal event per attempt; anything after it is stale.
                let _ = terminal_tx.send(terminal).await;
                break;
            }
        });

        info!("recognition attempt started");

        Ok(Self {
            control,
            terminal: Some(terminal_rx),
        })
    }

    /// Take the terminal-event receiver. Yields a value at most once.
    pub fn take_terminal(&mut self) -> Option<mpsc::Receiver<TerminalEvent>> {
        self.terminal.take()
    }

    /// Signal that no more audio will be appended
    pub fn end_of_audio(&self) {
        self.control.end_of_audio();
    }

    /// Request immediate termination of the attempt
    pub fn cancel(&self) {
        self.control.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::engine::RecognitionStream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NoopControl {
        cancels: Arc<AtomicUsize>,
    }

    impl RecognitionControl for NoopControl {
        fn end_of_audio(&self) {}

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedEngine {
        events: Vec<RecognitionEvent>,
        cancels: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl SpeechEngine for ScriptedEngine {
        fn is_available(&self) -> bool {
            true
        }

        async fn begin(
            &self,
            _frames: mpsc::Receiver<AudioFrame>,
        ) -> Result<RecognitionStream, EngineError> {
            let (tx, rx) = mpsc::channel(8);
            for event in &self.events {
                tx.send(event.clone()).await.ok();
            }
            Ok(RecognitionStream {
                events: rx,
                control: Box::new(NoopControl {
                    cancels: self.cancels.clone(),
                }),
            })
        }
    }

    #[tokio::test]
    async fn interim_results_are_discarded() {
        let engine = ScriptedEngine {
            events: vec![
                RecognitionEvent::Interim("hel".into()),
                RecognitionEvent::Interim("hello wor".into()),
                RecognitionEvent::Final("hello world".into()),
            ],
            cancels: Arc::new(AtomicUsize::new(0)),
        };

        let (_tx, frames) = mpsc::channel(1);
        let mut channel = TranscriptionChannel::begin(&engine, frames).await.unwrap();
        let mut terminal = channel.take_terminal().expect("terminal receiver");

        assert_eq!(
            terminal.recv().await,
            Some(TerminalEvent::Final("hello world".into()))
        );
        // The pump stops after the terminal event; the channel closes.
        assert_eq!(terminal.recv().await, None);
    }

    #[tokio::test]
    async fn only_the_first_terminal_event_is_forwarded() {
        let engine = ScriptedEngine {
            events: vec![
                RecognitionEvent::Cancelled,
                RecognitionEvent::Final("late".into()),
            ],
            cancels: Arc::new(AtomicUsize::new(0)),
        };

        let (_tx, frames) = mpsc::channel(1);
        let mut channel = TranscriptionChannel::begin(&engine, frames).await.unwrap();
        let mut terminal = channel.take_terminal().expect("terminal receiver");

        assert_eq!(terminal.recv().await, Some(TerminalEvent::Cancelled));
        assert_eq!(terminal.recv().await, None);
    }

    #[tokio::test]
    async fn cancel_delegates_to_the_engine_control() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let engine = ScriptedEngine {
            events: vec![],
            cancels: cancels.clone(),
        };

        let (_tx, frames) = mpsc::channel(1);
        let channel = TranscriptionChannel::begin(&engine, frames).await.unwrap();
        channel.cancel();
        channel.cancel();

        assert_eq!(cancels.load(Ordering::SeqCst), 2);
    }
}
