pub mod channel;
pub mod engine;

pub use channel::{TerminalEvent, TranscriptionChannel};
pub use engine::{RecognitionControl, RecognitionEvent, RecognitionStream, SpeechEngine};
