pub mod capture;
pub mod device;

pub use capture::{AudioCaptureSession, StreamHandle};
pub use device::{AudioFrame, AudioInputDevice};
