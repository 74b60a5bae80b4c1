use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::device::{AudioFrame, AudioInputDevice};
use crate::config::AudioCaptureConfig;
use crate::error::AudioError;

/// Capacity of the tap-to-engine frame channel. At ~100ms buffers this is
/// several seconds of backlog before the producer is backpressured.
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Handle to an acquired, running audio stream
pub struct StreamHandle {
    /// Captured audio buffers, fed from the device tap
    pub frames: mpsc::Receiver<AudioFrame>,
    /// Device availability; flips to `false` if the device goes away
    pub availability: watch::Receiver<bool>,
}

/// Owns the audio input stream: configures the device, installs the data tap,
/// and starts/stops the engine with symmetric acquire/release.
pub struct AudioCaptureSession {
    device: Box<dyn AudioInputDevice>,
    config: AudioCaptureConfig,
    tap_installed: bool,
    acquired: bool,
    /// True between a successful configure and the matching deactivate
    active: bool,
}

impl AudioCaptureSession {
    pub fn new(device: Box<dyn AudioInputDevice>, config: AudioCaptureConfig) -> Self {
        Self {
            device,
            config,
            tap_installed: false,
            acquired: false,
            active: false,
        }
    }

    /// Configure the device, install the data tap, and start the stream.
    ///
    /// Calling `acquire` while already acquired fails with
    /// `AudioError::AlreadyAcquired` and has no side effects. If tap
    /// installation succeeds but the stream fails to start, release semantics
    /// are applied before the error is returned, so no partial acquisition is
    /// ever observable.
    pub async fn acquire(&mut self) -> Result<StreamHandle, AudioError> {
        if self.acquired {
            return Err(AudioError::AlreadyAcquired);
        }

        self.device
            .configure(&self.config)
            .map_err(|e| AudioError::Configure(e.to_string()))?;
        self.active = true;

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        if let Err(e) = self.device.install_tap(self.config.buffer_size, tx) {
            self.release().await;
            return Err(AudioError::Configure(e.to_string()));
        }
        self.tap_installed = true;

        if let Err(e) = self.device.start().await {
            self.release().await;
            return Err(AudioError::StreamStart(e.to_string()));
        }

        self.acquired = true;
        info!(
            "audio capture acquired ({}Hz, {} channels)",
            self.config.sample_rate, self.config.channels
        );

        Ok(StreamHandle {
            frames: rx,
            availability: self.device.availability(),
        })
    }

    /// Tear down whatever was acquired. Idempotent: the tap is removed only if
    /// installed, the stream stopped only if running, and deactivation errors
    /// are logged and swallowed. Safe to call any number of times.
    pub async fn release(&mut self) {
        if self.tap_installed {
            self.device.remove_tap();
            self.tap_installed = false;
        }

        if self.device.is_running() {
            self.device.stop().await;
        }

        if self.active {
            if let Err(e) = self.device.deactivate() {
                warn!("failed to deactivate audio device session: {:#}", e);
            }
            self.active = false;
        }

        if self.acquired {
            info!("audio capture released");
        }
        self.acquired = false;
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        configures: AtomicUsize,
        tap_installs: AtomicUsize,
        tap_removals: AtomicUsize,
        starts: AtomicUsize,
        stops: AtomicUsize,
        deactivations: AtomicUsize,
    }

    struct FakeDevice {
        counters: Arc<Counters>,
        running: AtomicBool,
        fail_configure: bool,
        fail_start: bool,
        availability: watch::Sender<bool>,
    }

    impl FakeDevice {
        fn new(fail_configure: bool, fail_start: bool) -> (Box<Self>, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            let (availability, _) = watch::channel(true);
            let device = Box::new(Self {
                counters: counters.clone(),
                running: AtomicBool::new(false),
                fail_configure,
                fail_start,
                availability,
            });
            (device, counters)
        }
    }

    #[async_trait::async_trait]
    impl AudioInputDevice for FakeDevice {
        fn configure(&mut self, _config: &AudioCaptureConfig) -> anyhow::Result<()> {
            self.counters.configures.fetch_add(1, Ordering::SeqCst);
            if self.fail_configure {
                bail!("device busy");
            }
            Ok(())
        }

        fn install_tap(
            &mut self,
            _buffer_size: usize,
            _frames: mpsc::Sender<AudioFrame>,
        ) -> anyhow::Result<()> {
            self.counters.tap_installs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn remove_tap(&mut self) {
            self.counters.tap_removals.fetch_add(1, Ordering::SeqCst);
        }

        async fn start(&mut self) -> anyhow::Result<()> {
            self.counters.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                bail!("stream refused to start");
            }
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&mut self) {
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn deactivate(&mut self) -> anyhow::Result<()> {
            self.counters.deactivations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn availability(&self) -> watch::Receiver<bool> {
            self.availability.subscribe()
        }
    }

    #[tokio::test]
    async fn acquire_release_is_symmetric() {
        let (device, counters) = FakeDevice::new(false, false);
        let mut capture = AudioCaptureSession::new(device, AudioCaptureConfig::default());

        let handle = capture.acquire().await.expect("acquire should succeed");
        assert!(capture.is_acquired());
        drop(handle);

        capture.release().await;
        assert!(!capture.is_acquired());
        assert_eq!(counters.tap_installs.load(Ordering::SeqCst), 1);
        assert_eq!(counters.tap_removals.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert_eq!(counters.deactivations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn double_acquire_is_rejected() {
        let (device, counters) = FakeDevice::new(false, false);
        let mut capture = AudioCaptureSession::new(device, AudioCaptureConfig::default());

        let _handle = capture.acquire().await.expect("first acquire");
        let err = capture.acquire().await.err().expect("second acquire fails");
        assert!(matches!(err, AudioError::AlreadyAcquired));
        assert_eq!(counters.tap_installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let (device, counters) = FakeDevice::new(false, false);
        let mut capture = AudioCaptureSession::new(device, AudioCaptureConfig::default());

        capture.release().await;
        let _handle = capture.acquire().await.expect("acquire");
        capture.release().await;
        capture.release().await;

        assert_eq!(counters.tap_removals.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert_eq!(counters.deactivations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn configure_failure_leaves_nothing_acquired() {
        let (device, counters) = FakeDevice::new(true, false);
        let mut capture = AudioCaptureSession::new(device, AudioCaptureConfig::default());

        let err = capture.acquire().await.err().expect("configure fails");
        assert!(matches!(err, AudioError::Configure(_)));
        assert!(!capture.is_acquired());
        assert_eq!(counters.tap_installs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_failure_rolls_back_the_tap() {
        let (device, counters) = FakeDevice::new(false, true);
        let mut capture = AudioCaptureSession::new(device, AudioCaptureConfig::default());

        let err = capture.acquire().await.err().expect("start fails");
        assert!(matches!(err, AudioError::StreamStart(_)));
        assert!(!capture.is_acquired());
        assert_eq!(counters.tap_installs.load(Ordering::SeqCst), 1);
        assert_eq!(counters.tap_removals.load(Ordering::SeqCst), 1);
        assert_eq!(counters.deactivations.load(Ordering::SeqCst), 1);
    }
}
