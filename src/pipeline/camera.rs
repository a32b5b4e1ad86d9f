#[cfg(feature = "camera-nokhwa")]
mod device;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};

use crate::{
    error::CaptureError,
    types::{CapturedImage, Frame, PhotoQuality},
};

#[cfg(feature = "camera-nokhwa")]
pub use self::device::{CameraDevice, NokhwaOpener, available_cameras};

// Consecutive frame-read failures tolerated before the stream gives up. A
// pending capture then fails; otherwise the device is reported gone.
const MAX_READ_FAILURES: u32 = 8;
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Opens a camera device. Called on the streaming thread, so the grabber
/// itself does not need to be `Send`.
pub trait CameraOpener: Send + Clone + 'static {
    type Grabber: FrameGrabber;

    fn open(&self, quality: PhotoQuality) -> Result<Self::Grabber>;
}

pub trait FrameGrabber {
    fn grab(&mut self) -> Result<Frame>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Capturing,
    Captured,
}

/// One live camera connection: preview frames while streaming, then at most
/// one still. The camera is owned by a background thread and released on
/// `stop`, after a capture, or on drop.
pub struct CaptureSession<O: CameraOpener> {
    opener: O,
    quality: PhotoQuality,
    state: SessionState,
    stop: Arc<AtomicBool>,
    capture_requested: Arc<AtomicBool>,
    preview_rx: Option<Receiver<Frame>>,
    capture_rx: Option<Receiver<Result<CapturedImage, CaptureError>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<O: CameraOpener> CaptureSession<O> {
    pub fn new(opener: O, quality: PhotoQuality) -> Self {
        CaptureSession {
            opener,
            quality,
            state: SessionState::Idle,
            stop: Arc::new(AtomicBool::new(false)),
            capture_requested: Arc::new(AtomicBool::new(false)),
            preview_rx: None,
            capture_rx: None,
            handle: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        match self.state {
            SessionState::Streaming | SessionState::Capturing => return Ok(()),
            SessionState::Captured => return Err(CaptureError::SessionFinished),
            SessionState::Idle => {}
        }

        // Fail fast before spawning the streaming thread.
        if let Err(err) = self.opener.open(self.quality) {
            log::error!("failed to open camera: {err:?}");
            return Err(CaptureError::DeviceUnavailable(format!("{err:#}")));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let capture_requested = Arc::new(AtomicBool::new(false));
        let (preview_tx, preview_rx) = bounded(1);
        let (capture_tx, capture_rx) = bounded(1);

        let worker = StreamWorker {
            opener: self.opener.clone(),
            quality: self.quality,
            stop: stop.clone(),
            capture_requested: capture_requested.clone(),
            preview_tx,
            capture_tx,
        };
        let handle = thread::spawn(move || worker.run());

        self.stop = stop;
        self.capture_requested = capture_requested;
        self.preview_rx = Some(preview_rx);
        self.capture_rx = Some(capture_rx);
        self.handle = Some(handle);
        self.state = SessionState::Streaming;
        log::info!("camera session streaming ({} quality)", self.quality.label());
        Ok(())
    }

    pub fn capture_photo(&mut self) -> Result<(), CaptureError> {
        match self.state {
            SessionState::Streaming => {
                self.capture_requested.store(true, Ordering::SeqCst);
                self.state = SessionState::Capturing;
                Ok(())
            }
            SessionState::Capturing => Err(CaptureError::Busy),
            SessionState::Captured => Err(CaptureError::SessionFinished),
            SessionState::Idle => Err(CaptureError::NotStreaming),
        }
    }

    pub fn poll_capture(&mut self) -> Option<Result<CapturedImage, CaptureError>> {
        if !matches!(
            self.state,
            SessionState::Streaming | SessionState::Capturing
        ) {
            return None;
        }
        let rx = self.capture_rx.as_ref()?;

        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) if self.state == SessionState::Capturing => Err(
                CaptureError::CaptureFailure("camera stream ended before the photo".into()),
            ),
            Err(TryRecvError::Disconnected) => Err(CaptureError::DeviceUnavailable(
                "camera stream ended unexpectedly".into(),
            )),
        };

        self.join_worker();
        self.preview_rx = None;
        self.capture_rx = None;
        self.state = match outcome {
            Ok(_) => SessionState::Captured,
            Err(_) => SessionState::Idle,
        };
        Some(outcome)
    }

    pub fn take_preview(&self) -> Option<Frame> {
        let rx = self.preview_rx.as_ref()?;
        let mut latest = None;
        while let Ok(frame) = rx.try_recv() {
            latest = Some(frame);
        }
        latest
    }

    /// Safe to call any number of times, including before `start`.
    pub fn stop(&mut self) {
        self.join_worker();
        self.preview_rx = None;
        self.capture_rx = None;
        if self.state != SessionState::Captured {
            self.state = SessionState::Idle;
        }
    }

    fn join_worker(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("camera thread panicked during shutdown");
            } else {
                log::debug!("camera session released");
            }
        }
    }
}

impl<O: CameraOpener> Drop for CaptureSession<O> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct StreamWorker<O: CameraOpener> {
    opener: O,
    quality: PhotoQuality,
    stop: Arc<AtomicBool>,
    capture_requested: Arc<AtomicBool>,
    preview_tx: Sender<Frame>,
    capture_tx: Sender<Result<CapturedImage, CaptureError>>,
}

impl<O: CameraOpener> StreamWorker<O> {
    fn run(self) {
        let mut grabber = match self.opener.open(self.quality) {
            Ok(grabber) => grabber,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                let _ = self
                    .capture_tx
                    .try_send(Err(CaptureError::DeviceUnavailable(format!("{err:#}"))));
                return;
            }
        };

        let mut read_failures = 0;
        while !self.stop.load(Ordering::Relaxed) {
            let capturing = self.capture_requested.load(Ordering::SeqCst);
            let frame = match grabber.grab() {
                Ok(frame) => {
                    read_failures = 0;
                    frame
                }
                Err(err) => {
                    log::warn!("camera frame read failed: {err:?}");
                    read_failures += 1;
                    if read_failures >= MAX_READ_FAILURES {
                        let reason = format!("{err:#}");
                        let outcome = if capturing {
                            CaptureError::CaptureFailure(reason)
                        } else {
                            CaptureError::DeviceUnavailable(reason)
                        };
                        let _ = self.capture_tx.try_send(Err(outcome));
                        return;
                    }
                    thread::sleep(READ_RETRY_DELAY);
                    continue;
                }
            };

            if capturing {
                log::info!("captured {}x{} still", frame.width, frame.height);
                let still = CapturedImage::new(frame, self.quality);
                let _ = self.capture_tx.try_send(Ok(still));
                // Single shot: the stream ends here and the camera is dropped.
                return;
            }

            // The UI only wants the newest frame; drop it if the slot is full.
            let _ = self.preview_tx.try_send(frame);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::AtomicUsize;

    use anyhow::anyhow;

    use super::*;

    #[derive(Clone)]
    pub(crate) struct FakeOpener {
        pub pixel: [u8; 4],
        pub size: (u32, u32),
        pub fail_open: bool,
        pub fail_reads: bool,
        pub opened: Arc<AtomicUsize>,
        pub released: Arc<AtomicUsize>,
    }

    impl FakeOpener {
        pub fn new(pixel: [u8; 4]) -> Self {
            FakeOpener {
                pixel,
                size: (6, 4),
                fail_open: false,
                fail_reads: false,
                opened: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    pub(crate) struct FakeGrabber {
        pixel: [u8; 4],
        size: (u32, u32),
        fail_reads: bool,
        released: Arc<AtomicUsize>,
    }

    impl CameraOpener for FakeOpener {
        type Grabber = FakeGrabber;

        fn open(&self, _quality: PhotoQuality) -> Result<FakeGrabber> {
            if self.fail_open {
                return Err(anyhow!("no camera attached"));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeGrabber {
                pixel: self.pixel,
                size: self.size,
                fail_reads: self.fail_reads,
                released: self.released.clone(),
            })
        }
    }

    impl FrameGrabber for FakeGrabber {
        fn grab(&mut self) -> Result<Frame> {
            thread::sleep(Duration::from_millis(2));
            if self.fail_reads {
                return Err(anyhow!("sensor timeout"));
            }
            Ok(Frame::filled(self.size.0, self.size.1, self.pixel))
        }
    }

    impl Drop for FakeGrabber {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::{testing::FakeOpener, *};

    fn wait_for_capture<O: CameraOpener>(
        session: &mut CaptureSession<O>,
    ) -> Result<CapturedImage, CaptureError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = session.poll_capture() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "capture never completed");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn stop_before_start_is_a_no_op() {
        let opener = FakeOpener::new([0, 0, 0, 255]);
        let mut session = CaptureSession::new(opener.clone(), PhotoQuality::Balanced);
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(opener.opened(), 0);
        assert_eq!(opener.released(), 0);
    }

    #[test]
    fn stop_is_idempotent_and_releases_once() {
        let opener = FakeOpener::new([0, 0, 0, 255]);
        let mut session = CaptureSession::new(opener.clone(), PhotoQuality::Balanced);
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Streaming);

        session.stop();
        session.stop();
        drop(session);

        assert_eq!(opener.opened(), opener.released());
        assert_eq!(opener.opened(), 2);
    }

    #[test]
    fn streams_preview_frames() {
        let opener = FakeOpener::new([9, 8, 7, 255]);
        let mut session = CaptureSession::new(opener, PhotoQuality::Speed);
        session.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let frame = loop {
            if let Some(frame) = session.take_preview() {
                break frame;
            }
            assert!(Instant::now() < deadline, "no preview frame arrived");
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(&frame.rgba[..4], &[9, 8, 7, 255]);
    }

    #[test]
    fn capture_delivers_one_still_and_ends_the_session() {
        let opener = FakeOpener::new([40, 50, 60, 255]);
        let mut session = CaptureSession::new(opener.clone(), PhotoQuality::Quality);
        session.start().unwrap();
        session.capture_photo().unwrap();
        assert_eq!(session.state(), SessionState::Capturing);
        assert_eq!(session.capture_photo(), Err(CaptureError::Busy));

        let still = wait_for_capture(&mut session).unwrap();
        assert_eq!(still.quality(), PhotoQuality::Quality);
        assert_eq!(&still.frame().rgba[..4], &[40, 50, 60, 255]);
        assert_eq!(session.state(), SessionState::Captured);

        assert!(session.poll_capture().is_none());
        assert_eq!(session.start(), Err(CaptureError::SessionFinished));
        assert_eq!(session.capture_photo(), Err(CaptureError::SessionFinished));

        session.stop();
        assert_eq!(session.state(), SessionState::Captured);
        assert_eq!(opener.opened(), opener.released());
    }

    #[test]
    fn capture_requires_a_running_stream() {
        let opener = FakeOpener::new([0, 0, 0, 255]);
        let mut session = CaptureSession::new(opener, PhotoQuality::Balanced);
        assert_eq!(session.capture_photo(), Err(CaptureError::NotStreaming));
    }

    #[test]
    fn missing_camera_is_reported_as_unavailable() {
        let mut opener = FakeOpener::new([0, 0, 0, 255]);
        opener.fail_open = true;
        let mut session = CaptureSession::new(opener, PhotoQuality::Balanced);

        let err = session.start().unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn dead_stream_is_reported_without_a_capture() {
        let mut opener = FakeOpener::new([0, 0, 0, 255]);
        opener.fail_reads = true;
        let mut session = CaptureSession::new(opener.clone(), PhotoQuality::Balanced);
        session.start().unwrap();

        let err = wait_for_capture(&mut session).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.take_preview().is_none());
        assert_eq!(opener.opened(), opener.released());
    }

    #[test]
    fn repeated_read_errors_fail_the_capture() {
        let mut opener = FakeOpener::new([0, 0, 0, 255]);
        opener.fail_reads = true;
        let mut session = CaptureSession::new(opener.clone(), PhotoQuality::Balanced);
        session.start().unwrap();
        session.capture_photo().unwrap();

        let err = wait_for_capture(&mut session).unwrap_err();
        assert!(matches!(err, CaptureError::CaptureFailure(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(opener.opened(), opener.released());
    }
}
