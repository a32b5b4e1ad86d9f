use std::sync::Arc;

use crate::{
    error::{CaptureError, FailureKind},
    pipeline::{CameraOpener, CaptureSession, PendingPrediction, SessionState, StylePipeline},
    pipeline::stylizer::PredictionOutcome,
    types::{CaptureId, CapturedImage, Frame, PhotoQuality, StylizedImage},
};

#[derive(Clone, Debug)]
pub enum DisplayState {
    AwaitingCapture,
    Predicting,
    Displaying(Arc<StylizedImage>),
    Failed(FailureKind),
}

impl DisplayState {
    pub fn label(&self) -> &'static str {
        match self {
            DisplayState::AwaitingCapture => "awaiting capture",
            DisplayState::Predicting => "predicting",
            DisplayState::Displaying(_) => "displaying",
            DisplayState::Failed(_) => "failed",
        }
    }
}

pub struct SessionController<O: CameraOpener> {
    opener: O,
    quality: PhotoQuality,
    pipeline: StylePipeline,
    capture: Option<CaptureSession<O>>,
    captured: Option<Arc<CapturedImage>>,
    current: Option<CaptureId>,
    next_id: CaptureId,
    in_flight: Vec<PendingPrediction>,
    state: DisplayState,
}

impl<O: CameraOpener> SessionController<O> {
    pub fn new(opener: O, quality: PhotoQuality, pipeline: StylePipeline) -> Self {
        SessionController {
            opener,
            quality,
            pipeline,
            capture: None,
            captured: None,
            current: None,
            next_id: CaptureId::first(),
            in_flight: Vec::new(),
            state: DisplayState::AwaitingCapture,
        }
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn captured(&self) -> Option<&Arc<CapturedImage>> {
        self.captured.as_ref()
    }

    pub fn camera_running(&self) -> bool {
        self.capture.as_ref().is_some_and(|session| {
            matches!(
                session.state(),
                SessionState::Streaming | SessionState::Capturing
            )
        })
    }

    pub fn is_busy(&self) -> bool {
        let capturing = self
            .capture
            .as_ref()
            .is_some_and(|session| session.state() == SessionState::Capturing);
        capturing || matches!(self.state, DisplayState::Predicting)
    }

    pub fn open_camera(&mut self) {
        self.capture = None;

        let mut session = CaptureSession::new(self.opener.clone(), self.quality);
        match session.start() {
            Ok(()) => {
                self.capture = Some(session);
                self.state = DisplayState::AwaitingCapture;
            }
            Err(err) => {
                log::error!("camera unavailable: {err}");
                self.state = DisplayState::Failed(err.kind());
            }
        }
    }

    pub fn take_photo(&mut self) -> bool {
        if !matches!(self.state, DisplayState::AwaitingCapture) {
            log::debug!("ignoring take photo while {}", self.state.label());
            return false;
        }
        let Some(session) = self.capture.as_mut() else {
            log::debug!("ignoring take photo without a camera session");
            return false;
        };

        match session.capture_photo() {
            Ok(()) => {
                log::info!("capturing photo");
                true
            }
            Err(CaptureError::Busy) => false,
            Err(err) => {
                log::warn!("cannot capture photo: {err}");
                false
            }
        }
    }

    pub fn take_preview(&mut self) -> Option<Frame> {
        self.capture.as_ref()?.take_preview()
    }

    pub fn poll(&mut self) {
        if let Some(outcome) = self.capture.as_mut().and_then(|session| session.poll_capture()) {
            match outcome {
                Ok(still) => {
                    self.submit_capture(still);
                }
                Err(err) => {
                    log::warn!("photo capture failed: {err}");
                    self.state = DisplayState::Failed(err.kind());
                }
            }
        }

        let mut settled = Vec::new();
        self.in_flight.retain_mut(|pending| match pending.try_take() {
            Some(outcome) => {
                settled.push((pending.capture_id(), outcome));
                false
            }
            None => true,
        });
        for (capture_id, outcome) in settled {
            self.apply_outcome(capture_id, outcome);
        }
    }

    /// Makes `still` the current capture and starts styling it. Any result
    /// still pending for an older capture becomes stale.
    pub(crate) fn submit_capture(&mut self, still: CapturedImage) -> CaptureId {
        let capture_id = self.next_id;
        self.next_id = capture_id.next();

        let still = Arc::new(still);
        self.captured = Some(still.clone());
        self.current = Some(capture_id);
        self.state = DisplayState::Predicting;

        log::info!("styling capture {capture_id}");
        self.in_flight.push(self.pipeline.predict(capture_id, still));
        capture_id
    }

    fn apply_outcome(&mut self, capture_id: CaptureId, outcome: PredictionOutcome) {
        let is_current = self.current == Some(capture_id)
            && matches!(self.state, DisplayState::Predicting);
        if !is_current {
            log::debug!("discarding stale result for capture {capture_id}");
            return;
        }

        self.state = match outcome {
            Ok(image) => DisplayState::Displaying(Arc::new(image)),
            Err(err) => {
                log::warn!("no stylized image for capture {capture_id}: {err}");
                DisplayState::Failed(err.kind())
            }
        };
    }

    pub fn retake(&mut self) {
        log::info!("retaking photo");
        self.captured = None;
        self.current = None;
        self.state = DisplayState::AwaitingCapture;
        self.open_camera();
    }

    pub fn close(&mut self) {
        if let Some(mut session) = self.capture.take() {
            session.stop();
        }
        self.captured = None;
        self.current = None;
        self.state = DisplayState::AwaitingCapture;
    }
}
