mod ort;

use std::{sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use ndarray::Array4;

use super::codec::{self, OutputTensor, PixelBuffer};
use crate::{
    config::AppConfig,
    error::InferenceError,
    model_download::ensure_style_model_ready,
    types::{CaptureId, CapturedImage, SensorOrientation, StylizedImage},
};

pub use self::ort::OrtStyleEngine;

pub type PredictionOutcome = Result<StylizedImage, InferenceError>;

/// A loaded style-transfer model. `run` is a single blocking call; the
/// pipeline reads only the first entry of what it returns.
pub(crate) trait StyleEngine: Send + 'static {
    fn run(&mut self, input: Array4<f32>) -> anyhow::Result<Vec<OutputTensor>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineOptions {
    pub input_size: u32,
    pub orientation: SensorOrientation,
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        PipelineOptions {
            input_size: config.input_size,
            orientation: config.orientation,
        }
    }
}

struct InferenceRequest {
    capture_id: CaptureId,
    image: Arc<CapturedImage>,
    reply: Sender<PredictionOutcome>,
}

/// Runs one style model on a dedicated worker thread. The worker provisions
/// and loads the model once; if that fails every prediction is answered with
/// `ModelUnavailable`.
pub struct StylePipeline {
    request_tx: Option<Sender<InferenceRequest>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StylePipeline {
    pub fn load(config: &AppConfig) -> Self {
        let options = PipelineOptions::from(config);
        let model_path = config.model_path.clone();
        let model_url = config.model_url.clone();
        let intra_threads = config.intra_threads;

        Self::spawn(options, move || {
            ensure_style_model_ready(&model_path, model_url.as_deref(), |evt| {
                log::debug!("style model provisioning: {evt:?}")
            })?;
            let engine = OrtStyleEngine::new(&model_path, intra_threads)?;
            log::info!("style model ready using {}", model_path.display());
            Ok(engine)
        })
    }

    pub(crate) fn with_engine<E: StyleEngine>(engine: E, options: PipelineOptions) -> Self {
        Self::spawn(options, move || Ok(engine))
    }

    fn spawn<E, F>(options: PipelineOptions, init: F) -> Self
    where
        E: StyleEngine,
        F: FnOnce() -> anyhow::Result<E> + Send + 'static,
    {
        let (request_tx, request_rx) = unbounded();
        let handle = thread::spawn(move || {
            let engine = match init() {
                Ok(engine) => Some(engine),
                Err(err) => {
                    log::error!("failed to load style model: {err:?}");
                    None
                }
            };
            run_worker_loop(engine, request_rx, options);
        });

        StylePipeline {
            request_tx: Some(request_tx),
            handle: Some(handle),
        }
    }

    #[cfg(test)]
    pub(crate) fn unavailable() -> Self {
        StylePipeline {
            request_tx: None,
            handle: None,
        }
    }

    pub fn predict(&self, capture_id: CaptureId, image: Arc<CapturedImage>) -> PendingPrediction {
        let (reply, reply_rx) = bounded(1);
        let pending = PendingPrediction {
            capture_id,
            reply_rx,
            settled: false,
        };

        let Some(request_tx) = self.request_tx.as_ref() else {
            log::warn!("no style model loaded, rejecting capture {capture_id}");
            let _ = reply.send(Err(InferenceError::ModelUnavailable));
            return pending;
        };

        let request = InferenceRequest {
            capture_id,
            image,
            reply,
        };
        if let Err(err) = request_tx.send(request) {
            log::error!("style worker is gone, rejecting capture {capture_id}");
            let _ = err.into_inner().reply.send(Err(InferenceError::ModelUnavailable));
        }
        pending
    }
}

impl Drop for StylePipeline {
    fn drop(&mut self) {
        // Closing the queue lets the worker finish whatever it is running.
        self.request_tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("style worker panicked");
            }
        }
    }
}

/// Handle for one in-flight prediction. Yields its outcome exactly once.
pub struct PendingPrediction {
    capture_id: CaptureId,
    reply_rx: Receiver<PredictionOutcome>,
    settled: bool,
}

impl PendingPrediction {
    pub fn capture_id(&self) -> CaptureId {
        self.capture_id
    }

    pub fn try_take(&mut self) -> Option<PredictionOutcome> {
        if self.settled {
            return None;
        }
        let outcome = match self.reply_rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(worker_stopped()),
        };
        self.settled = true;
        Some(outcome)
    }
}

fn worker_stopped() -> InferenceError {
    InferenceError::Execution("style worker stopped before replying".into())
}

fn run_worker_loop<E: StyleEngine>(
    mut engine: Option<E>,
    request_rx: Receiver<InferenceRequest>,
    options: PipelineOptions,
) {
    log::info!("style worker started ({}px input)", options.input_size);

    // Requests are never coalesced: each one owes its caller an answer.
    while let Ok(request) = request_rx.recv() {
        let outcome = match engine.as_mut() {
            Some(engine) => stylize(engine, &request.image, options),
            None => Err(InferenceError::ModelUnavailable),
        };
        match &outcome {
            Ok(image) => log::info!(
                "stylized capture {} ({}x{})",
                request.capture_id,
                image.width(),
                image.height()
            ),
            Err(err) => log::warn!("style transfer for capture {} failed: {err}", request.capture_id),
        }
        if request.reply.send(outcome).is_err() {
            log::debug!("capture {} was dropped before its result arrived", request.capture_id);
        }
    }

    log::info!("style worker stopped");
}

fn stylize<E: StyleEngine>(
    engine: &mut E,
    image: &CapturedImage,
    options: PipelineOptions,
) -> PredictionOutcome {
    let input = codec::decode_to_model_input(image.frame(), options.input_size)
        .map_err(|err| InferenceError::Decode(format!("{err:#}")))?;

    let outputs = engine
        .run(input)
        .map_err(|err| InferenceError::Execution(format!("{err:#}")))?;

    let first = outputs.into_iter().next().ok_or(InferenceError::NoResult)?;
    let buffer = PixelBuffer::from_output(first).map_err(|err| {
        log::warn!("ignoring model output: {err:#}");
        InferenceError::NoResult
    })?;

    codec::encode_model_output(&buffer, options.orientation)
        .map_err(|err| InferenceError::Encode(format!("{err:#}")))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use anyhow::anyhow;
    use crossbeam_channel::RecvTimeoutError;

    use super::*;

    #[derive(Clone, Copy, Debug)]
    pub(crate) enum Behavior {
        Echo,
        Empty,
        NotAnImage,
        Truncated,
        Fail,
        WithScores,
    }

    pub(crate) struct FakeEngine {
        pub behavior: Behavior,
        pub delay: Duration,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeEngine {
        pub fn new(behavior: Behavior) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let engine = FakeEngine {
                behavior,
                delay: Duration::ZERO,
                calls: calls.clone(),
            };
            (engine, calls)
        }
    }

    impl StyleEngine for FakeEngine {
        fn run(&mut self, input: Array4<f32>) -> anyhow::Result<Vec<OutputTensor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            let shape = input.shape().to_vec();
            let data: Vec<f32> = input.iter().copied().collect();
            match self.behavior {
                Behavior::Echo => Ok(vec![OutputTensor { shape, data }]),
                Behavior::Empty => Ok(Vec::new()),
                Behavior::NotAnImage => Ok(vec![OutputTensor {
                    shape: vec![1, 10],
                    data: vec![0.0; 10],
                }]),
                Behavior::Truncated => Ok(vec![OutputTensor {
                    shape,
                    data: data[..data.len() - 1].to_vec(),
                }]),
                Behavior::Fail => Err(anyhow!("session run failed")),
                Behavior::WithScores => Ok(vec![
                    OutputTensor { shape, data },
                    OutputTensor {
                        shape: vec![1, 2],
                        data: vec![0.25, 0.75],
                    },
                ]),
            }
        }
    }

    impl PendingPrediction {
        pub(crate) fn wait_timeout(&mut self, timeout: Duration) -> Option<PredictionOutcome> {
            if self.settled {
                return None;
            }
            let outcome = match self.reply_rx.recv_timeout(timeout) {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => Err(worker_stopped()),
            };
            self.settled = true;
            Some(outcome)
        }
    }

    pub(crate) fn options() -> PipelineOptions {
        PipelineOptions {
            input_size: 4,
            orientation: SensorOrientation::Right,
        }
    }
}
