use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("photo capture failed: {0}")]
    CaptureFailure(String),
    #[error("a photo capture is already in progress")]
    Busy,
    #[error("capture session is not streaming")]
    NotStreaming,
    #[error("capture session already delivered its photo")]
    SessionFinished,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InferenceError {
    #[error("style model is unavailable")]
    ModelUnavailable,
    #[error("failed to decode captured image: {0}")]
    Decode(String),
    #[error("style model execution failed: {0}")]
    Execution(String),
    #[error("style model produced no usable output")]
    NoResult,
    #[error("failed to render model output: {0}")]
    Encode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    DeviceUnavailable,
    CaptureFailure,
    ModelUnavailable,
    Decode,
    Execution,
    NoResult,
    Encode,
}

impl FailureKind {
    pub fn message(&self) -> &'static str {
        match self {
            FailureKind::DeviceUnavailable => "Camera is not available or authorized",
            FailureKind::CaptureFailure => "The photo could not be captured",
            FailureKind::ModelUnavailable => "The Starry Night model could not be loaded",
            FailureKind::Decode => "The photo could not be prepared for the model",
            FailureKind::Execution => "The style model failed while painting",
            FailureKind::NoResult => "The style model returned no image",
            FailureKind::Encode => "The painted image could not be rendered",
        }
    }
}

impl CaptureError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CaptureError::DeviceUnavailable(_) => FailureKind::DeviceUnavailable,
            _ => FailureKind::CaptureFailure,
        }
    }
}

impl InferenceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            InferenceError::ModelUnavailable => FailureKind::ModelUnavailable,
            InferenceError::Decode(_) => FailureKind::Decode,
            InferenceError::Execution(_) => FailureKind::Execution,
            InferenceError::NoResult => FailureKind::NoResult,
            InferenceError::Encode(_) => FailureKind::Encode,
        }
    }
}
