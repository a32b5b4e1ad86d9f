pub mod camera;
pub mod codec;
pub mod rgba_converter;
pub mod stylizer;

// Re-exports for convenience
pub use camera::{CameraOpener, CaptureSession, SessionState};
#[cfg(feature = "camera-nokhwa")]
pub use camera::{NokhwaOpener, available_cameras};
pub use stylizer::{PendingPrediction, StylePipeline};
