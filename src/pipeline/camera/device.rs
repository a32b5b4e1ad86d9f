use anyhow::{Result, anyhow};
use nokhwa::{
    Buffer, Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraIndex, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType,
    },
};

use super::{CameraOpener, FrameGrabber};
use crate::{
    pipeline::rgba_converter::{self, PixelLayout},
    types::{Frame, PhotoQuality},
};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats(quality: PhotoQuality) -> Vec<RequestedFormat<'static>> {
    let fastest = RequestedFormat::with_formats(
        RequestedFormatType::AbsoluteHighestFrameRate,
        PREFERRED_PIXEL_FORMATS,
    );
    let largest = RequestedFormat::with_formats(
        RequestedFormatType::AbsoluteHighestResolution,
        PREFERRED_PIXEL_FORMATS,
    );
    let any = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);

    match quality {
        PhotoQuality::Speed => vec![fastest, any],
        PhotoQuality::Balanced => vec![
            fastest,
            largest,
            // Fall back to any format Nokhwa can decode, but prefer higher FPS to
            // avoid very low default rates that some drivers reject.
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
            any,
        ],
        PhotoQuality::Quality => vec![
            largest,
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
            any,
        ],
    }
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    info.human_name()
}

#[derive(Clone, Debug)]
pub struct NokhwaOpener {
    index: CameraIndex,
}

impl NokhwaOpener {
    pub fn new(index: CameraIndex) -> Self {
        NokhwaOpener { index }
    }
}

impl CameraOpener for NokhwaOpener {
    type Grabber = NokhwaGrabber;

    fn open(&self, quality: PhotoQuality) -> Result<NokhwaGrabber> {
        let mut last_err = None;

        for requested in requested_formats(quality) {
            match Camera::new(self.index.clone(), requested) {
                Ok(mut camera) => match camera.open_stream() {
                    Ok(()) => return Ok(NokhwaGrabber { camera }),
                    Err(err) => last_err = Some(err.into()),
                },
                Err(err) => last_err = Some(err.into()),
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
    }
}

pub struct NokhwaGrabber {
    camera: Camera,
}

impl FrameGrabber for NokhwaGrabber {
    fn grab(&mut self) -> Result<Frame> {
        let buffer = self.camera.frame()?;
        convert_buffer(&buffer)
    }
}

impl Drop for NokhwaGrabber {
    fn drop(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            log::warn!("failed to stop camera stream: {err:?}");
        }
    }
}

fn convert_buffer(buffer: &Buffer) -> Result<Frame> {
    let resolution = buffer.resolution();
    let layout = match buffer.source_frame_format() {
        FrameFormat::NV12 => PixelLayout::Nv12,
        FrameFormat::YUYV => PixelLayout::Yuyv,
        FrameFormat::MJPEG => PixelLayout::Mjpeg,
        FrameFormat::RAWRGB => PixelLayout::Rgb,
        FrameFormat::RAWBGR => PixelLayout::Bgr,
        FrameFormat::GRAY => PixelLayout::Gray,
    };
    rgba_converter::to_frame(
        layout,
        buffer.buffer(),
        resolution.width_x,
        resolution.height_y,
    )
}
