use std::{fmt, str::FromStr, time::Instant};

use anyhow::{Result, anyhow};
use image::RgbaImage;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Frame {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    #[cfg(test)]
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        let rgba = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Frame::new(rgba, width, height)
    }
}

/// Tag the session controller assigns to every still it receives. Later
/// captures always compare greater than earlier ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureId(u64);

impl CaptureId {
    pub fn first() -> Self {
        CaptureId(1)
    }

    pub fn next(self) -> Self {
        CaptureId(self.0 + 1)
    }
}

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub struct CapturedImage {
    frame: Frame,
    quality: PhotoQuality,
}

impl CapturedImage {
    pub fn new(frame: Frame, quality: PhotoQuality) -> Self {
        CapturedImage { frame, quality }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn quality(&self) -> PhotoQuality {
        self.quality
    }
}

#[derive(Clone, Debug)]
pub struct StylizedImage {
    image: RgbaImage,
}

impl StylizedImage {
    pub fn new(image: RgbaImage) -> Self {
        StylizedImage { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.image
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PhotoQuality {
    Speed,
    #[default]
    Balanced,
    Quality,
}

impl PhotoQuality {
    pub fn label(&self) -> &'static str {
        match self {
            PhotoQuality::Speed => "speed",
            PhotoQuality::Balanced => "balanced",
            PhotoQuality::Quality => "quality",
        }
    }
}

impl FromStr for PhotoQuality {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "speed" => Ok(PhotoQuality::Speed),
            "balanced" => Ok(PhotoQuality::Balanced),
            "quality" => Ok(PhotoQuality::Quality),
            other => Err(anyhow!(
                "unknown photo quality '{other}', expected speed, balanced or quality"
            )),
        }
    }
}

/// Rotation applied to the model output so it displays upright. `Right`
/// means the model frame must be turned 90° clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SensorOrientation {
    Up,
    #[default]
    Right,
    Down,
    Left,
}

impl FromStr for SensorOrientation {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "up" => Ok(SensorOrientation::Up),
            "right" => Ok(SensorOrientation::Right),
            "down" => Ok(SensorOrientation::Down),
            "left" => Ok(SensorOrientation::Left),
            other => Err(anyhow!(
                "unknown orientation '{other}', expected up, right, down or left"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_ids_increase() {
        let first = CaptureId::first();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.to_string(), "#2");
    }

    #[test]
    fn parses_quality_case_insensitively() {
        assert_eq!("Balanced".parse::<PhotoQuality>().unwrap(), PhotoQuality::Balanced);
        assert_eq!("speed".parse::<PhotoQuality>().unwrap(), PhotoQuality::Speed);
        assert!("ultra".parse::<PhotoQuality>().is_err());
    }

    #[test]
    fn filled_frame_matches_dimensions() {
        let frame = Frame::filled(3, 2, [1, 2, 3, 255]);
        assert_eq!(frame.rgba.len(), 3 * 2 * 4);
        assert_eq!(&frame.rgba[4..8], &[1, 2, 3, 255]);
    }
}
