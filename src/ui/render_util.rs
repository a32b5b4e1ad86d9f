use std::sync::Arc;

use gpui::RenderImage;
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::types::{Frame, StylizedImage};

pub(super) fn frame_to_image(frame: &Frame) -> Option<Arc<RenderImage>> {
    bgra_image(frame.rgba.clone(), frame.width, frame.height)
}

pub(super) fn stylized_to_image(stylized: &StylizedImage) -> Option<Arc<RenderImage>> {
    bgra_image(
        stylized.rgba().as_raw().clone(),
        stylized.width(),
        stylized.height(),
    )
}

// GPUI expects BGRA; convert in place to avoid the async asset pipeline and flicker.
fn bgra_image(mut pixels: Vec<u8>, width: u32, height: u32) -> Option<Arc<RenderImage>> {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, pixels)?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}
