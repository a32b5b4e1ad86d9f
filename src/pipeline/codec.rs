use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use image::{RgbaImage, imageops};
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, SensorOrientation, StylizedImage};

#[derive(Clone, Debug)]
pub struct OutputTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub planes: Vec<f32>,
}

impl PixelBuffer {
    pub fn from_output(output: OutputTensor) -> Result<Self> {
        let (channels, height, width) = match output.shape.as_slice() {
            [1, c, h, w] | [c, h, w] => (*c, *h, *w),
            other => return Err(anyhow!("unexpected model output shape {other:?}")),
        };
        if channels != 3 {
            return Err(anyhow!("expected 3 output channels, got {channels}"));
        }
        let width = u32::try_from(width).context("output width out of range")?;
        let height = u32::try_from(height).context("output height out of range")?;

        Ok(PixelBuffer {
            width,
            height,
            planes: output.data,
        })
    }
}

/// Center-crops the still to a square, resizes it to `input_size` and packs
/// it as an NCHW tensor with values in `0.0..=255.0`.
pub fn decode_to_model_input(still: &Frame, input_size: u32) -> Result<Array4<f32>> {
    if input_size == 0 {
        return Err(anyhow!("model input size must be positive"));
    }
    if still.width == 0 || still.height == 0 {
        return Err(anyhow!(
            "captured image is empty ({}x{})",
            still.width,
            still.height
        ));
    }
    let expected_len = (still.width as usize)
        .saturating_mul(still.height as usize)
        .saturating_mul(4);
    if still.rgba.len() != expected_len {
        return Err(anyhow!(
            "captured image buffer size mismatch: got {}, expected {}",
            still.rgba.len(),
            expected_len
        ));
    }

    let side = still.width.min(still.height);
    let square = center_square(still, side);

    let src_image = fir::images::Image::from_vec_u8(side, side, square, fir::PixelType::U8x4)?;
    let mut dst_image = fir::images::Image::new(input_size, input_size, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let size = input_size as usize;
    let input = Array4::<f32>::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
        resized[(y * size + x) * 4 + c] as f32
    });

    Ok(input)
}

fn center_square(still: &Frame, side: u32) -> Vec<u8> {
    let left = ((still.width - side) / 2) as usize;
    let top = ((still.height - side) / 2) as usize;
    let src_stride = still.width as usize * 4;
    let row_len = side as usize * 4;

    let mut square = Vec::with_capacity(row_len * side as usize);
    for row in top..top + side as usize {
        let offset = row * src_stride + left * 4;
        square.extend_from_slice(&still.rgba[offset..offset + row_len]);
    }
    square
}

pub fn encode_model_output(
    buffer: &PixelBuffer,
    orientation: SensorOrientation,
) -> Result<StylizedImage> {
    if buffer.width == 0 || buffer.height == 0 {
        return Err(anyhow!(
            "model output is empty ({}x{})",
            buffer.width,
            buffer.height
        ));
    }
    let plane_len = buffer.width as usize * buffer.height as usize;
    if buffer.planes.len() != plane_len * 3 {
        return Err(anyhow!(
            "model output length mismatch: got {}, expected {}",
            buffer.planes.len(),
            plane_len * 3
        ));
    }

    let (red, rest) = buffer.planes.split_at(plane_len);
    let (green, blue) = rest.split_at(plane_len);
    let mut rgba = vec![0u8; plane_len * 4];
    rgba.par_chunks_mut(4).enumerate().for_each(|(idx, px)| {
        px[0] = to_channel(red[idx]);
        px[1] = to_channel(green[idx]);
        px[2] = to_channel(blue[idx]);
        px[3] = 255;
    });

    let image = RgbaImage::from_raw(buffer.width, buffer.height, rgba)
        .ok_or_else(|| anyhow!("failed to build RGBA image from model output"))?;

    let upright = match orientation {
        SensorOrientation::Up => image,
        SensorOrientation::Right => imageops::rotate90(&image),
        SensorOrientation::Down => imageops::rotate180(&image),
        SensorOrientation::Left => imageops::rotate270(&image),
    };

    Ok(StylizedImage::new(upright))
}

fn to_channel(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn close_to(actual: f32, expected: f32) -> bool {
        (actual - expected).abs() <= 1.0
    }

    #[test]
    fn decode_rejects_mismatched_buffer() {
        let mut frame = Frame::filled(4, 4, RED);
        frame.rgba.pop();
        assert!(decode_to_model_input(&frame, 8).is_err());
    }

    #[test]
    fn decode_rejects_empty_still() {
        let frame = Frame::new(Vec::new(), 0, 0);
        assert!(decode_to_model_input(&frame, 8).is_err());
    }

    #[test]
    fn decode_packs_nchw_in_byte_range() {
        let frame = Frame::filled(12, 6, [200, 100, 50, 255]);
        let input = decode_to_model_input(&frame, 4).unwrap();

        assert_eq!(input.shape(), &[1, 3, 4, 4]);
        for y in 0..4 {
            for x in 0..4 {
                assert!(close_to(input[[0, 0, y, x]], 200.0));
                assert!(close_to(input[[0, 1, y, x]], 100.0));
                assert!(close_to(input[[0, 2, y, x]], 50.0));
            }
        }
    }

    #[test]
    fn decode_keeps_the_center_of_wide_stills() {
        // 3x1 still: red | blue | red. The center square is the blue pixel.
        let mut rgba = Vec::new();
        rgba.extend_from_slice(&RED);
        rgba.extend_from_slice(&BLUE);
        rgba.extend_from_slice(&RED);
        let frame = Frame::new(rgba, 3, 1);

        let input = decode_to_model_input(&frame, 2).unwrap();
        assert!(close_to(input[[0, 0, 0, 0]], 0.0));
        assert!(close_to(input[[0, 2, 1, 1]], 255.0));
    }

    #[test]
    fn pixel_buffer_accepts_batched_and_unbatched_shapes() {
        let batched = PixelBuffer::from_output(OutputTensor {
            shape: vec![1, 3, 2, 5],
            data: vec![0.0; 30],
        })
        .unwrap();
        assert_eq!((batched.width, batched.height), (5, 2));

        let plain = PixelBuffer::from_output(OutputTensor {
            shape: vec![3, 4, 4],
            data: vec![0.0; 48],
        })
        .unwrap();
        assert_eq!((plain.width, plain.height), (4, 4));
    }

    #[test]
    fn pixel_buffer_rejects_non_images() {
        let logits = OutputTensor {
            shape: vec![1, 1000],
            data: vec![0.0; 1000],
        };
        assert!(PixelBuffer::from_output(logits).is_err());

        let gray = OutputTensor {
            shape: vec![1, 1, 4, 4],
            data: vec![0.0; 16],
        };
        assert!(PixelBuffer::from_output(gray).is_err());
    }

    #[test]
    fn encode_clamps_out_of_range_values() {
        let buffer = PixelBuffer {
            width: 1,
            height: 1,
            planes: vec![312.7, -8.0, f32::NAN],
        };
        let image = encode_model_output(&buffer, SensorOrientation::Up).unwrap();
        assert_eq!(image.rgba().get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn encode_rejects_inconsistent_buffers() {
        let short = PixelBuffer {
            width: 2,
            height: 2,
            planes: vec![0.0; 5],
        };
        assert!(encode_model_output(&short, SensorOrientation::Right).is_err());

        let empty = PixelBuffer {
            width: 0,
            height: 3,
            planes: Vec::new(),
        };
        assert!(encode_model_output(&empty, SensorOrientation::Right).is_err());
    }

    // Model frame is 2 wide and 1 high: red on the left, blue on the right.
    fn left_red_right_blue() -> PixelBuffer {
        PixelBuffer {
            width: 2,
            height: 1,
            planes: vec![255.0, 0.0, 0.0, 0.0, 0.0, 255.0],
        }
    }

    #[test]
    fn default_orientation_turns_output_upright() {
        let image = encode_model_output(&left_red_right_blue(), SensorOrientation::default())
            .unwrap();

        // A quarter turn clockwise stands the frame up: the left edge of the
        // model frame becomes the top of the displayed image.
        assert_eq!((image.width(), image.height()), (1, 2));
        assert_eq!(image.rgba().get_pixel(0, 0).0, RED);
        assert_eq!(image.rgba().get_pixel(0, 1).0, BLUE);
    }

    #[test]
    fn other_orientations_rotate_accordingly() {
        let up = encode_model_output(&left_red_right_blue(), SensorOrientation::Up).unwrap();
        assert_eq!((up.width(), up.height()), (2, 1));
        assert_eq!(up.rgba().get_pixel(0, 0).0, RED);

        let down = encode_model_output(&left_red_right_blue(), SensorOrientation::Down).unwrap();
        assert_eq!(down.rgba().get_pixel(0, 0).0, BLUE);

        let left = encode_model_output(&left_red_right_blue(), SensorOrientation::Left).unwrap();
        assert_eq!((left.width(), left.height()), (1, 2));
        assert_eq!(left.rgba().get_pixel(0, 0).0, BLUE);
        assert_eq!(left.rgba().get_pixel(0, 1).0, RED);
    }
}
