use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::StyleEngine;
use crate::pipeline::codec::OutputTensor;

pub struct OrtStyleEngine {
    session: Session,
}

impl OrtStyleEngine {
    pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        for input in &session.inputs {
            log::debug!("style model input {} {:?}", input.name, input.input_type);
        }
        for output in &session.outputs {
            log::debug!("style model output {} {:?}", output.name, output.output_type);
        }

        Ok(Self { session })
    }
}

impl StyleEngine for OrtStyleEngine {
    fn run(&mut self, input: Array4<f32>) -> Result<Vec<OutputTensor>> {
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run style transfer session")?;

        if outputs.len() < 1 {
            return Ok(Vec::new());
        }

        let image = match outputs[0].try_extract_array::<f32>() {
            Ok(image) => image,
            Err(err) => {
                log::warn!("style model output 0 is not an f32 tensor: {err}");
                return Ok(Vec::new());
            }
        };

        Ok(vec![OutputTensor {
            shape: image.shape().to_vec(),
            data: image.iter().copied().collect(),
        }])
    }
}
