//! Inference engine seam
//!
//! The neural network is an external collaborator: the pipeline consumes an
//! object-safe trait taking a preprocessed tensor and returning a
//! probability map. The default backend loads ONNX exports through tract;
//! tests inject fakes through the same traits.

use crate::error::PipelineError;
use crate::models::ModelSpec;
use ndarray::{Array2, Array3};
use std::path::Path;
use std::sync::Arc;

/// Opaque segmentation engine.
///
/// `infer` is a pure function of the input and the loaded weights. Engines
/// are shared read-only after construction; the pipeline never invokes one
/// concurrently for a single job, and cross-job concurrency is bounded by
/// the job scheduler.
pub trait InferenceEngine: Send + Sync {
    /// Run one tile through the model.
    ///
    /// Input is a `(channels, height, width)` normalized tensor; output is a
    /// `(height, width)` probability map in [0, 1].
    fn infer(&self, input: &Array3<f32>) -> Result<Array2<f32>, PipelineError>;
}

/// Constructs engines from weight artifacts; injected into the model cache
pub trait EngineLoader: Send + Sync {
    fn load(
        &self,
        spec: &ModelSpec,
        weights_path: &Path,
    ) -> Result<Arc<dyn InferenceEngine>, PipelineError>;
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxEngineLoader;

#[cfg(feature = "onnx")]
mod onnx {
    use super::*;
    use tract_onnx::prelude::*;

    /// ONNX-backed engine: a tract typed plan optimized for a fixed
    /// `1 x C x H x W` input
    pub struct OnnxEngine {
        plan: TypedRunnableModel<TypedModel>,
    }

    impl InferenceEngine for OnnxEngine {
        fn infer(&self, input: &Array3<f32>) -> Result<Array2<f32>, PipelineError> {
            let (channels, height, width) = input.dim();
            let owned = input.as_standard_layout().to_owned();
            let flat = owned.as_slice().ok_or_else(|| {
                PipelineError::ModelConfig("input tensor is not contiguous".to_string())
            })?;
            let tensor = Tensor::from_shape(&[1, channels, height, width], flat)
                .map_err(|e| PipelineError::ModelConfig(format!("bad input tensor: {}", e)))?;

            let outputs = self
                .plan
                .run(tvec!(tensor.into()))
                .map_err(|e| PipelineError::ModelConfig(format!("inference failed: {}", e)))?;

            let logits = outputs[0]
                .as_slice::<f32>()
                .map_err(|e| PipelineError::ModelConfig(format!("bad model output: {}", e)))?;
            if logits.len() != height * width {
                return Err(PipelineError::ModelConfig(format!(
                    "model emitted {} values for a {}x{} tile",
                    logits.len(),
                    height,
                    width
                )));
            }

            // The exported graphs emit logits; squash to probabilities here
            let probabilities: Vec<f32> =
                logits.iter().map(|&v| 1.0 / (1.0 + (-v).exp())).collect();
            Array2::from_shape_vec((height, width), probabilities)
                .map_err(|e| PipelineError::ModelConfig(format!("bad output shape: {}", e)))
        }
    }

    /// Loads ONNX exports with a fixed 256x256 tile geometry
    pub struct OnnxEngineLoader {
        tile_size: usize,
    }

    impl OnnxEngineLoader {
        pub fn new(tile_size: usize) -> Self {
            Self { tile_size }
        }
    }

    impl Default for OnnxEngineLoader {
        fn default() -> Self {
            Self::new(crate::TILE_SIZE)
        }
    }

    impl EngineLoader for OnnxEngineLoader {
        fn load(
            &self,
            spec: &ModelSpec,
            weights_path: &Path,
        ) -> Result<Arc<dyn InferenceEngine>, PipelineError> {
            let channels = spec.modality.channels();
            let plan = tract_onnx::onnx()
                .model_for_path(weights_path)
                .map_err(|e| {
                    PipelineError::ModelConfig(format!(
                        "failed to load ONNX model {}: {}",
                        weights_path.display(),
                        e
                    ))
                })?
                .with_input_fact(
                    0,
                    f32::fact([1, channels, self.tile_size, self.tile_size]).into(),
                )
                .map_err(|e| PipelineError::ModelConfig(format!("bad input fact: {}", e)))?
                .into_optimized()
                .map_err(|e| {
                    PipelineError::ModelConfig(format!("model optimization failed: {}", e))
                })?
                .into_runnable()
                .map_err(|e| PipelineError::ModelConfig(format!("model not runnable: {}", e)))?;

            Ok(Arc::new(OnnxEngine { plan }))
        }
    }
}
