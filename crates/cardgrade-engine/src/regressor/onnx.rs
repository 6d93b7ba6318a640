use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;

use super::model::{six_outputs, ModelMetadata, RegressorModel};
use super::tensor::PairTensor;
use crate::ModelError;

fn backend(e: ort::Error) -> ModelError {
    ModelError::Backend(e.to_string())
}

/// Pair regressor exported to ONNX. Loaded once, shared across attempts.
pub struct OnnxRegressor {
    session: Mutex<Session>,
    meta: ModelMetadata,
}

impl std::fmt::Debug for OnnxRegressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxRegressor")
            .field("version", &self.meta.version)
            .finish_non_exhaustive()
    }
}

impl OnnxRegressor {
    pub fn load(weights: &Path, meta: ModelMetadata) -> Result<Self, ModelError> {
        meta.validate()?;
        let session = Session::builder()
            .map_err(backend)?
            .commit_from_file(weights)
            .map_err(backend)?;
        log::info!(
            "regressor: loaded {} (version {}, size {})",
            weights.display(),
            meta.version,
            meta.image_size
        );
        Ok(Self {
            session: Mutex::new(session),
            meta,
        })
    }

    /// Load weights and the metadata JSON next to them.
    pub fn load_with_metadata(weights: &Path, metadata: &Path) -> Result<Self, ModelError> {
        let meta = ModelMetadata::load_json(metadata)?;
        Self::load(weights, meta)
    }
}

impl RegressorModel for OnnxRegressor {
    fn metadata(&self) -> &ModelMetadata {
        &self.meta
    }

    fn predict(&self, input: &PairTensor) -> Result<[f32; 6], ModelError> {
        let expected = PairTensor::expected_len(self.meta.image_size);
        if input.data.len() != expected {
            return Err(ModelError::InputShape {
                expected,
                found: input.data.len(),
            });
        }
        let shape = input.shape().map(|d| d as i64);
        let tensor =
            Tensor::from_array((shape, input.data.clone().into_boxed_slice())).map_err(backend)?;

        let mut session = self.session.lock().map_err(|_| ModelError::Poisoned)?;
        let outputs = session.run(ort::inputs![tensor]).map_err(backend)?;
        let (_, values) = outputs[0].try_extract_tensor::<f32>().map_err(backend)?;
        six_outputs(values)
    }
}
