use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::tensor::{PairTensor, TensorSpec, IMAGENET_MEAN, IMAGENET_STD};
use crate::ModelError;

/// Output head order every checkpoint must follow.
pub const OUTPUT_ORDER: [&str; 6] = [
    "centering",
    "surface",
    "edges",
    "corners",
    "color",
    "overall",
];

/// Companion metadata shipped next to the weights file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMetadata {
    pub version: String,
    pub image_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub outputs: Vec<String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            version: "unversioned".to_string(),
            image_size: 384,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            outputs: OUTPUT_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ModelMetadata {
    pub fn load_json(path: &Path) -> Result<Self, ModelError> {
        let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let meta: Self = serde_json::from_str(&text)?;
        meta.validate()?;
        Ok(meta)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let same = self.outputs.len() == OUTPUT_ORDER.len()
            && self
                .outputs
                .iter()
                .zip(OUTPUT_ORDER)
                .all(|(a, b)| a.eq_ignore_ascii_case(b));
        if !same {
            return Err(ModelError::OutputOrder {
                expected: OUTPUT_ORDER.iter().map(|s| s.to_string()).collect(),
                found: self.outputs.clone(),
            });
        }
        Ok(())
    }

    pub fn tensor_spec(&self) -> TensorSpec {
        TensorSpec {
            size: self.image_size,
            mean: self.mean,
            std: self.std,
        }
    }
}

/// Inference over a prepared pair tensor. Same tensor, same output.
pub trait RegressorModel: Send + Sync {
    fn metadata(&self) -> &ModelMetadata;

    fn predict(&self, input: &PairTensor) -> Result<[f32; 6], ModelError>;
}

/// Returns the same six values for every input; for dry runs and tests.
#[derive(Clone, Debug)]
pub struct FixedModel {
    meta: ModelMetadata,
    output: [f32; 6],
}

impl FixedModel {
    pub fn new(output: [f32; 6]) -> Self {
        Self {
            meta: ModelMetadata {
                version: "fixed".to_string(),
                ..ModelMetadata::default()
            },
            output,
        }
    }

    pub fn with_image_size(mut self, size: u32) -> Self {
        self.meta.image_size = size;
        self
    }
}

impl RegressorModel for FixedModel {
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
        Ok(self.output)
    }
}

/// Map a flat model output to the six scores.
pub fn six_outputs(values: &[f32]) -> Result<[f32; 6], ModelError> {
    <[f32; 6]>::try_from(values).map_err(|_| ModelError::OutputShape(values.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_roundtrips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardgrader_v1.json");
        fs::write(
            &path,
            r#"{"version":"v1","image_size":256,"outputs":["centering","surface","edges","corners","color","overall"]}"#,
        )
        .unwrap();
        let meta = ModelMetadata::load_json(&path).unwrap();
        assert_eq!(meta.version, "v1");
        assert_eq!(meta.image_size, 256);
        assert_eq!(meta.mean, IMAGENET_MEAN);
    }

    #[test]
    fn wrong_output_order_is_rejected() {
        let meta = ModelMetadata {
            outputs: vec!["overall".into(), "centering".into()],
            ..ModelMetadata::default()
        };
        assert!(matches!(meta.validate(), Err(ModelError::OutputOrder { .. })));
    }

    #[test]
    fn missing_metadata_file_reports_path() {
        let err = ModelMetadata::load_json(Path::new("/nonexistent/meta.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/meta.json"));
    }

    #[test]
    fn six_outputs_checks_length() {
        assert!(six_outputs(&[1.0; 6]).is_ok());
        assert!(matches!(six_outputs(&[1.0; 5]), Err(ModelError::OutputShape(5))));
    }
}
