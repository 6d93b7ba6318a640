use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Axis-aligned region in normalized image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Region {
    /// Region from a pixel-space box inside an image of `width` x `height`.
    pub fn from_pixels(x: f32, y: f32, w: f32, h: f32, width: u32, height: u32) -> Self {
        let iw = width.max(1) as f32;
        let ih = height.max(1) as f32;
        Self {
            x: x / iw,
            y: y / ih,
            w: w / iw,
            h: h / ih,
        }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x, self.y, self.w, self.h]
    }
}

/// Uniform detector output: a flag, a confidence in `[0, 1]` and optional evidence.
///
/// The default value is the "no defect, zero confidence" state returned when
/// a detector cannot run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorSignal {
    pub flagged: bool,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Region>,
    /// Raw measurements behind the decision, keyed by metric name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

impl DetectorSignal {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(flagged: bool, confidence: f32) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            flagged,
            confidence,
            evidence: Vec::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, key: &str, value: f64) -> Self {
        self.metrics.insert(key.to_string(), value);
        self
    }

    pub fn with_evidence(mut self, regions: Vec<Region>) -> Self {
        self.evidence = regions;
        self
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }
}
