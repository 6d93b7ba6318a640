//! Engine A: learned pair regressor plus analytic post-processing.
//!
//! The network sees both faces as one 6-channel tensor. Its raw outputs are
//! clamped, the edges head may be replaced by the analytic edge-chip
//! estimate, and the overall head is guarded against a single collapsed
//! sub-score.

mod model;
#[cfg(feature = "onnx")]
mod onnx;
mod tensor;

pub use model::{six_outputs, FixedModel, ModelMetadata, RegressorModel, OUTPUT_ORDER};
#[cfg(feature = "onnx")]
pub use onnx::OnnxRegressor;
pub use tensor::{
    pair_tensor, resize_center_crop, PairTensor, TensorSpec, IMAGENET_MEAN, IMAGENET_STD,
};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cardgrade_core::ScoreVector;
use cardgrade_vision::{estimate_edge_chips, EdgeChipParams};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{EngineError, EngineKind, EngineOutput, ScoringEngine, ScoringHints, SidePair};

/// How the analytic edge estimate combines with the network's edges head.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeFallbackMode {
    #[default]
    Override,
    Average,
    Off,
}

impl fmt::Display for EdgeFallbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EdgeFallbackMode::Override => "override",
            EdgeFallbackMode::Average => "average",
            EdgeFallbackMode::Off => "off",
        })
    }
}

impl FromStr for EdgeFallbackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "override" => Ok(EdgeFallbackMode::Override),
            "average" => Ok(EdgeFallbackMode::Average),
            "off" => Ok(EdgeFallbackMode::Off),
            other => Err(format!("unknown edge fallback mode '{other}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressorParams {
    pub edge_fallback: EdgeFallbackMode,
    /// Network edges below this trigger the fallback.
    pub edge_threshold: f32,
    /// Zero the overall grade when any sub-score is effectively zero.
    pub overall_zero_if_any_zero: bool,
    pub edge_chip: EdgeChipParams,
}

impl Default for RegressorParams {
    fn default() -> Self {
        Self {
            edge_fallback: EdgeFallbackMode::Override,
            edge_threshold: 0.5,
            overall_zero_if_any_zero: true,
            edge_chip: EdgeChipParams::default(),
        }
    }
}

const ZERO_SUBSCORE: f32 = 0.05;
const BROKEN_OVERALL: f32 = 0.5;

/// Replace or average the network edges when they collapse below the threshold.
pub fn apply_edge_fallback(scores: &mut ScoreVector, fallback: f32, params: &RegressorParams) {
    if scores.edges >= params.edge_threshold {
        return;
    }
    let edges = match params.edge_fallback {
        EdgeFallbackMode::Off => return,
        EdgeFallbackMode::Override => fallback,
        EdgeFallbackMode::Average => 0.5 * (scores.edges + fallback),
    };
    scores.edges = edges.clamp(0.0, 10.0);
}

pub fn guard_overall(scores: &mut ScoreVector, zero_if_any_zero: bool) {
    if zero_if_any_zero && scores.min_subscore() <= ZERO_SUBSCORE {
        scores.overall = 0.0;
    } else if scores.overall < BROKEN_OVERALL {
        scores.overall = scores.mean_subscore().clamp(0.0, 10.0);
    }
}

pub struct RegressorEngine {
    model: Arc<dyn RegressorModel>,
    params: RegressorParams,
}

impl RegressorEngine {
    pub fn new(model: Arc<dyn RegressorModel>, params: RegressorParams) -> Self {
        Self { model, params }
    }

    pub fn model(&self) -> &dyn RegressorModel {
        self.model.as_ref()
    }

    pub fn params(&self) -> &RegressorParams {
        &self.params
    }
}

impl ScoringEngine for RegressorEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Regressor
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    fn predict(&self, pair: SidePair<'_>, _hints: &ScoringHints) -> Result<EngineOutput, EngineError> {
        let front = pair.front;
        let back = pair.back.unwrap_or_else(|| {
            log::info!("regressor: no back image, reusing the front in its place");
            front
        });

        let meta = self.model.metadata();
        let input = pair_tensor(&front.image, &back.image, &meta.tensor_spec());
        let raw = self.model.predict(&input)?;
        let mut scores = ScoreVector::from_array(raw).clamped();

        let net_edges = scores.edges;
        let estimate = estimate_edge_chips(&front.image, &self.params.edge_chip);
        apply_edge_fallback(&mut scores, estimate.score, &self.params);
        if scores.edges != net_edges {
            log::info!(
                "regressor: edges {:.2} -> {:.2} ({} fallback, chip ratio {:.4})",
                net_edges,
                scores.edges,
                self.params.edge_fallback,
                estimate.chip_ratio
            );
        }
        guard_overall(&mut scores, self.params.overall_zero_if_any_zero);

        let debug = json!({
            "model_version": meta.version,
            "front_blur": front.quality.blur_variance,
            "front_glare": front.quality.glare_ratio,
            "front_quality_ok": front.quality.ok,
            "back_provided": pair.back.is_some(),
            "net_edges": net_edges,
            "fallback_edges": estimate.score,
            "chip_ratio": estimate.chip_ratio,
            "overall_zero_hard_fail": self.params.overall_zero_if_any_zero,
        });
        log::debug!("regressor: scores {:?}", scores.to_array());
        Ok(EngineOutput::scored(EngineKind::Regressor, scores).with_raw(json!({ "debug": debug })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::side;
    use image::{Rgb, RgbImage};

    fn engine(output: [f32; 6], params: RegressorParams) -> RegressorEngine {
        RegressorEngine::new(Arc::new(FixedModel::new(output).with_image_size(32)), params)
    }

    fn clean_card() -> RgbImage {
        RgbImage::from_pixel(63, 88, Rgb([200, 180, 160]))
    }

    #[test]
    fn outputs_are_clamped() {
        let e = engine([11.0, -2.0, 9.0, 8.0, 7.0, 8.5], RegressorParams::default());
        let front = side(clean_card());
        let out = e.predict(SidePair::new(&front, None), &ScoringHints::default()).unwrap();
        assert_eq!(out.scores.centering, 10.0);
        assert_eq!(out.scores.surface, 0.0);
        // a zero sub-score zeroes the overall
        assert_eq!(out.scores.overall, 0.0);
        assert!(out.observations.is_none());
    }

    #[test]
    fn same_pair_twice_is_identical() {
        let e = engine([8.2, 7.9, 8.8, 8.1, 9.0, 8.3], RegressorParams::default());
        let front = side(clean_card());
        let back = side(RgbImage::from_pixel(63, 88, Rgb([20, 40, 160])));
        let a = e.predict(SidePair::new(&front, Some(&back)), &ScoringHints::default()).unwrap();
        let b = e.predict(SidePair::new(&front, Some(&back)), &ScoringHints::default()).unwrap();
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.raw, b.raw);
    }

    #[test]
    fn collapsed_edges_use_clean_estimate() {
        let e = engine([8.0, 8.0, 0.1, 8.0, 8.0, 8.0], RegressorParams::default());
        let front = side(clean_card());
        let out = e.predict(SidePair::new(&front, None), &ScoringHints::default()).unwrap();
        assert_eq!(out.scores.edges, 10.0);
        assert_eq!(out.scores.overall, 8.0);
        assert_eq!(out.raw["debug"]["net_edges"].as_f64(), Some(0.1f32 as f64));
    }

    #[test]
    fn fallback_modes() {
        let params = |mode| RegressorParams {
            edge_fallback: mode,
            ..RegressorParams::default()
        };
        let base = ScoreVector::from_array([8.0, 8.0, 0.2, 8.0, 8.0, 8.0]);

        let mut s = base;
        apply_edge_fallback(&mut s, 6.0, &params(EdgeFallbackMode::Average));
        assert!((s.edges - 3.1).abs() < 1e-5);

        let mut s = base;
        apply_edge_fallback(&mut s, 6.0, &params(EdgeFallbackMode::Off));
        assert_eq!(s.edges, 0.2);

        let mut s = ScoreVector::from_array([8.0, 8.0, 4.0, 8.0, 8.0, 8.0]);
        apply_edge_fallback(&mut s, 10.0, &params(EdgeFallbackMode::Override));
        assert_eq!(s.edges, 4.0);
    }

    #[test]
    fn broken_overall_becomes_mean() {
        let mut s = ScoreVector::from_array([8.0, 6.0, 10.0, 8.0, 8.0, 0.2]);
        guard_overall(&mut s, true);
        assert!((s.overall - 8.0).abs() < 1e-5);

        let mut s = ScoreVector::from_array([8.0, 0.0, 10.0, 8.0, 8.0, 7.0]);
        guard_overall(&mut s, false);
        assert_eq!(s.overall, 7.0);
    }

    #[test]
    fn mode_parses() {
        assert_eq!("AVERAGE".parse::<EdgeFallbackMode>(), Ok(EdgeFallbackMode::Average));
        assert!("sometimes".parse::<EdgeFallbackMode>().is_err());
    }
}
