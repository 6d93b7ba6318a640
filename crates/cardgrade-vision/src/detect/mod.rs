//! Analytic defect detectors run on a rectified card image.
//!
//! Every detector is a pure function returning a [`DetectorSignal`]; an
//! empty or missing image yields the default "no defect" signal.

mod edge_chip;
mod photo;
mod scribble;

pub use edge_chip::{estimate_edge_chips, EdgeChipParams, EdgeChipReport};
pub(crate) use edge_chip::in_border;
pub use photo::{detect_blur, detect_glare, PhotoCheckParams};
pub use scribble::{detect_scribble, ScribbleParams};

use cardgrade_core::DetectorSignal;
use image::RgbImage;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub scribble: ScribbleParams,
    pub edge_chip: EdgeChipParams,
    pub photo: PhotoCheckParams,
}

/// All detector outputs for one side of the card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorReport {
    pub scribble: DetectorSignal,
    pub glare: DetectorSignal,
    pub blur: DetectorSignal,
    pub edge_chips: DetectorSignal,
    pub edge_estimate: EdgeChipReport,
}

impl Default for DetectorReport {
    fn default() -> Self {
        Self {
            scribble: DetectorSignal::none(),
            glare: DetectorSignal::none(),
            blur: DetectorSignal::none(),
            edge_chips: DetectorSignal::none(),
            edge_estimate: EdgeChipReport::clean(),
        }
    }
}

/// Run the whole detector suite; `None` or an empty image gives the default report.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn run_detectors(img: Option<&RgbImage>, params: &DetectorParams) -> DetectorReport {
    let Some(img) = img.filter(|i| i.width() > 0 && i.height() > 0) else {
        log::warn!("detectors: no usable image, reporting defaults");
        return DetectorReport::default();
    };

    let edge_estimate = estimate_edge_chips(img, &params.edge_chip);
    let report = DetectorReport {
        scribble: detect_scribble(img, &params.scribble),
        glare: detect_glare(img, &params.photo),
        blur: detect_blur(img, &params.photo),
        edge_chips: edge_estimate.signal(&params.edge_chip),
        edge_estimate,
    };
    log::debug!(
        "detectors: scribble={} ({:.2}) glare={} blur={} chip_ratio={:.4}",
        report.scribble.flagged,
        report.scribble.confidence,
        report.glare.flagged,
        report.blur.flagged,
        report.edge_estimate.chip_ratio
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_image_gives_defaults() {
        let r = run_detectors(None, &DetectorParams::default());
        assert_eq!(r, DetectorReport::default());
        assert_eq!(r.edge_estimate.score, 10.0);
    }

    #[test]
    fn scribbled_card_reports_through_suite() {
        let mut img = scribble::tests::blank_card();
        scribble::tests::scribble_on(&mut img, 4, [20, 20, 20]);
        let r = run_detectors(Some(&img), &DetectorParams::default());
        assert!(r.scribble.flagged);
        assert!(!r.glare.flagged);
    }
}
