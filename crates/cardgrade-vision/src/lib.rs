//! Deterministic image stages of the grading pipeline.
//!
//! - [`rectify`]: locate the card quadrilateral and warp it to the canonical
//!   63:88 canvas, with a letterbox fallback that never fails.
//! - [`quality`]: blur / glare / resolution report (advisory).
//! - [`color`]: gray-world white balance plus a mild gamma.
//! - [`detect`]: edge-chip, scribble/ink and photo re-check heuristics.
//! - [`prepare`]: the per-side chain feeding the scoring engines.
//!
//! ## Quickstart
//!
//! ```no_run
//! use cardgrade_vision::{prepare_side, PrepareParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("front.jpg")?.to_rgb8();
//! let side = prepare_side(img, &PrepareParams::default());
//! println!("canvas {:?}, quality ok = {}", side.image.dimensions(), side.quality.ok);
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod debug;
pub mod detect;
pub mod prepare;
pub mod quality;
pub mod rectify;
mod refine;

pub use color::{normalize_colors, ColorParams};
pub use detect::{
    detect_blur, detect_glare, detect_scribble, estimate_edge_chips, run_detectors,
    DetectorParams, DetectorReport, EdgeChipParams, EdgeChipReport, PhotoCheckParams,
    ScribbleParams,
};
pub use prepare::{maybe_upscale, prepare_side, PrepareParams, PreparedSide};
pub use quality::{
    assess_quality, glare_fraction, laplacian_variance, QualityIssue, QualityParams,
    QualityReport,
};
pub use rectify::{
    letterbox, locate_card, rectify, rectify_or_letterbox, CanvasSource, CardCanvas, CardQuad,
    EdgePass, QuadSource, Rectification, RectifyError, RectifyParams,
};
