//! Core types and utilities for trading-card grading.
//!
//! This crate is intentionally small. It holds the types every stage of the
//! pipeline exchanges (score vectors, observations, detector signals, game
//! hints), a handful of raster helpers on top of `image`, and the projective
//! geometry used to rectify a photographed card.

mod card;
mod game;
mod geometry;
mod homography;
mod logger;
mod raster;
mod score;
mod signal;

pub use card::{CanvasSize, CARD_ASPECT, CARD_HEIGHT_MM, CARD_WIDTH_MM};
pub use game::{Game, ParseGameError};
pub use geometry::{
    approx_polygon_dp, arc_length, bounding_box, convex_hull, intersect_lines, is_convex,
    line_through, min_area_rect, order_corners, polygon_area, Line,
};
pub use homography::{homography_from_4pt, warp_perspective_rgb, Homography};
pub use raster::{
    crop_fraction, median_u8, rgb_to_hsv, rotate_180, sample_bilinear_rgb, to_gray, Roi,
};
pub use score::{Category, Observation, ScoreVector, Side, SCORE_MAX, SCORE_MIN};
pub use signal::{DetectorSignal, Region};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity, DEFAULT_DIRECTIVES, LOG_ENV};
