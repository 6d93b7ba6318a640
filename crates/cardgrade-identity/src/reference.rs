//! Reference-image identification.
//!
//! Known card images are indexed once: FAST-9 corners, strongest first, each
//! described by a 256-bit BRIEF descriptor. A query front is matched against
//! every reference and scored by how many correspondences a RANSAC homography
//! explains. The reference with the most inliers wins once it clears
//! [`ReferenceParams::min_inliers`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use cardgrade_core::{homography_from_4pt, to_gray, Homography};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::binary_descriptors::brief::{brief, BriefDescriptor, TestPair};
use imageproc::binary_descriptors::{match_binary_descriptors, BinaryDescriptor};
use imageproc::corners::corners_fast9;
use imageproc::point::Point;
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

const DESCRIPTOR_BITS: usize = 256;
/// BRIEF patches are 31x31 around the keypoint.
const PATCH_MARGIN: u32 = 16;
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceParams {
    /// Images are resized to this height before feature extraction.
    pub working_height: u32,
    pub fast_threshold: u8,
    pub max_keypoints: usize,
    /// Descriptors match when fewer than this many of their bits differ.
    pub max_hamming: u32,
    /// Only the closest matches feed the homography fit.
    pub top_matches: usize,
    pub min_matches: usize,
    pub ransac_iterations: usize,
    /// Reprojection error, in working pixels.
    pub inlier_threshold: f32,
    pub min_inliers: usize,
    pub seed: u64,
}

impl Default for ReferenceParams {
    fn default() -> Self {
        Self {
            working_height: 440,
            fast_threshold: 20,
            max_keypoints: 1500,
            max_hamming: 40,
            top_matches: 80,
            min_matches: 20,
            ransac_iterations: 400,
            inlier_threshold: 3.0,
            min_inliers: 12,
            seed: 0x5eed,
        }
    }
}

/// Winning reference for a query image.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceMatch {
    pub name: String,
    pub path: PathBuf,
    /// Descriptor matches that entered the fit.
    pub matches: usize,
    pub inliers: usize,
    /// Query working pixels to reference working pixels.
    pub homography: Homography,
}

struct ReferenceEntry {
    name: String,
    path: PathBuf,
    descriptors: Vec<BriefDescriptor>,
}

/// Index of reference card images.
///
/// All descriptors share one set of BRIEF test pairs, drawn when the matcher
/// is created; descriptors from two matchers are not comparable.
pub struct ReferenceMatcher {
    params: ReferenceParams,
    test_pairs: Vec<TestPair>,
    entries: Vec<ReferenceEntry>,
}

impl fmt::Debug for ReferenceMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceMatcher")
            .field("params", &self.params)
            .field("references", &self.entries.len())
            .finish_non_exhaustive()
    }
}

/// `"charizard_ex"` -> `"charizard ex"`.
fn reference_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name = stem.replace('_', " ").trim().to_string();
    (!name.is_empty()).then_some(name)
}

fn is_reference_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn working_gray(img: &RgbImage, height: u32) -> GrayImage {
    let gray = to_gray(img);
    let (w, h) = gray.dimensions();
    if height == 0 || h == 0 || h == height {
        return gray;
    }
    let width = ((w as f32 * height as f32 / h as f32).round() as u32).max(1);
    imageops::resize(&gray, width, height, FilterType::Triangle)
}

/// Strongest FAST-9 corners far enough from the border for a BRIEF patch.
fn keypoints(gray: &GrayImage, params: &ReferenceParams) -> Vec<Point<u32>> {
    let (w, h) = gray.dimensions();
    let mut corners: Vec<_> = corners_fast9(gray, params.fast_threshold)
        .into_iter()
        .filter(|c| {
            c.x >= PATCH_MARGIN
                && c.y >= PATCH_MARGIN
                && c.x + PATCH_MARGIN < w
                && c.y + PATCH_MARGIN < h
        })
        .collect();
    corners.sort_by(|a, b| b.score.total_cmp(&a.score));
    corners.truncate(params.max_keypoints);
    corners.into_iter().map(Point::from).collect()
}

fn position(d: &BriefDescriptor) -> Point2<f32> {
    let p = d.position();
    Point2::new(p.x as f32, p.y as f32)
}

fn count_inliers(h: &Homography, src: &[Point2<f32>], dst: &[Point2<f32>], threshold: f32) -> usize {
    src.iter()
        .zip(dst)
        .filter(|(s, d)| (h.apply(**s) - **d).norm() < threshold)
        .count()
}

/// Best four-point homography by inlier count; `None` below four pairs or
/// when every sample is degenerate.
fn ransac_homography(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    params: &ReferenceParams,
) -> Option<(Homography, usize)> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return None;
    }
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<(Homography, usize)> = None;
    for _ in 0..params.ransac_iterations {
        let idx = sample(&mut rng, n, 4);
        let s = [src[idx.index(0)], src[idx.index(1)], src[idx.index(2)], src[idx.index(3)]];
        let d = [dst[idx.index(0)], dst[idx.index(1)], dst[idx.index(2)], dst[idx.index(3)]];
        let Some(h) = homography_from_4pt(&s, &d) else {
            continue;
        };
        let inliers = count_inliers(&h, src, dst, params.inlier_threshold);
        if best.as_ref().is_none_or(|(_, b)| inliers > *b) {
            best = Some((h, inliers));
            if inliers * 10 > n * 9 {
                break;
            }
        }
    }
    best
}

impl ReferenceMatcher {
    pub fn new(params: ReferenceParams) -> Result<Self, IdentityError> {
        let (_, test_pairs) =
            brief(&GrayImage::new(1, 1), &[], DESCRIPTOR_BITS, None).map_err(IdentityError::Descriptor)?;
        Ok(Self {
            params,
            test_pairs,
            entries: Vec::new(),
        })
    }

    /// Index every png/jpeg/webp directly inside `dir`, named by file stem.
    ///
    /// Unreadable images are skipped with a warning.
    pub fn from_dir(dir: &Path, params: ReferenceParams) -> Result<Self, IdentityError> {
        let mut matcher = Self::new(params)?;
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if is_reference_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let Some(name) = reference_name(&path) else {
                continue;
            };
            match image::open(&path) {
                Ok(img) => matcher.add(name, path, &img.to_rgb8())?,
                Err(e) => log::warn!("references: skipping {}: {e}", path.display()),
            }
        }
        log::debug!("references: {} images indexed from {}", matcher.len(), dir.display());
        Ok(matcher)
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        img: &RgbImage,
    ) -> Result<(), IdentityError> {
        let descriptors = self.describe(img)?;
        let name = name.into();
        if descriptors.len() < self.params.min_matches {
            log::debug!("references: {name} has only {} keypoints", descriptors.len());
        }
        self.entries.push(ReferenceEntry {
            name,
            path: path.into(),
            descriptors,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn params(&self) -> &ReferenceParams {
        &self.params
    }

    fn describe(&self, img: &RgbImage) -> Result<Vec<BriefDescriptor>, IdentityError> {
        let gray = working_gray(img, self.params.working_height);
        let points = keypoints(&gray, &self.params);
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let (descriptors, _) = brief(&gray, &points, DESCRIPTOR_BITS, Some(&self.test_pairs))
            .map_err(IdentityError::Descriptor)?;
        Ok(descriptors)
    }

    fn score(
        &self,
        query: &[BriefDescriptor],
        reference: &[BriefDescriptor],
    ) -> Option<(usize, usize, Homography)> {
        let mut pairs =
            match_binary_descriptors(query, reference, self.params.max_hamming, Some(self.params.seed));
        pairs.sort_by_key(|(q, r)| q.hamming_distance(r));
        pairs.truncate(self.params.top_matches);
        if pairs.len() < self.params.min_matches {
            return None;
        }
        let src: Vec<Point2<f32>> = pairs.iter().map(|(q, _)| position(q)).collect();
        let dst: Vec<Point2<f32>> = pairs.iter().map(|(_, r)| position(r)).collect();
        let (homography, inliers) = ransac_homography(&src, &dst, &self.params)?;
        Some((pairs.len(), inliers, homography))
    }

    /// Reference with the most homography inliers, if any clears the minimum.
    pub fn best_match(&self, front: &RgbImage) -> Option<ReferenceMatch> {
        if self.entries.is_empty() {
            return None;
        }
        let query = match self.describe(front) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("references: cannot describe query image: {e}");
                return None;
            }
        };

        let mut best: Option<ReferenceMatch> = None;
        for entry in &self.entries {
            let Some((matches, inliers, homography)) = self.score(&query, &entry.descriptors) else {
                continue;
            };
            log::debug!("references: {} -> {matches} matches, {inliers} inliers", entry.name);
            if inliers < self.params.min_inliers {
                continue;
            }
            if best.as_ref().is_none_or(|b| inliers > b.inliers) {
                best = Some(ReferenceMatch {
                    name: entry.name.clone(),
                    path: entry.path.clone(),
                    matches,
                    inliers,
                    homography,
                });
            }
        }
        best
    }
}
