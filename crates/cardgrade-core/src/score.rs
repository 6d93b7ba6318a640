use serde::{Deserialize, Serialize};
use std::fmt;

pub const SCORE_MIN: f32 = 0.0;
pub const SCORE_MAX: f32 = 10.0;

/// Graded condition categories, in Score Vector order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Centering,
    Surface,
    Edges,
    Corners,
    Color,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Centering,
        Category::Surface,
        Category::Edges,
        Category::Corners,
        Category::Color,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Centering => "centering",
            Category::Surface => "surface",
            Category::Edges => "edges",
            Category::Corners => "corners",
            Category::Color => "color",
        }
    }

    /// Lenient parse of free-text category names ("Corner", "colour", ...).
    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_ascii_lowercase();
        match key.as_str() {
            "centering" | "centre" | "center" | "centring" => Some(Category::Centering),
            "surface" => Some(Category::Surface),
            "edges" | "edge" => Some(Category::Edges),
            "corners" | "corner" => Some(Category::Corners),
            "color" | "colour" | "colors" => Some(Category::Color),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six-element grade: five sub-scores plus the overall grade, all on a 0..=10 scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreVector {
    pub centering: f32,
    pub surface: f32,
    pub edges: f32,
    pub corners: f32,
    pub color: f32,
    pub overall: f32,
}

impl ScoreVector {
    pub const fn uniform(v: f32) -> Self {
        Self {
            centering: v,
            surface: v,
            edges: v,
            corners: v,
            color: v,
            overall: v,
        }
    }

    pub const fn zero() -> Self {
        Self::uniform(SCORE_MIN)
    }

    pub const fn perfect() -> Self {
        Self::uniform(SCORE_MAX)
    }

    /// Build from `[centering, surface, edges, corners, color, overall]`.
    pub fn from_array(v: [f32; 6]) -> Self {
        Self {
            centering: v[0],
            surface: v[1],
            edges: v[2],
            corners: v[3],
            color: v[4],
            overall: v[5],
        }
    }

    pub fn to_array(&self) -> [f32; 6] {
        [
            self.centering,
            self.surface,
            self.edges,
            self.corners,
            self.color,
            self.overall,
        ]
    }

    pub fn get(&self, c: Category) -> f32 {
        match c {
            Category::Centering => self.centering,
            Category::Surface => self.surface,
            Category::Edges => self.edges,
            Category::Corners => self.corners,
            Category::Color => self.color,
        }
    }

    pub fn get_mut(&mut self, c: Category) -> &mut f32 {
        match c {
            Category::Centering => &mut self.centering,
            Category::Surface => &mut self.surface,
            Category::Edges => &mut self.edges,
            Category::Corners => &mut self.corners,
            Category::Color => &mut self.color,
        }
    }

    pub fn set(&mut self, c: Category, v: f32) {
        *self.get_mut(c) = v;
    }

    pub fn subscores(&self) -> [f32; 5] {
        Category::ALL.map(|c| self.get(c))
    }

    pub fn min_subscore(&self) -> f32 {
        self.subscores().into_iter().fold(f32::INFINITY, f32::min)
    }

    pub fn mean_subscore(&self) -> f32 {
        self.subscores().iter().sum::<f32>() / Category::ALL.len() as f32
    }

    /// Apply `f` element-wise to all six values.
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self::from_array(self.to_array().map(f))
    }

    /// Clamp every element into `[0, 10]`; non-finite values collapse to 0.
    pub fn clamped(self) -> Self {
        self.map(|v| {
            if v.is_finite() {
                v.clamp(SCORE_MIN, SCORE_MAX)
            } else {
                SCORE_MIN
            }
        })
    }

    pub fn is_in_range(&self) -> bool {
        self.to_array()
            .iter()
            .all(|v| v.is_finite() && (SCORE_MIN..=SCORE_MAX).contains(v))
    }
}

/// Which face of the card an observation refers to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Front,
    Back,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A concrete, localized defect observation cited as evidence for a deduction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub side: Side,
    #[serde(default)]
    pub note: String,
    /// Box in the cited image as reported by the grader, when given.
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub region: Option<[f32; 4]>,
}

impl Observation {
    pub fn new(category: Category, side: Side, note: impl Into<String>) -> Self {
        Self {
            category: category.as_str().to_string(),
            side,
            note: note.into(),
            region: None,
        }
    }

    pub fn with_region(mut self, region: [f32; 4]) -> Self {
        self.region = Some(region);
        self
    }

    /// An observation counts as concrete evidence only when it names a category.
    pub fn is_concrete(&self) -> bool {
        !self.category.trim().is_empty()
    }

    pub fn parsed_category(&self) -> Option<Category> {
        Category::parse(&self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_order_matches_categories() {
        let v = ScoreVector::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(v.get(Category::Centering), 1.0);
        assert_eq!(v.get(Category::Color), 5.0);
        assert_eq!(v.overall, 6.0);
        assert_eq!(v.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn clamped_handles_out_of_range_and_nan() {
        let v = ScoreVector::from_array([-1.0, 11.0, f32::NAN, 5.0, f32::INFINITY, 9.5]).clamped();
        assert_eq!(v.to_array(), [0.0, 10.0, 0.0, 5.0, 0.0, 9.5]);
        assert!(v.is_in_range());
    }

    #[test]
    fn mean_and_min_ignore_overall() {
        let v = ScoreVector::from_array([8.0, 6.0, 10.0, 8.0, 8.0, 0.0]);
        assert_eq!(v.min_subscore(), 6.0);
        assert!((v.mean_subscore() - 8.0).abs() < 1e-6);
    }

    #[test]
    fn observation_parses_box_and_unknown_side() {
        let o: Observation = serde_json::from_str(
            r#"{"category":"Corners","side":"sideways","note":"whitening","box":[0.1,0.2,0.05,0.05]}"#,
        )
        .unwrap();
        assert!(o.is_concrete());
        assert_eq!(o.side, Side::Unknown);
        assert_eq!(o.parsed_category(), Some(Category::Corners));
        assert_eq!(o.region, Some([0.1, 0.2, 0.05, 0.05]));
    }

    #[test]
    fn empty_category_is_not_concrete() {
        let o: Observation = serde_json::from_str(r#"{"note":"looks worn"}"#).unwrap();
        assert!(!o.is_concrete());
    }
}
