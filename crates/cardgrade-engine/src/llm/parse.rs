//! Lenient readers for the gate and grade replies.
//!
//! Model output is untrusted: numbers may arrive as strings, booleans as
//! "yes", observations as bare strings. Everything here degrades to a
//! documented default instead of failing.

use cardgrade_core::{Category, Observation, ScoreVector, Side};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideLabel {
    Front,
    Back,
    #[default]
    Unknown,
}

impl SideLabel {
    fn parse(v: Option<&Value>) -> Self {
        match v.and_then(Value::as_str).map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "front" => SideLabel::Front,
            Some(s) if s == "back" => SideLabel::Back,
            _ => SideLabel::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoQuality {
    #[default]
    Low,
    Medium,
    High,
}

impl PhotoQuality {
    fn parse(v: Option<&Value>) -> Self {
        match v.and_then(Value::as_str).map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "high" => PhotoQuality::High,
            Some(s) if s == "medium" => PhotoQuality::Medium,
            _ => PhotoQuality::Low,
        }
    }

    pub fn is_gradeable(self) -> bool {
        self != PhotoQuality::Low
    }
}

/// Gate-stage classification of the two uploads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub image_1: SideLabel,
    pub image_2: SideLabel,
    pub quality: PhotoQuality,
}

impl GateVerdict {
    /// Missing keys read as `unknown` sides and `low` quality.
    pub fn from_value(v: &Value) -> Self {
        let sides = v.get("detected_sides");
        Self {
            image_1: SideLabel::parse(sides.and_then(|s| s.get("image_1"))),
            image_2: SideLabel::parse(sides.and_then(|s| s.get("image_2"))),
            quality: PhotoQuality::parse(v.get("image_quality")),
        }
    }

    pub fn is_front_back(&self) -> bool {
        self.image_1 == SideLabel::Front && self.image_2 == SideLabel::Back
    }

    pub fn is_back_front(&self) -> bool {
        self.image_1 == SideLabel::Back && self.image_2 == SideLabel::Front
    }

    pub fn is_one_of_each(&self) -> bool {
        self.is_front_back() || self.is_back_front()
    }
}

/// Number or numeric string; anything else (or non-finite) reads as 0.
pub fn lenient_f32(v: Option<&Value>) -> f32 {
    let x = match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if x.is_finite() {
        x as f32
    } else {
        0.0
    }
}

pub fn lenient_bool(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|x| x != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

fn lenient_string(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn parse_side(v: Option<&Value>) -> Side {
    match v.and_then(Value::as_str).map(|s| s.trim().to_ascii_lowercase()) {
        Some(s) if s == "front" => Side::Front,
        Some(s) if s == "back" => Side::Back,
        _ => Side::Unknown,
    }
}

fn parse_box(v: Option<&Value>) -> Option<[f32; 4]> {
    let arr = v?.as_array()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0f32; 4];
    for (slot, x) in out.iter_mut().zip(arr) {
        *slot = x.as_f64().filter(|f| f.is_finite())? as f32;
    }
    Some(out)
}

/// Only objects that name a category count as observations.
fn parse_observation(v: &Value) -> Option<Observation> {
    let obj: &Map<String, Value> = v.as_object()?;
    let category = obj.get("category")?.as_str()?.trim();
    if category.is_empty() {
        return None;
    }
    let category = Category::parse(category)
        .map(|c| c.as_str().to_string())
        .unwrap_or_else(|| category.to_ascii_lowercase());
    Some(Observation {
        category,
        side: parse_side(obj.get("side")),
        note: lenient_string(obj.get("note")),
        region: parse_box(obj.get("box")),
    })
}

pub const GEM_MINT_LABEL: &str = "PSA 10 (Gem Mint)";

/// The normalized grade reply.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeReply {
    pub scores: ScoreVector,
    pub predicted_label: String,
    pub needs_better_photos: bool,
    pub photo_feedback: String,
    pub observations: Vec<Observation>,
    /// Observation entries that were present but not well formed.
    pub dropped_observations: usize,
    pub summary: String,
    pub evidence_override: bool,
}

impl GradeReply {
    pub fn from_value(v: &Value) -> Self {
        let s = v.get("scores");
        let sub = |c: Category| lenient_f32(s.and_then(|s| s.get(c.as_str())));
        let scores = ScoreVector {
            centering: sub(Category::Centering),
            surface: sub(Category::Surface),
            edges: sub(Category::Edges),
            corners: sub(Category::Corners),
            color: sub(Category::Color),
            overall: lenient_f32(v.get("predicted_grade")),
        };

        let raw_obs = v
            .get("observations")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let observations: Vec<Observation> = raw_obs.iter().filter_map(parse_observation).collect();

        Self {
            scores,
            predicted_label: lenient_string(v.get("predicted_label")),
            needs_better_photos: lenient_bool(v.get("needs_better_photos")),
            photo_feedback: lenient_string(v.get("photo_feedback")),
            dropped_observations: raw_obs.len() - observations.len(),
            observations,
            summary: lenient_string(v.get("summary")),
            evidence_override: false,
        }
    }

    /// No concrete observation means no deduction: force Gem Mint.
    pub fn enforce_observation_guard(mut self) -> Self {
        if self.needs_better_photos || !self.observations.is_empty() {
            return self;
        }
        if self.scores != ScoreVector::perfect() {
            log::info!(
                "llm grader: no concrete observations, overriding {:?} to perfect",
                self.scores.to_array()
            );
        }
        self.scores = ScoreVector::perfect();
        if self.predicted_label.is_empty() {
            self.predicted_label = GEM_MINT_LABEL.to_string();
        }
        self.evidence_override = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gate_defaults_to_unknown_and_low() {
        let g = GateVerdict::from_value(&json!({}));
        assert_eq!(g.image_1, SideLabel::Unknown);
        assert_eq!(g.quality, PhotoQuality::Low);
        assert!(!g.is_one_of_each());

        let g = GateVerdict::from_value(&json!({
            "detected_sides": {"image_1": "BACK", "image_2": " front "},
            "image_quality": "Medium"
        }));
        assert!(g.is_back_front());
        assert!(g.quality.is_gradeable());
    }

    #[test]
    fn numbers_parse_leniently() {
        assert_eq!(lenient_f32(Some(&json!("8.5"))), 8.5);
        assert_eq!(lenient_f32(Some(&json!(7))), 7.0);
        assert_eq!(lenient_f32(Some(&json!("n/a"))), 0.0);
        assert_eq!(lenient_f32(None), 0.0);
        assert!(lenient_bool(Some(&json!("yes"))));
        assert!(!lenient_bool(Some(&json!(null))));
    }

    #[test]
    fn only_categorized_objects_are_observations() {
        let reply = GradeReply::from_value(&json!({
            "scores": {"centering": "9", "surface": 8, "edges": 8.5, "corners": 8, "color": 9},
            "predicted_grade": 8,
            "observations": [
                {"category": "Corner", "side": "front", "note": "top-left whitening", "box": [10, 10, 40, 40]},
                {"note": "looks worn"},
                "scratch somewhere",
                {"category": "", "note": "blank"}
            ],
            "summary": "  light corner wear "
        }));
        assert_eq!(reply.observations.len(), 1);
        assert_eq!(reply.dropped_observations, 3);
        let o = &reply.observations[0];
        assert_eq!(o.category, "corners");
        assert_eq!(o.side, Side::Front);
        assert_eq!(o.region, Some([10.0, 10.0, 40.0, 40.0]));
        assert_eq!(reply.summary, "light corner wear");
        assert_eq!(reply.scores.centering, 9.0);

        let guarded = reply.clone().enforce_observation_guard();
        assert_eq!(guarded, reply);
    }

    #[test]
    fn deductions_without_evidence_become_perfect() {
        let reply = GradeReply::from_value(&json!({
            "scores": {"centering": 7, "surface": 6, "edges": 7, "corners": 7, "color": 8},
            "predicted_grade": 7,
            "observations": [{"note": "some wear"}]
        }))
        .enforce_observation_guard();
        assert_eq!(reply.scores, ScoreVector::perfect());
        assert_eq!(reply.predicted_label, GEM_MINT_LABEL);
        assert!(reply.evidence_override);
    }

    #[test]
    fn photo_rejection_is_not_overridden() {
        let reply = GradeReply::from_value(&json!({
            "needs_better_photos": true,
            "photo_feedback": "too much glare"
        }))
        .enforce_observation_guard();
        assert_eq!(reply.scores, ScoreVector::zero());
        assert!(!reply.evidence_override);
    }
}
