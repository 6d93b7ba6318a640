//! Result reconciliation: detector signals and text heuristics applied on top
//! of an engine's scores.
//!
//! Rules run in a fixed order:
//!
//! 1. **Evidence floor**: fewer than `min_observations` concrete observations
//!    and none high-impact lifts every non-centering sub-score and the
//!    overall grade to `observation_floor`.
//! 2. **Keyword caps** on the summary and observation notes (ink 7.5,
//!    crease/bend/tear 4.0, heavy/obvious 7.5, wear at 9+ down to 8.0).
//! 3. **Detector override**: a confident scribble detection caps surface and
//!    overall; a borderline one costs a point of surface. Ink mentioned in
//!    text and corroborated by the detector caps overall at 3.0. Glare and
//!    blur only add photo advice.
//! 4. **Blend** with regressor scores when `blend_alpha > 0`.
//! 5. **Label and summary** from the final numbers.
//!
//! Steps 1 and 2 apply only to engines that cite observations. The keyword
//! caps are string matching on model prose; structured defect fields would be
//! the sturdier replacement.

use cardgrade_core::{Category, Observation, ScoreVector, Side};
use cardgrade_engine::EngineOutput;
use cardgrade_vision::DetectorReport;
use serde::{Deserialize, Serialize};

use crate::labels::grade_label;
use crate::summary::compose_summary;

pub const UNGRADED_LABEL: &str = "N/A";

const INK_TERMS: &[&str] = &[
    "ink", "inked", "writing", "written", "marker", "pen", "signature", "signed", "scribble",
    "scribbles", "doodle",
];
const DAMAGE_TERMS: &[&str] = &[
    "crease", "creases", "creased", "bend", "bends", "bent", "tear", "tears", "torn", "paper loss",
];
const SEVERITY_TERMS: &[&str] = &[
    "heavy", "heavily", "obvious", "large", "significant", "significantly",
];
const WEAR_TERMS: &[&str] = &[
    "wear", "worn", "whitening", "scuff", "scuffs", "scuffing", "scratch", "scratches", "chip",
    "chips", "chipping", "fray", "frayed", "rounding", "rounded", "dent", "dented",
];
const HIGH_IMPACT_TERMS: &[&str] = &["crease", "creases", "creased", "dent", "dents", "deep scratch"];

const INK_SOFT_CAP: f32 = 7.5;
const INK_CORROBORATED_CAP: f32 = 3.0;
const DAMAGE_CAP: f32 = 4.0;
const SEVERITY_CAP: f32 = 7.5;
const WEAR_CAP: f32 = 8.0;
const WEAR_TRIGGER: f32 = 9.0;
const SCRIBBLE_SURFACE_CAP: f32 = 2.0;
const SCRIBBLE_OVERALL_CAP: f32 = 3.0;
const SCRIBBLE_SOFT_PENALTY: f32 = 1.0;

pub const SCRIBBLE_NOTE: &str = "Ink or writing detected on the card surface by image analysis.";
const GLARE_ADVICE: &str = "Glare detected; tilt the card or move the light to avoid reflections.";
const BLUR_ADVICE: &str = "Image looks soft; hold the camera steady and make sure the card is in focus.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileParams {
    pub observation_floor: f32,
    pub min_observations: usize,
    /// Weight of the regressor in `(1 - a) * llm + a * cv`; 0 disables blending.
    pub blend_alpha: f32,
    pub scribble_hard_confidence: f32,
    pub scribble_soft_confidence: f32,
}

impl Default for ReconcileParams {
    fn default() -> Self {
        Self {
            observation_floor: 9.5,
            min_observations: 2,
            blend_alpha: 0.0,
            scribble_hard_confidence: 0.88,
            scribble_soft_confidence: 0.55,
        }
    }
}

/// The reconciled grade plus an audit trail of applied rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reconciled {
    pub scores: ScoreVector,
    pub label: String,
    pub summary: String,
    pub needs_better_photos: bool,
    pub photo_feedback: String,
    pub observations: Vec<Observation>,
    pub adjustments: Vec<String>,
}

/// Lowercase words joined by single spaces, padded so phrases match on word boundaries.
fn word_text(parts: &[&str]) -> String {
    let mut out = String::from(" ");
    for part in parts {
        for word in part
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            out.push_str(&word.to_lowercase());
            out.push(' ');
        }
    }
    out
}

fn mentions_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(&format!(" {t} ")))
}

fn cap(value: &mut f32, limit: f32) -> bool {
    if *value > limit {
        *value = limit;
        true
    } else {
        false
    }
}

fn push_advice(feedback: &mut String, advice: &str) {
    if feedback.contains(advice) {
        return;
    }
    if !feedback.is_empty() {
        feedback.push(' ');
    }
    feedback.push_str(advice);
}

fn scribble_observation(report: &DetectorReport) -> Observation {
    let obs = Observation::new(Category::Surface, Side::Front, SCRIBBLE_NOTE);
    match report.scribble.evidence.first() {
        Some(r) => obs.with_region(r.to_array()),
        None => obs,
    }
}

pub fn reconcile(
    engine: &EngineOutput,
    detectors: &DetectorReport,
    blend: Option<&ScoreVector>,
    params: &ReconcileParams,
) -> Reconciled {
    if engine.needs_better_photos {
        return Reconciled {
            scores: ScoreVector::zero(),
            label: UNGRADED_LABEL.to_string(),
            summary: String::new(),
            needs_better_photos: true,
            photo_feedback: engine.photo_feedback.clone(),
            observations: engine.observations.clone().unwrap_or_default(),
            adjustments: vec!["needs_better_photos: all scores zeroed".into()],
        };
    }

    let mut s = engine.scores.clamped();
    let mut adjustments = Vec::new();
    let mut observations = engine.observations.clone().unwrap_or_default();
    let mut feedback = engine.photo_feedback.clone();

    let notes: Vec<&str> = observations.iter().map(|o| o.note.as_str()).collect();
    let mut parts = vec![engine.summary.as_str()];
    parts.extend(notes);
    let text = word_text(&parts);

    let mut ink_mentioned = false;
    if let Some(obs) = &engine.observations {
        // 1. evidence floor
        let concrete = obs.iter().filter(|o| o.is_concrete()).count();
        if concrete < params.min_observations && !mentions_any(&text, HIGH_IMPACT_TERMS) {
            let floor = params.observation_floor;
            let mut lifted = false;
            for c in [Category::Surface, Category::Edges, Category::Corners, Category::Color] {
                let v = s.get_mut(c);
                if *v < floor {
                    *v = floor;
                    lifted = true;
                }
            }
            if s.overall < floor {
                s.overall = floor;
                lifted = true;
            }
            if lifted {
                adjustments.push(format!(
                    "evidence floor: {concrete} concrete observation(s), lifted to {floor:.1}"
                ));
            }
        }

        // 2. keyword caps
        if !engine.evidence_override {
            ink_mentioned = mentions_any(&text, INK_TERMS);
            if ink_mentioned && cap(&mut s.overall, INK_SOFT_CAP) {
                adjustments.push(format!("ink mentioned: overall capped at {INK_SOFT_CAP:.1}"));
            }
            if mentions_any(&text, DAMAGE_TERMS) && cap(&mut s.overall, DAMAGE_CAP) {
                adjustments.push(format!("crease/bend/tear mentioned: overall capped at {DAMAGE_CAP:.1}"));
            }
            if mentions_any(&text, SEVERITY_TERMS) && cap(&mut s.overall, SEVERITY_CAP) {
                adjustments.push(format!("severe wording: overall capped at {SEVERITY_CAP:.1}"));
            }
            if s.overall >= WEAR_TRIGGER && mentions_any(&text, WEAR_TERMS) && cap(&mut s.overall, WEAR_CAP) {
                adjustments.push(format!("visible wear at a 9+ grade: overall capped at {WEAR_CAP:.1}"));
            }
        }
    }

    // 3. detector override
    let scribble = &detectors.scribble;
    // Hard caps need the detector's own stroke-count and ink-ratio gates.
    let hard_scribble =
        scribble.flagged && scribble.confidence >= params.scribble_hard_confidence;
    if hard_scribble {
        cap(&mut s.surface, SCRIBBLE_SURFACE_CAP);
        cap(&mut s.overall, SCRIBBLE_OVERALL_CAP);
        observations.push(scribble_observation(detectors));
        adjustments.push(format!(
            "scribble detector {:.2}: surface <= {SCRIBBLE_SURFACE_CAP:.1}, overall <= {SCRIBBLE_OVERALL_CAP:.1}",
            scribble.confidence
        ));
    } else if scribble.confidence >= params.scribble_soft_confidence {
        s.surface = (s.surface - SCRIBBLE_SOFT_PENALTY).max(0.0);
        adjustments.push(format!(
            "scribble detector {:.2}: surface -{SCRIBBLE_SOFT_PENALTY:.1}",
            scribble.confidence
        ));
    }
    let corroborated = scribble.flagged || scribble.confidence >= params.scribble_soft_confidence;
    if ink_mentioned && corroborated && cap(&mut s.overall, INK_CORROBORATED_CAP) {
        adjustments.push(format!(
            "ink mentioned and corroborated by detector: overall capped at {INK_CORROBORATED_CAP:.1}"
        ));
    }
    if detectors.glare.flagged {
        push_advice(&mut feedback, GLARE_ADVICE);
    }
    if detectors.blur.flagged {
        push_advice(&mut feedback, BLUR_ADVICE);
    }

    // 4. blend
    if let Some(cv) = blend.filter(|_| params.blend_alpha > 0.0) {
        let a = params.blend_alpha.clamp(0.0, 1.0);
        let cv = cv.clamped();
        s = ScoreVector::from_array(std::array::from_fn(|i| {
            (1.0 - a) * s.to_array()[i] + a * cv.to_array()[i]
        }));
        adjustments.push(format!("blended with regressor at alpha {a:.2}"));
        if hard_scribble {
            cap(&mut s.surface, SCRIBBLE_SURFACE_CAP);
            cap(&mut s.overall, SCRIBBLE_OVERALL_CAP);
        }
    }

    // 5. label and summary
    let scores = s.clamped();
    Reconciled {
        label: grade_label(scores.overall).to_string(),
        summary: compose_summary(&scores, detectors, false),
        scores,
        needs_better_photos: false,
        photo_feedback: feedback,
        observations,
        adjustments,
    }
}
