//! User-facing summary composed only from final numbers and detector flags.

use std::fmt::Write;

use cardgrade_core::{Category, ScoreVector};
use cardgrade_vision::DetectorReport;

use crate::labels::grade_label;

fn describe(score: f32) -> &'static str {
    match score {
        s if s >= 9.5 => "pristine",
        s if s >= 8.5 => "excellent",
        s if s >= 7.0 => "minor flaws",
        s if s >= 5.0 => "noticeable wear",
        s if s >= 3.0 => "heavy wear",
        _ => "severe damage",
    }
}

fn title(c: Category) -> &'static str {
    match c {
        Category::Centering => "Centering",
        Category::Surface => "Surface",
        Category::Edges => "Edges",
        Category::Corners => "Corners",
        Category::Color => "Color",
    }
}

/// Markdown summary; empty when the attempt produced no grade.
pub fn compose_summary(scores: &ScoreVector, detectors: &DetectorReport, needs_better_photos: bool) -> String {
    if needs_better_photos {
        return String::new();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "**Overall {:.1}** ({})",
        scores.overall,
        grade_label(scores.overall)
    );
    out.push('\n');
    for c in Category::ALL {
        let v = scores.get(c);
        let _ = writeln!(out, "- {}: {:.1} ({})", title(c), v, describe(v));
    }

    let weakest = Category::ALL
        .into_iter()
        .min_by(|a, b| scores.get(*a).total_cmp(&scores.get(*b)));
    if let Some(c) = weakest.filter(|c| scores.get(*c) < 9.5) {
        let _ = write!(out, "\nLowest sub-score: {}.", title(c).to_ascii_lowercase());
    }

    let mut flags = Vec::new();
    if detectors.scribble.flagged {
        flags.push(format!(
            "ink or writing detected (confidence {:.2})",
            detectors.scribble.confidence
        ));
    }
    if detectors.edge_chips.flagged {
        flags.push(format!(
            "edge chipping estimated at {:.1}% of the border",
            detectors.edge_estimate.chip_ratio * 100.0
        ));
    }
    if !flags.is_empty() {
        let _ = write!(out, "\nDetector notes: {}.", flags.join("; "));
    }
    out.trim_end().to_string()
}
