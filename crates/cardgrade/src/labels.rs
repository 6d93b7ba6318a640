//! Ordinal grade labels.

const LABELS: [&str; 10] = [
    "POOR",
    "GOOD (Good)",
    "VG (Very Good)",
    "VG-EX (Very Good-Excellent)",
    "EX (Excellent)",
    "EX-MT (Excellent-Mint)",
    "NM (Near Mint)",
    "NM-MT (Near Mint-Mint)",
    "MINT (Mint)",
    "GEM MT (Gem Mint)",
];

/// Integer bucket for an overall grade: nearest integer, clamped to `1..=10`.
pub fn grade_bucket(overall: f32) -> u8 {
    if !overall.is_finite() {
        return 1;
    }
    overall.round().clamp(1.0, 10.0) as u8
}

pub fn grade_label(overall: f32) -> &'static str {
    LABELS[grade_bucket(overall) as usize - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_round_to_nearest() {
        assert_eq!(grade_label(9.6), "GEM MT (Gem Mint)");
        assert_eq!(grade_label(8.4), "NM-MT (Near Mint-Mint)");
        assert_eq!(grade_label(8.5), "MINT (Mint)");
        assert_eq!(grade_label(1.2), "POOR");
    }

    #[test]
    fn out_of_range_is_clamped() {
        assert_eq!(grade_bucket(0.0), 1);
        assert_eq!(grade_bucket(12.0), 10);
        assert_eq!(grade_bucket(f32::NAN), 1);
    }
}
