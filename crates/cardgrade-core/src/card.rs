use serde::{Deserialize, Serialize};

/// Physical width of a standard trading card, in millimetres.
pub const CARD_WIDTH_MM: f32 = 63.0;
/// Physical height of a standard trading card, in millimetres.
pub const CARD_HEIGHT_MM: f32 = 88.0;
/// Portrait width / height ratio of the canonical canvas.
pub const CARD_ASPECT: f32 = CARD_WIDTH_MM / CARD_HEIGHT_MM;

/// Pixel dimensions of a canonical (portrait) card canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    /// Canvas whose short side is `short` pixels and whose long side follows the card aspect.
    pub fn for_short_side(short: u32) -> Self {
        let short = short.max(1);
        let long = (short as f32 * CARD_HEIGHT_MM / CARD_WIDTH_MM).round() as u32;
        Self {
            width: short,
            height: long.max(1),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn min_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_follows_card_aspect() {
        let c = CanvasSize::for_short_side(1000);
        assert_eq!(c.width, 1000);
        assert_eq!(c.height, 1397);
        assert!((c.aspect() - CARD_ASPECT).abs() < 1e-3);
    }

    #[test]
    fn zero_short_side_is_clamped() {
        let c = CanvasSize::for_short_side(0);
        assert!(c.width >= 1 && c.height >= 1);
    }
}
