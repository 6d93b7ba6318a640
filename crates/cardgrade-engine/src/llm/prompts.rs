use cardgrade_core::Game;

/// What the back of each game's card looks like.
fn back_rules(game: Game) -> &'static str {
    match game {
        Game::Pokemon => {
            "Pokémon backs are the blue design with the Poké Ball and the 'Pokémon' logo; \
             fronts show artwork, attack text boxes, the set symbol and collector number."
        }
        Game::OnePiece => {
            "One Piece Card Game backs show the ONE PIECE logo on a uniform patterned field \
             (DON!! cards carry the DON!! back); fronts show character artwork, cost, power \
             and a text box."
        }
        Game::Mtg => {
            "Magic: The Gathering backs are the brown oval 'Deckmaster' design with the five \
             colored mana orbs; fronts show the title line, mana cost, art box, type line and \
             rules text."
        }
    }
}

pub fn gate_system_prompt(game: Game) -> String {
    format!(
        "You are a strict intake checker for {title} card photos.\n\
         You will receive two images. For each image, decide if it shows a card FRONT or card BACK.\n\
         Rules of thumb: {rules}\n\
         Also rate overall photo quality as 'low'|'medium'|'high'.\n\
         Return STRICT JSON ONLY:\n\
         {{\n\
         \x20 \"detected_sides\": {{\"image_1\":\"front|back|unknown\", \"image_2\":\"front|back|unknown\"}},\n\
         \x20 \"image_quality\": \"low|medium|high\"\n\
         }}\n",
        title = game.title(),
        rules = back_rules(game),
    )
}

pub const GATE_USER_PROMPT: &str = "Classify these two images (order matters).";
pub const GATE_MISSING_SECOND: &str = " Second image is missing.";

pub fn grade_system_prompt(game: Game) -> String {
    format!(
        "You are a meticulous pre-grader for {title} cards (PSA-like 1..10; 10=Gem Mint).\n\
         You will receive FRONT then BACK images of the same card. Do not deduct unless you can \
         name at least one concrete, visible observation.\n\
         {rules}\n\
         PROCESS (mandatory):\n\
         - Split each image into a 5x5 grid; scan top to bottom, left to right.\n\
         - Centering: estimate border thickness on all four sides, front weighted more, back too; \
         report off-center directions.\n\
         - Surface: look for print lines, scratches, stains, dents/dimples, specks; distinguish \
         true defects from glare or noise.\n\
         - Edges: zoom along all edges for whitening or chips; do not confuse holo sparkle or \
         noise with wear.\n\
         - Corners: zoom on all four corners for rounding, fray, whitening.\n\
         - Color: check fading, yellowing, oversaturation, uneven tones.\n\
         HARD CAPS:\n\
         - Ink, writing or marker anywhere on the card: overall at most 3.\n\
         - Creases, bends, tears or paper loss: overall at most 4.\n\
         - Any visible wear: no 9 or 10; overall at most 8.\n\
         - If anything prevents accurate grading (blurry, glare, crop, two fronts or two backs), \
         set needs_better_photos=true, return zeroes for scores and give clear photo_feedback.\n\
         - If pristine (no valid observations of wear) and borders are excellent, Gem Mint (10) \
         is allowed.\n\
         Every deduction must cite an observation with category, side, a short note and a box.\n\n\
         OUTPUT STRICT JSON ONLY:\n\
         {{\n\
         \x20 \"scores\": {{\"centering\": number, \"surface\": number, \"edges\": number, \"corners\": number, \"color\": number}},\n\
         \x20 \"predicted_grade\": number,\n\
         \x20 \"predicted_label\": string,\n\
         \x20 \"needs_better_photos\": boolean,\n\
         \x20 \"photo_feedback\": string,\n\
         \x20 \"observations\": [\n\
         \x20   {{\"category\":\"centering|surface|edges|corners|color\",\"side\":\"front|back\",\"note\":\"short detail\",\"box\":[x0,y0,x1,y1]}}\n\
         \x20 ],\n\
         \x20 \"summary\": string\n\
         }}\n",
        title = game.title(),
        rules = back_rules(game),
    )
}

pub const GRADE_USER_PROMPT: &str = "FRONT then BACK of the same card. Grade per instructions.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_vary_by_game() {
        let p = gate_system_prompt(Game::Pokemon);
        let m = gate_system_prompt(Game::Mtg);
        assert!(p.contains("Poké Ball"));
        assert!(m.contains("Deckmaster"));
        assert!(p.contains("\"detected_sides\""));
    }

    #[test]
    fn grade_prompt_carries_contract() {
        let g = grade_system_prompt(Game::OnePiece);
        assert!(g.contains("5x5 grid"));
        assert!(g.contains("overall at most 3"));
        assert!(g.contains("\"observations\""));
        assert!(g.contains("One Piece"));
    }
}
