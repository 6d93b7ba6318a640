use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Card game whose back-of-card rules and prompt variant apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Game {
    #[default]
    Pokemon,
    OnePiece,
    Mtg,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown game hint '{0}' (expected pokemon, one_piece or mtg)")]
pub struct ParseGameError(pub String);

impl Game {
    pub const ALL: [Game; 3] = [Game::Pokemon, Game::OnePiece, Game::Mtg];

    pub fn as_str(self) -> &'static str {
        match self {
            Game::Pokemon => "pokemon",
            Game::OnePiece => "one_piece",
            Game::Mtg => "mtg",
        }
    }

    /// Human-facing title used in prompts.
    pub fn title(self) -> &'static str {
        match self {
            Game::Pokemon => "Pokémon TCG",
            Game::OnePiece => "One Piece Card Game",
            Game::Mtg => "Magic: The Gathering",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Game {
    type Err = ParseGameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "pokemon" | "ptcg" | "pkmn" => Ok(Game::Pokemon),
            "onepiece" | "op" | "optcg" => Ok(Game::OnePiece),
            "mtg" | "magic" | "magicthegathering" => Ok(Game::Mtg),
            _ => Err(ParseGameError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_spellings() {
        assert_eq!("Pokemon".parse::<Game>(), Ok(Game::Pokemon));
        assert_eq!("one-piece".parse::<Game>(), Ok(Game::OnePiece));
        assert_eq!("one_piece".parse::<Game>(), Ok(Game::OnePiece));
        assert_eq!("MTG".parse::<Game>(), Ok(Game::Mtg));
        assert!("yugioh".parse::<Game>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let s = serde_json::to_string(&Game::OnePiece).unwrap();
        assert_eq!(s, "\"one_piece\"");
    }
}
