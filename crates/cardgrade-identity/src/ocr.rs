//! Strip OCR through a vision-language model.

use std::sync::{Arc, OnceLock};

use cardgrade_core::{crop_fraction, Game, Roi};
use cardgrade_llm::{parse_json_reply, png_data_url, ChatRequest, LlmError, VisionClient};
use image::RgbImage;
use regex::Regex;
use serde::Deserialize;

use crate::codes::{canonical_set_code, normalize_code};

/// Bottom strip carrying set code and collector number.
pub const BOTTOM_STRIP: Roi = Roi {
    x0: 0.05,
    x1: 0.95,
    y0: 0.88,
    y1: 0.98,
};

/// Top strip carrying the card title.
pub const TOP_STRIP: Roi = Roi {
    x0: 0.05,
    x1: 0.95,
    y0: 0.03,
    y1: 0.12,
};

const SET_CODE_PROMPT: &str = "\
This image is the bottom strip of a trading card. Read the set code printed there \
(a short code such as SVI, PAL or OP05) together with the collector number if visible \
(for example 123/198), exactly as printed.\n\
Return STRICT JSON ONLY: {\"set_code\": \"...\"}. Use an empty string if nothing is legible.";

const CARD_NAME_PROMPT: &str = "\
This image is the title strip of a trading card. Read the card name exactly as printed, \
without HP, stage or type symbols.\n\
Return STRICT JSON ONLY: {\"card_name\": \"...\"}. Use an empty string if nothing is legible.";

#[derive(Deserialize)]
struct SetCodeReply {
    #[serde(default)]
    set_code: String,
}

#[derive(Deserialize)]
struct CardNameReply {
    #[serde(default)]
    card_name: String,
}

/// What the bottom strip yielded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BottomStripText {
    /// Whitespace/punctuation-normalized text returned by the model.
    pub text: String,
    /// Best code token, canonical when it matched the table.
    pub set_code: Option<String>,
    /// `"123/198"` style collector number.
    pub collector_number: Option<String>,
}

fn number_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,3})\s*/\s*(\d{1,3})\b").ok())
        .as_ref()
}

fn code_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z0-9]{2,5}\b").ok())
        .as_ref()
}

/// Uppercase, map punctuation (except `/` and `-`) to spaces and collapse runs of whitespace.
pub fn normalize_strip_text(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '/' || c == '-' {
                c.to_ascii_uppercase()
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pull the collector number and the most plausible set-code token out of strip text.
pub fn parse_bottom_text(raw: &str, game: Game) -> BottomStripText {
    let text = normalize_strip_text(raw);

    let collector_number = number_re()
        .and_then(|re| re.captures(&text))
        .map(|c| format!("{}/{}", &c[1], &c[2]));

    // Hyphenated codes such as OP-05 are joined before tokenizing.
    let joined = text.replace('-', "");
    let tokens: Vec<&str> = code_re()
        .map(|re| re.find_iter(&joined).map(|m| m.as_str()).collect())
        .unwrap_or_default();

    let set_code = tokens
        .iter()
        .find_map(|t| canonical_set_code(t, game).map(|e| e.code.to_string()))
        .or_else(|| {
            tokens
                .iter()
                .find(|t| t.chars().any(|c| c.is_ascii_alphabetic()))
                .map(|t| normalize_code(t))
        });

    BottomStripText {
        text,
        set_code,
        collector_number,
    }
}

/// Reads the bottom and top strips of a rectified card front.
#[derive(Clone)]
pub struct StripOcr {
    client: Arc<dyn VisionClient>,
    model: String,
}

impl StripOcr {
    pub fn new(client: Arc<dyn VisionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn ask(&self, strip: &RgbImage, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(self.model.clone(), prompt)
            .with_image(png_data_url(strip)?)
            .with_max_tokens(64);
        self.client.complete(&request)
    }

    pub fn read_bottom(&self, front: &RgbImage, game: Game) -> Result<Option<BottomStripText>, LlmError> {
        let Some(strip) = crop_fraction(front, BOTTOM_STRIP) else {
            return Ok(None);
        };
        let reply: SetCodeReply = parse_json_reply(&self.ask(&strip, SET_CODE_PROMPT)?)?;
        if reply.set_code.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(parse_bottom_text(&reply.set_code, game)))
    }

    pub fn read_card_name(&self, front: &RgbImage) -> Result<Option<String>, LlmError> {
        let Some(strip) = crop_fraction(front, TOP_STRIP) else {
            return Ok(None);
        };
        let reply: CardNameReply = parse_json_reply(&self.ask(&strip, CARD_NAME_PROMPT)?)?;
        let name = reply.card_name.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok((!name.is_empty()).then_some(name))
    }
}
