use std::path::PathBuf;

use cardgrade_core::Game;
use image::RgbImage;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::cache::MetadataCache;
use crate::codes::{canonical_set_code, normalize_code, SetCodeEntry};
use crate::database::{CardRecord, SetRecord};
use crate::ocr::{BottomStripText, StripOcr};
use crate::reference::ReferenceMatcher;
use crate::symbols::SymbolAssets;

/// Caller-supplied identifiers; trusted over OCR when they validate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityHints {
    pub set_code: Option<String>,
    pub collector_number: Option<String>,
    pub game: Game,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    Trusted,
    Ocr,
    /// Card name from the closest reference image.
    Reference,
    #[default]
    None,
}

/// Best-effort card identity; any field may be missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardIdentity {
    pub set_code: Option<String>,
    pub set_id: Option<String>,
    pub set_name: Option<String>,
    pub era: Option<String>,
    pub border: Option<String>,
    pub language: Option<String>,
    pub card_name: Option<String>,
    pub collector_number: Option<String>,
    pub rarity: Option<String>,
    pub set_symbol_url: Option<String>,
    pub set_logo_url: Option<String>,
    pub card_image_url: Option<String>,
    pub symbol_path: Option<PathBuf>,
    pub reference_path: Option<PathBuf>,
    pub source: IdentitySource,
}

impl CardIdentity {
    pub fn is_empty(&self) -> bool {
        self.set_code.is_none() && self.set_name.is_none() && self.card_name.is_none()
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// `"025/198"` -> `"25"`; the upstream database stores bare numbers.
pub fn lookup_number(collector_number: &str) -> Option<String> {
    let head = collector_number.split('/').next()?.trim();
    let trimmed = head.trim_start_matches('0');
    match (head.is_empty(), trimmed.is_empty()) {
        (true, _) => None,
        (false, true) => Some("0".to_string()),
        (false, false) => Some(trimmed.to_string()),
    }
}

const LANGUAGE_TOKENS: &[&str] = &["EN", "JP", "JA", "DE", "FR", "IT", "ES", "PT", "KO", "ZH"];

fn language_from(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|t| LANGUAGE_TOKENS.contains(t))
        .map(|t| if t == "JA" { "jp".into() } else { t.to_ascii_lowercase() })
}

/// Joins OCR, the static code table, the cache and local symbol assets into
/// one identity.
pub struct MetadataResolver {
    cache: MetadataCache,
    ocr: Option<StripOcr>,
    symbols: Option<SymbolAssets>,
    references: Option<ReferenceMatcher>,
}

impl MetadataResolver {
    pub fn new(cache: MetadataCache) -> Self {
        Self {
            cache,
            ocr: None,
            symbols: None,
            references: None,
        }
    }

    pub fn with_ocr(mut self, ocr: StripOcr) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_symbols(mut self, symbols: SymbolAssets) -> Self {
        self.symbols = Some(symbols);
        self
    }

    pub fn with_references(mut self, references: ReferenceMatcher) -> Self {
        self.references = Some(references);
        self
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Resolve the identity of a rectified card front. Never fails.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(game = %hints.game)))]
    pub fn resolve(&self, front: &RgbImage, hints: &IdentityHints) -> CardIdentity {
        if let Some(identity) = self.resolve_trusted(hints) {
            return identity;
        }
        let identity = self.resolve_ocr(front, hints.game);
        if identity.card_name.is_some() {
            return identity;
        }
        self.resolve_reference(front, identity)
    }

    fn resolve_reference(&self, front: &RgbImage, mut identity: CardIdentity) -> CardIdentity {
        let Some(found) = self.references.as_ref().and_then(|r| r.best_match(front)) else {
            return identity;
        };
        log::info!(
            "identity: matched reference {:?} ({} inliers of {} matches)",
            found.name,
            found.inliers,
            found.matches
        );
        identity.card_name = Some(found.name);
        identity.reference_path = Some(found.path);
        if identity.source == IdentitySource::None {
            identity.source = IdentitySource::Reference;
        }
        identity
    }

    fn resolve_trusted(&self, hints: &IdentityHints) -> Option<CardIdentity> {
        let raw = hints.set_code.as_deref().and_then(non_empty)?;
        let entry = canonical_set_code(&raw, hints.game);
        let code = entry
            .map(|e| e.code.to_string())
            .unwrap_or_else(|| normalize_code(&raw));
        let set = self.remote_set(&code, entry.map_or(hints.game, |e| e.game));
        if entry.is_none() && set.is_none() {
            log::info!("identity: declared set code {raw:?} did not validate, falling back to OCR");
            return None;
        }
        let number = hints.collector_number.as_deref().and_then(non_empty);
        let card = match (&set, number.as_deref().and_then(lookup_number)) {
            (Some(s), Some(n)) => self.cache.card_in_set(&s.id, &n),
            _ => None,
        };
        let mut identity = self.assemble(Some(code), entry, set, card, None);
        identity.collector_number = identity.collector_number.or(number);
        identity.source = IdentitySource::Trusted;
        Some(identity)
    }

    fn resolve_ocr(&self, front: &RgbImage, game: Game) -> CardIdentity {
        let Some(ocr) = &self.ocr else {
            log::debug!("identity: no OCR client configured");
            return CardIdentity::default();
        };

        let bottom = ocr.read_bottom(front, game).unwrap_or_else(|e| {
            log::warn!("identity: bottom strip OCR failed: {e}");
            None
        });
        let name = ocr.read_card_name(front).unwrap_or_else(|e| {
            log::warn!("identity: title strip OCR failed: {e}");
            None
        });
        let BottomStripText {
            text,
            set_code,
            collector_number,
        } = bottom.unwrap_or_default();

        let entry = set_code.as_deref().and_then(|c| canonical_set_code(c, game));
        let set = set_code
            .as_deref()
            .and_then(|c| self.remote_set(c, entry.map_or(game, |e| e.game)));
        let card = set.as_ref().and_then(|s| {
            collector_number
                .as_deref()
                .and_then(lookup_number)
                .and_then(|n| self.cache.card_in_set(&s.id, &n))
                .or_else(|| name.as_deref().and_then(|n| self.cache.card_in_set(&s.id, n)))
        });

        let mut identity = self.assemble(set_code, entry, set, card, name);
        identity.collector_number = identity.collector_number.or(collector_number);
        identity.language = language_from(&text);
        identity.source = if identity.is_empty() {
            IdentitySource::None
        } else {
            IdentitySource::Ocr
        };
        if identity.is_empty() {
            log::info!("identity: OCR produced no usable identity");
        }
        identity
    }

    /// Only the Pokémon database is wired upstream.
    fn remote_set(&self, code: &str, game: Game) -> Option<SetRecord> {
        if game != Game::Pokemon {
            return None;
        }
        self.cache.set_by_code(code)
    }

    fn assemble(
        &self,
        code: Option<String>,
        entry: Option<SetCodeEntry>,
        set: Option<SetRecord>,
        card: Option<CardRecord>,
        ocr_name: Option<String>,
    ) -> CardIdentity {
        let mut id = CardIdentity {
            set_code: code,
            ..CardIdentity::default()
        };
        if let Some(e) = entry {
            id.set_name = Some(e.name.to_string());
            id.era = Some(e.era.to_string());
            id.border = Some(e.border().to_string());
        }
        if let Some(s) = set {
            id.set_id = non_empty(&s.id);
            id.set_name = non_empty(&s.name).or(id.set_name);
            id.era = non_empty(&s.series).or(id.era);
            id.set_symbol_url = non_empty(&s.images.symbol);
            id.set_logo_url = non_empty(&s.images.logo);
        }
        id.card_name = ocr_name;
        if let Some(c) = card {
            id.card_name = non_empty(&c.name).or(id.card_name);
            id.collector_number = non_empty(&c.number);
            id.rarity = non_empty(&c.rarity);
            id.card_image_url = non_empty(&c.images.large).or_else(|| non_empty(&c.images.small));
        }
        if let Some(symbols) = &self.symbols {
            id.symbol_path = symbols
                .find(id.set_name.as_deref(), id.set_code.as_deref())
                .map(|p| p.to_path_buf());
        }
        id
    }
}
