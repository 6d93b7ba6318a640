//! JSON configuration for the grader, with environment overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cardgrade_engine::{EngineKind, LlmGraderParams, RegressorParams};
use cardgrade_identity::{ReferenceParams, DEFAULT_CARD_DB_URL};
use cardgrade_llm::DEFAULT_BASE_URL;
use cardgrade_vision::{ColorParams, DetectorParams, QualityParams, RectifyParams};
use serde::{Deserialize, Serialize};

use crate::reconcile::ReconcileParams;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub kind: EngineKind,
    /// Weight of the regressor blended into LLM scores; 0 keeps the LLM alone.
    pub blend_alpha: f32,
    /// Scoring attempts before the grade is given up; transient failures only.
    pub attempts: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            kind: EngineKind::Regressor,
            blend_alpha: 0.0,
            attempts: 2,
        }
    }
}

/// Per-engine quality thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySection {
    pub regressor: QualityParams,
    pub llm: QualityParams,
}

impl Default for QualitySection {
    fn default() -> Self {
        Self {
            regressor: QualityParams::soft(),
            llm: QualityParams::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressorSection {
    /// ONNX weights; without them the regressor cannot run.
    pub weights: Option<PathBuf>,
    /// Companion metadata JSON; defaults to the weights path with `.json`.
    pub metadata: Option<PathBuf>,
    #[serde(flatten)]
    pub params: RegressorParams,
}

impl RegressorSection {
    pub fn metadata_path(&self) -> Option<PathBuf> {
        self.metadata
            .clone()
            .or_else(|| self.weights.as_ref().map(|w| w.with_extension("json")))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: String,
    /// Usually supplied through `OPENAI_API_KEY` rather than the file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    #[serde(flatten)]
    pub params: LlmGraderParams,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 60,
            params: LlmGraderParams::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    pub enabled: bool,
    /// Directory holding `sets.json` and `cards.json`; in-memory when unset.
    pub cache_dir: Option<PathBuf>,
    /// Card database base URL; empty disables remote lookups.
    pub remote_base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub symbols_dir: Option<PathBuf>,
    /// Known card images, named by file stem, for feature-matching identity.
    pub references_dir: Option<PathBuf>,
    pub references: ReferenceParams,
    pub ocr_model: String,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: None,
            remote_base_url: DEFAULT_CARD_DB_URL.to_string(),
            api_key: None,
            timeout_secs: 10,
            symbols_dir: None,
            references_dir: None,
            references: ReferenceParams::default(),
            ocr_model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    pub engine: EngineSection,
    pub rectify: RectifyParams,
    pub quality: QualitySection,
    pub color: ColorParams,
    pub detectors: DetectorParams,
    pub regressor: RegressorSection,
    pub llm: LlmSection,
    pub identity: IdentitySection,
    /// Where rectified fronts and edge overlays are written, when set.
    pub debug_dir: Option<PathBuf>,
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    let parsed = raw.trim().parse::<T>().ok();
    if parsed.is_none() {
        log::warn!("config: ignoring invalid {key}={raw:?}");
    }
    parsed
}

fn parse_bool(key: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            log::warn!("config: ignoring invalid {key}={raw:?}");
            None
        }
    }
}

impl GraderConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`; invalid values are logged and skipped.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CARDGRADER_ENGINE") {
            if let Some(kind) = parse_env::<EngineKind>("CARDGRADER_ENGINE", &v) {
                self.engine.kind = kind;
            }
        }
        if let Some(a) = get("CV_BLEND_ALPHA").and_then(|v| parse_env::<f32>("CV_BLEND_ALPHA", &v)) {
            self.engine.blend_alpha = a.clamp(0.0, 1.0);
        }
        if let Some(v) = get("CARDGRADER_WEIGHTS") {
            self.regressor.weights = Some(PathBuf::from(v));
        }
        if let Some(v) = get("CARDGRADER_MODEL_META") {
            self.regressor.metadata = Some(PathBuf::from(v));
        }
        if let Some(v) = get("EDGES_FALLBACK_MODE") {
            match v.parse() {
                Ok(mode) => self.regressor.params.edge_fallback = mode,
                Err(e) => log::warn!("config: ignoring EDGES_FALLBACK_MODE: {e}"),
            }
        }
        if let Some(t) = get("EDGES_OVERRIDE_THRESHOLD")
            .and_then(|v| parse_env::<f32>("EDGES_OVERRIDE_THRESHOLD", &v))
        {
            self.regressor.params.edge_threshold = t;
        }
        if let Some(b) = get("OVERALL_ZERO_IF_ANY_ZERO")
            .and_then(|v| parse_bool("OVERALL_ZERO_IF_ANY_ZERO", &v))
        {
            self.regressor.params.overall_zero_if_any_zero = b;
        }

        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("OPENAI_GRADING_MODEL") {
            self.llm.params.grading_model = v;
        }
        if let Some(v) = get("OPENAI_CLASSIFY_MODEL").or_else(|| get("OPENAI_CLASSIFIER_MODEL")) {
            self.llm.params.classify_model = v.clone();
            self.identity.ocr_model = v;
        }

        if let Some(v) = get("POKEMONTCG_IO_API_KEY") {
            self.identity.api_key = Some(v);
        }
        if let Some(v) = get("CARDGRADER_CACHE_DIR") {
            self.identity.cache_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("CARDGRADER_REFERENCE_DIR") {
            self.identity.references_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("GRADING_DEBUG_DIR") {
            self.debug_dir = Some(PathBuf::from(v));
        }
    }

    pub fn reconcile_params(&self) -> ReconcileParams {
        ReconcileParams {
            blend_alpha: self.engine.blend_alpha,
            ..ReconcileParams::default()
        }
    }

    /// Quality thresholds for the configured engine.
    pub fn quality_for(&self, kind: EngineKind) -> &QualityParams {
        match kind {
            EngineKind::Regressor => &self.quality.regressor,
            EngineKind::Llm => &self.quality.llm,
        }
    }
}
