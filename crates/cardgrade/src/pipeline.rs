//! One grading attempt, from uploaded bytes to a reconciled grade.
//!
//! ```text
//! received -> rectifying -> (rectified | fallback_canvas) -> quality_checked
//!          -> {predicting, detecting, resolving_metadata} -> reconciling -> done
//! ```
//!
//! The three middle stages run on scoped threads and are joined before
//! reconciliation. Only [`Grader::grade`]'s boundary turns a failure into an
//! outcome; that outcome has the same shape as a gate rejection.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use cardgrade_core::{Observation, ScoreVector};
use cardgrade_engine::regressor::RegressorModel;
use cardgrade_engine::{
    EngineKind, EngineOutput, LlmGrader, RegressorEngine, ScoringEngine, ScoringHints, SidePair,
};
use cardgrade_identity::{
    CardDatabase, CardIdentity, IdentityHints, MetadataCache, MetadataResolver, PokemonTcgClient,
    ReferenceMatcher, StripOcr, SymbolAssets,
};
use cardgrade_llm::{OpenAiClient, VisionClient};
use cardgrade_vision::debug::write_debug_artifacts;
use cardgrade_vision::{prepare_side, run_detectors, DetectorReport, PrepareParams, PreparedSide};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::GraderConfig;
use crate::error::GradeError;
use crate::reconcile::{reconcile, UNGRADED_LABEL};
use crate::upload::decode_upload;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeStage {
    Received,
    Rectifying,
    Rectified,
    FallbackCanvas,
    QualityChecked,
    Predicting,
    Detecting,
    ResolvingMetadata,
    Reconciling,
    Done,
    Failed,
}

/// Raw uploads plus caller hints.
#[derive(Clone, Debug, Default)]
pub struct GradeInput {
    pub front: Vec<u8>,
    pub back: Option<Vec<u8>>,
    pub hints: IdentityHints,
}

impl GradeInput {
    pub fn new(front: Vec<u8>) -> Self {
        Self {
            front,
            ..Self::default()
        }
    }

    pub fn with_back(mut self, back: Vec<u8>) -> Self {
        self.back = Some(back);
        self
    }

    pub fn with_hints(mut self, hints: IdentityHints) -> Self {
        self.hints = hints;
        self
    }
}

/// Result of one attempt. `needs_better_photos` implies all-zero scores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub engine: EngineKind,
    pub scores: ScoreVector,
    pub label: String,
    /// Markdown.
    pub summary: String,
    pub needs_better_photos: bool,
    pub photo_feedback: String,
    pub observations: Vec<Observation>,
    pub identity: CardIdentity,
    pub stages: Vec<GradeStage>,
    /// Diagnostics for persistence and audit, not for end users.
    pub raw: Value,
}

impl GradeOutcome {
    fn failure(engine: EngineKind, stages: Vec<GradeStage>, err: &GradeError) -> Self {
        Self {
            engine,
            scores: ScoreVector::zero(),
            label: UNGRADED_LABEL.to_string(),
            summary: String::new(),
            needs_better_photos: true,
            photo_feedback: err.user_message(),
            observations: Vec::new(),
            identity: CardIdentity::default(),
            stages,
            raw: json!({ "error": err.to_string() }),
        }
    }

    pub fn is_graded(&self) -> bool {
        !self.needs_better_photos
    }
}

/// Shared, read-mostly grading service: engines, resolver and configuration.
#[derive(Clone)]
pub struct Grader {
    config: GraderConfig,
    engine: Arc<dyn ScoringEngine>,
    blend: Option<Arc<dyn ScoringEngine>>,
    resolver: Option<Arc<MetadataResolver>>,
}

impl std::fmt::Debug for Grader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grader")
            .field("engine", &self.engine.kind())
            .field("blend", &self.blend.as_ref().map(|e| e.kind()))
            .field("resolver", &self.resolver.is_some())
            .finish_non_exhaustive()
    }
}

impl Grader {
    pub fn new(engine: Arc<dyn ScoringEngine>, config: GraderConfig) -> Self {
        Self {
            config,
            engine,
            blend: None,
            resolver: None,
        }
    }

    /// Secondary engine whose scores are blended in at `engine.blend_alpha`.
    pub fn with_blend(mut self, engine: Arc<dyn ScoringEngine>) -> Self {
        self.blend = Some(engine);
        self
    }

    pub fn with_resolver(mut self, resolver: MetadataResolver) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Build engines and the identity resolver described by `config`.
    ///
    /// Fails only when the selected engine cannot be constructed; the blend
    /// engine and every identity collaborator degrade to absent.
    pub fn from_config(config: GraderConfig) -> Result<Self, GradeError> {
        let vision: Option<Arc<dyn VisionClient>> = match config.llm.api_key.as_deref() {
            Some(key) => Some(Arc::new(OpenAiClient::new(
                &config.llm.base_url,
                key,
                config.llm.timeout_secs,
            )?)),
            None => None,
        };

        let engine: Arc<dyn ScoringEngine> = match config.engine.kind {
            EngineKind::Regressor => Arc::new(build_regressor(&config)?),
            EngineKind::Llm => {
                let client = vision.clone().ok_or_else(|| {
                    GradeError::EngineUnavailable("the LLM engine needs OPENAI_API_KEY".into())
                })?;
                Arc::new(LlmGrader::new(client, config.llm.params.clone()))
            }
        };

        let blend = if config.engine.kind == EngineKind::Llm && config.engine.blend_alpha > 0.0 {
            match build_regressor(&config) {
                Ok(r) => Some(Arc::new(r) as Arc<dyn ScoringEngine>),
                Err(e) => {
                    log::warn!("grader: blending disabled: {e}");
                    None
                }
            }
        } else {
            None
        };

        let resolver = config
            .identity
            .enabled
            .then(|| Arc::new(build_resolver(&config, vision)));

        log::info!(
            "grader: engine {}, blend {}, identity {}",
            engine.kind(),
            blend.is_some(),
            resolver.is_some()
        );
        Ok(Self {
            config,
            engine,
            blend,
            resolver,
        })
    }

    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    pub fn engine_kind(&self) -> EngineKind {
        self.engine.kind()
    }

    /// Grade one card. Never fails: fatal errors come back as a zero-score
    /// outcome with `needs_better_photos` and guidance text.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(engine = %self.engine.kind())))]
    pub fn grade(&self, input: &GradeInput) -> GradeOutcome {
        let mut stages = Vec::new();
        match self.try_grade(input, &mut stages) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("grade: attempt failed: {e}");
                stages.push(GradeStage::Failed);
                GradeOutcome::failure(self.engine.kind(), stages, &e)
            }
        }
    }

    fn try_grade(
        &self,
        input: &GradeInput,
        stages: &mut Vec<GradeStage>,
    ) -> Result<GradeOutcome, GradeError> {
        stages.push(GradeStage::Received);
        let front = decode_upload(&input.front).map_err(GradeError::Front)?;
        let back = input.back.as_deref().and_then(|bytes| match decode_upload(bytes) {
            Ok(img) => Some(img),
            Err(e) => {
                log::warn!("grade: dropping back image: {e}");
                None
            }
        });

        stages.push(GradeStage::Rectifying);
        let kind = self.engine.kind();
        let params = PrepareParams {
            rectify: self.config.rectify.clone(),
            color: self.config.color.clone(),
            quality: self.config.quality_for(kind).clone(),
        };
        let front = prepare_side(front, &params);
        let back = back.map(|img| prepare_side(img, &params));
        stages.push(if front.is_rectified() {
            GradeStage::Rectified
        } else {
            GradeStage::FallbackCanvas
        });
        stages.push(GradeStage::QualityChecked);

        if let Some(dir) = &self.config.debug_dir {
            self.write_debug(dir, &front);
        }

        stages.extend([
            GradeStage::Predicting,
            GradeStage::Detecting,
            GradeStage::ResolvingMetadata,
        ]);
        let hints = ScoringHints {
            game: input.hints.game,
        };
        let pair = SidePair::new(&front, back.as_ref());
        let (predicted, blended, detectors, identity) = thread::scope(|s| {
            let predict = s.spawn(|| self.predict_with_retries(pair, &hints));
            let blend = s.spawn(|| self.predict_blend(pair, &hints));
            let detect = s.spawn(|| run_detectors(Some(&front.image), &self.config.detectors));
            let resolve = s.spawn(|| self.resolve_identity(&front.image, &input.hints));
            (predict.join(), blend.join(), detect.join(), resolve.join())
        });
        let predicted = predicted.map_err(|_| GradeError::Worker("predictor"))??;
        let blended = blended.unwrap_or_else(|_| {
            log::warn!("grade: blend worker panicked, continuing without blend");
            None
        });
        let detectors = detectors.unwrap_or_else(|_| {
            log::warn!("grade: detector worker panicked, using defaults");
            DetectorReport::default()
        });
        let identity = identity.unwrap_or_else(|_| {
            log::warn!("grade: identity worker panicked, identity left empty");
            CardIdentity::default()
        });

        // The engine may have found the uploads in back-then-front order.
        let (detectors, identity, blended) = match back.as_ref().filter(|_| predicted.sides_swapped) {
            Some(real_front) => {
                log::info!("grade: sides swapped, re-reading the second upload as the front");
                let detectors = run_detectors(Some(&real_front.image), &self.config.detectors);
                let identity = if identity.is_empty() {
                    self.resolve_identity(&real_front.image, &input.hints)
                } else {
                    identity
                };
                let blended = match blended {
                    Some(_) => self.predict_blend(SidePair::new(real_front, Some(&front)), &hints),
                    None => None,
                };
                (detectors, identity, blended)
            }
            None => (detectors, identity, blended),
        };

        stages.push(GradeStage::Reconciling);
        let reconciled = reconcile(
            &predicted,
            &detectors,
            blended.as_ref().map(|o| &o.scores),
            &self.config.reconcile_params(),
        );
        stages.push(GradeStage::Done);

        let raw = json!({
            "engine": predicted.engine,
            "engine_raw": predicted.raw,
            "engine_label": predicted.label,
            "sides_swapped": predicted.sides_swapped,
            "blend": blended.as_ref().map(|o| o.scores),
            "detectors": detectors,
            "front": side_diagnostics(&front),
            "back": back.as_ref().map(side_diagnostics),
            "adjustments": reconciled.adjustments,
        });

        Ok(GradeOutcome {
            engine: predicted.engine,
            scores: reconciled.scores,
            label: reconciled.label,
            summary: reconciled.summary,
            needs_better_photos: reconciled.needs_better_photos,
            photo_feedback: reconciled.photo_feedback,
            observations: reconciled.observations,
            identity,
            stages: stages.clone(),
            raw,
        })
    }

    fn predict_with_retries(
        &self,
        pair: SidePair<'_>,
        hints: &ScoringHints,
    ) -> Result<EngineOutput, GradeError> {
        let attempts = self.config.engine.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.engine.predict(pair, hints) {
                Ok(out) => return Ok(out),
                Err(e) if e.is_transient() && attempt < attempts => {
                    log::warn!("predict: attempt {attempt}/{attempts} failed, retrying: {e}");
                    attempt += 1;
                }
                Err(source) => {
                    return Err(GradeError::Engine {
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }

    fn predict_blend(&self, pair: SidePair<'_>, hints: &ScoringHints) -> Option<EngineOutput> {
        let engine = self.blend.as_ref().filter(|_| self.config.engine.blend_alpha > 0.0)?;
        match engine.predict(pair, hints) {
            Ok(out) if !out.needs_better_photos => Some(out),
            Ok(_) => None,
            Err(e) => {
                log::warn!("blend: {} engine failed, continuing without it: {e}", engine.kind());
                None
            }
        }
    }

    fn resolve_identity(&self, front: &RgbImage, hints: &IdentityHints) -> CardIdentity {
        self.resolver
            .as_ref()
            .map(|r| r.resolve(front, hints))
            .unwrap_or_default()
    }

    fn write_debug(&self, dir: &Path, front: &PreparedSide) {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let written = write_debug_artifacts(
            dir,
            &format!("grade_{millis}"),
            &front.image,
            &self.config.detectors.edge_chip,
        );
        log::debug!("grade: wrote {} debug artifact(s) to {}", written.len(), dir.display());
    }
}

fn side_diagnostics(side: &PreparedSide) -> Value {
    json!({
        "source": side.source,
        "quality": side.quality,
        "canvas": side.image.dimensions(),
    })
}

fn build_regressor(config: &GraderConfig) -> Result<RegressorEngine, GradeError> {
    let weights = config.regressor.weights.as_deref().ok_or_else(|| {
        GradeError::EngineUnavailable("no regressor weights configured (CARDGRADER_WEIGHTS)".into())
    })?;
    let model = load_model(weights, config.regressor.metadata_path().as_deref())?;
    Ok(RegressorEngine::new(model, config.regressor.params.clone()))
}

#[cfg(feature = "onnx")]
fn load_model(weights: &Path, metadata: Option<&Path>) -> Result<Arc<dyn RegressorModel>, GradeError> {
    use cardgrade_engine::regressor::{ModelMetadata, OnnxRegressor};

    let model = match metadata.filter(|p| p.is_file()) {
        Some(meta) => OnnxRegressor::load_with_metadata(weights, meta)?,
        None => {
            log::warn!(
                "regressor: no metadata next to {}, using default normalization",
                weights.display()
            );
            OnnxRegressor::load(weights, ModelMetadata::default())?
        }
    };
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_model(weights: &Path, _metadata: Option<&Path>) -> Result<Arc<dyn RegressorModel>, GradeError> {
    Err(GradeError::EngineUnavailable(format!(
        "cannot load {}: built without the `onnx` feature",
        weights.display()
    )))
}

fn build_resolver(config: &GraderConfig, vision: Option<Arc<dyn VisionClient>>) -> MetadataResolver {
    let id = &config.identity;
    let remote: Option<Arc<dyn CardDatabase>> = if id.remote_base_url.trim().is_empty() {
        None
    } else {
        match PokemonTcgClient::new(&id.remote_base_url, id.api_key.as_deref(), id.timeout_secs) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                log::warn!("identity: remote card database disabled: {e}");
                None
            }
        }
    };
    let cache = match &id.cache_dir {
        Some(dir) => MetadataCache::open(dir, remote),
        None => MetadataCache::in_memory(remote),
    };

    let mut resolver = MetadataResolver::new(cache);
    if let Some(client) = vision {
        resolver = resolver.with_ocr(StripOcr::new(client, id.ocr_model.clone()));
    }
    if let Some(dir) = &id.symbols_dir {
        match SymbolAssets::scan(dir) {
            Ok(symbols) => resolver = resolver.with_symbols(symbols),
            Err(e) => log::warn!("identity: cannot scan symbols in {}: {e}", dir.display()),
        }
    }
    if let Some(dir) = &id.references_dir {
        match ReferenceMatcher::from_dir(dir, id.references.clone()) {
            Ok(references) if !references.is_empty() => {
                log::info!("identity: {} reference images from {}", references.len(), dir.display());
                resolver = resolver.with_references(references);
            }
            Ok(_) => log::warn!("identity: no reference images in {}", dir.display()),
            Err(e) => log::warn!("identity: cannot index references in {}: {e}", dir.display()),
        }
    }
    resolver
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardgrade_engine::regressor::FixedModel;
    use cardgrade_engine::RegressorParams;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn card_photo() -> RgbImage {
        RgbImage::from_fn(400, 560, |x, y| {
            if (40..360).contains(&x) && (50..510).contains(&y) {
                Rgb([200, 180, 60])
            } else {
                Rgb([30, 30, 35])
            }
        })
    }

    fn grader(outputs: [f32; 6]) -> Grader {
        let model = Arc::new(FixedModel::new(outputs));
        let engine = RegressorEngine::new(model, RegressorParams::default());
        Grader::new(Arc::new(engine), GraderConfig::default())
    }

    #[test]
    fn corrupt_front_is_a_failure_outcome() {
        let out = grader([9.0; 6]).grade(&GradeInput::new(b"not an image".to_vec()));
        assert!(out.needs_better_photos);
        assert_eq!(out.scores, ScoreVector::zero());
        assert_eq!(out.label, UNGRADED_LABEL);
        assert_eq!(out.stages, vec![GradeStage::Received, GradeStage::Failed]);
        assert!(out.photo_feedback.contains("JPEG, PNG or WebP"));
    }

    #[test]
    fn invalid_back_is_dropped() {
        let input = GradeInput::new(png(&card_photo())).with_back(Vec::new());
        let out = grader([9.0, 9.0, 9.0, 9.0, 9.0, 9.0]).grade(&input);
        assert!(out.is_graded());
        assert_eq!(out.raw["back"], Value::Null);
        assert_eq!(out.stages.last(), Some(&GradeStage::Done));
    }

    #[test]
    fn stages_follow_the_attempt() {
        let out = grader([8.0; 6]).grade(&GradeInput::new(png(&card_photo())));
        assert_eq!(out.stages[0], GradeStage::Received);
        assert_eq!(out.stages[1], GradeStage::Rectifying);
        assert!(matches!(
            out.stages[2],
            GradeStage::Rectified | GradeStage::FallbackCanvas
        ));
        assert_eq!(
            &out.stages[3..],
            &[
                GradeStage::QualityChecked,
                GradeStage::Predicting,
                GradeStage::Detecting,
                GradeStage::ResolvingMetadata,
                GradeStage::Reconciling,
                GradeStage::Done,
            ]
        );
    }

    #[test]
    fn debug_artifacts_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GraderConfig::default();
        config.debug_dir = Some(dir.path().to_path_buf());
        let engine = RegressorEngine::new(Arc::new(FixedModel::new([9.0; 6])), RegressorParams::default());
        let out = Grader::new(Arc::new(engine), config).grade(&GradeInput::new(png(&card_photo())));
        assert!(out.is_graded());
        assert!(std::fs::read_dir(dir.path()).unwrap().count() >= 1);
    }

    /// Gray blocks on a light face; enough corners for feature matching.
    fn blocky_card() -> RgbImage {
        let mut img = RgbImage::from_pixel(315, 440, Rgb([214, 208, 196]));
        for i in 0..48u32 {
            let (x0, y0) = ((i * 53) % 260 + 5, (i * 97) % 380 + 5);
            let (w, h) = (10 + (i * 7) % 36, 10 + (i * 11) % 36);
            let v = ((i % 5) * 40) as u8;
            for y in y0..(y0 + h).min(440) {
                for x in x0..(x0 + w).min(315) {
                    img.put_pixel(x, y, Rgb([v, v, v]));
                }
            }
        }
        img
    }

    #[test]
    fn configured_references_name_the_card() {
        let dir = tempfile::tempdir().unwrap();
        let card = blocky_card();
        card.save(dir.path().join("mew_ex.png")).unwrap();

        let mut config = GraderConfig::default();
        config.identity.remote_base_url = String::new();
        config.identity.references_dir = Some(dir.path().to_path_buf());
        let resolver = build_resolver(&config, None);
        let id = resolver.resolve(&card, &IdentityHints::default());
        assert_eq!(id.card_name.as_deref(), Some("mew ex"));
        assert_eq!(id.reference_path, Some(dir.path().join("mew_ex.png")));
    }

    #[test]
    fn from_config_without_weights_is_unavailable() {
        let mut config = GraderConfig::default();
        config.identity.enabled = false;
        let err = Grader::from_config(config).unwrap_err();
        assert!(matches!(err, GradeError::EngineUnavailable(_)));

        let mut config = GraderConfig::default();
        config.engine.kind = EngineKind::Llm;
        config.llm.api_key = None;
        assert!(matches!(
            Grader::from_config(config),
            Err(GradeError::EngineUnavailable(_))
        ));
    }
}
