//! Vision-language model seam used by the identity OCR and the prompted grader.
//!
//! Callers build a [`ChatRequest`] (system prompt, user prompt, images as
//! data URLs) and hand it to any [`VisionClient`]. Two implementations ship:
//!
//! - [`OpenAiClient`]: an OpenAI-compatible `/chat/completions` client over
//!   `reqwest::blocking` with a hard timeout.
//! - [`ScriptedVisionClient`]: canned replies for tests and offline runs.
//!
//! Model output is free text; [`extract_json_object`] recovers the first JSON
//! object from it, tolerating code fences and surrounding prose.

mod client;
mod encode;
mod error;
mod json;
mod openai;
mod scripted;

pub use client::{ChatRequest, VisionClient};
pub use encode::{jpeg_data_url, png_data_url};
pub use error::LlmError;
pub use json::{extract_json_object, parse_json_reply};
pub use openai::{OpenAiClient, DEFAULT_BASE_URL};
pub use scripted::{ScriptedReply, ScriptedVisionClient};
