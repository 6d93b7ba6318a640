use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{ChatRequest, LlmError, VisionClient};

/// A canned reply: assistant text, or a transport failure.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
}

impl ScriptedReply {
    pub fn text(s: impl Into<String>) -> Self {
        ScriptedReply::Text(s.into())
    }

    fn to_result(&self) -> Result<String, LlmError> {
        match self {
            ScriptedReply::Text(t) => Ok(t.clone()),
            ScriptedReply::Fail(msg) => Err(LlmError::Scripted(msg.clone())),
        }
    }
}

#[derive(Default)]
struct Script {
    /// `(needle, reply)`: answered whenever the prompt mentions `needle`.
    rules: Vec<(String, ScriptedReply)>,
    queue: VecDeque<ScriptedReply>,
    seen: Vec<ChatRequest>,
}

/// In-memory [`VisionClient`] answering from a script.
///
/// Prompt rules are checked first, in insertion order, and may answer any
/// number of times; otherwise the next queued reply is consumed. Rules make
/// the client usable from concurrent stages whose call order is not fixed.
#[derive(Default)]
pub struct ScriptedVisionClient {
    script: Mutex<Script>,
}

impl ScriptedVisionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies consumed in order.
    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for r in replies {
            self.push(ScriptedReply::Text(r.into()));
        }
        self
    }

    /// Answer every request whose prompt mentions `needle` with `reply`.
    pub fn when(self, needle: &str, reply: ScriptedReply) -> Self {
        if let Ok(mut s) = self.script.lock() {
            s.rules.push((needle.to_string(), reply));
        }
        self
    }

    pub fn push(&self, reply: ScriptedReply) {
        if let Ok(mut s) = self.script.lock() {
            s.queue.push_back(reply);
        }
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.script
            .lock()
            .map(|s| s.seen.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().map(|s| s.seen.len()).unwrap_or(0)
    }
}

impl VisionClient for ScriptedVisionClient {
    fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let mut s = self
            .script
            .lock()
            .map_err(|_| LlmError::Scripted("script lock poisoned".into()))?;
        s.seen.push(request.clone());
        if let Some((_, reply)) = s.rules.iter().find(|(needle, _)| request.mentions(needle)) {
            return reply.to_result();
        }
        s.queue
            .pop_front()
            .ok_or(LlmError::ScriptExhausted)?
            .to_result()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_then_exhaustion() {
        let client = ScriptedVisionClient::new().with_replies(["one", "two"]);
        let req = ChatRequest::new("m", "p");
        assert_eq!(client.complete(&req).unwrap(), "one");
        assert_eq!(client.complete(&req).unwrap(), "two");
        assert!(matches!(client.complete(&req), Err(LlmError::ScriptExhausted)));
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn rules_win_over_queue_and_repeat() {
        let client = ScriptedVisionClient::new()
            .with_replies(["queued"])
            .when("set code", ScriptedReply::text(r#"{"set_code":"SVI"}"#));
        let ocr = ChatRequest::new("m", "Read the set code");
        assert_eq!(client.complete(&ocr).unwrap(), r#"{"set_code":"SVI"}"#);
        assert_eq!(client.complete(&ocr).unwrap(), r#"{"set_code":"SVI"}"#);
        assert_eq!(client.complete(&ChatRequest::new("m", "other")).unwrap(), "queued");
    }

    #[test]
    fn failures_are_transient() {
        let client = ScriptedVisionClient::new();
        client.push(ScriptedReply::Fail("503".into()));
        let err = client.complete(&ChatRequest::new("m", "p")).unwrap_err();
        assert!(err.is_transient());
        assert!(!LlmError::ScriptExhausted.is_transient());
    }
}
