use crate::LlmError;

/// One multimodal chat turn: optional system prompt, a user prompt and any
/// number of images given as `data:` URLs.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub images: Vec<String>,
    pub temperature: f32,
    /// Ask the endpoint for a JSON-object response format.
    pub json_mode: bool,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            images: Vec::new(),
            temperature: 0.0,
            json_mode: true,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.images.push(data_url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Whether `needle` appears in the system or user prompt.
    pub fn mentions(&self, needle: &str) -> bool {
        self.prompt.contains(needle) || self.system.as_deref().is_some_and(|s| s.contains(needle))
    }
}

/// A blocking vision-language completion endpoint.
pub trait VisionClient: Send + Sync {
    /// Run one completion and return the raw assistant text.
    fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "vision"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_parts() {
        let req = ChatRequest::new("gpt-4o", "grade this")
            .with_system("You are a grader")
            .with_image("data:image/jpeg;base64,AAAA")
            .with_image("data:image/jpeg;base64,BBBB")
            .with_temperature(0.2);
        assert_eq!(req.images.len(), 2);
        assert!(req.json_mode);
        assert!(req.mentions("grader"));
        assert!(req.mentions("grade this"));
        assert!(!req.mentions("set code"));
    }
}
