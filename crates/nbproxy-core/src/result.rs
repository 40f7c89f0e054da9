use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum GenerationOutput {
    /// Inline data URI or remote URL.
    Image(String),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMeta {
    pub used_fallback: bool,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    #[serde(flatten)]
    pub output: GenerationOutput,
    pub meta: GenerationMeta,
}

impl GenerationResult {
    pub fn image(uri: String, model: impl Into<String>, used_fallback: bool) -> Self {
        Self {
            output: GenerationOutput::Image(uri),
            meta: GenerationMeta {
                used_fallback,
                model: model.into(),
            },
        }
    }

    pub fn text(text: String, model: impl Into<String>) -> Self {
        Self {
            output: GenerationOutput::Text(text),
            meta: GenerationMeta {
                used_fallback: false,
                model: model.into(),
            },
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.output, GenerationOutput::Image(_))
    }

    pub fn kind(&self) -> &'static str {
        match self.output {
            GenerationOutput::Image(_) => "image",
            GenerationOutput::Text(_) => "text",
        }
    }
}
