//! Image generation with retry and model fallback.
//!
//! A call runs a fixed plan of stages, `Primary`, then `RetryPrimary` when the
//! prompt clearly asks for a picture, then every fallback model in order. The
//! first stage that yields an image ends the plan. Running off the end of the
//! plan is the give-up stage: the last text seen (or a placeholder) is
//! returned as a normal result.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use nbproxy_common::GlobalConfig;
use nbproxy_protocol::gemini::{
    GenerateContentRequestBody, GenerateContentResponse, GenerationConfig, ImageConfig, Modality,
};
use nbproxy_protocol::openrouter::{ChatCompletionRequest, ResponseModality};

use crate::classify::{Classified, classify_chat_response, classify_gemini_response};
use crate::error::DispatchError;
use crate::gate::ConcurrencyGate;
use crate::gemini::{GeminiAction, GeminiEndpoint};
use crate::message::{Message, messages_to_gemini, messages_to_wire};
use crate::openrouter::OpenRouterEndpoint;
use crate::prompt::{self, PLACEHOLDER_TEXT, PromptVariant};
use crate::result::GenerationResult;
use crate::retry::{RetryPolicy, send_with_retry};
use crate::stream::relay_stream;
use crate::upstream::{UpstreamBody, UpstreamClient, UpstreamHttpRequest, UpstreamHttpResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Primary,
    RetryPrimary,
    Fallback(usize),
}

impl StageKind {
    pub fn label(self) -> &'static str {
        match self {
            StageKind::Primary => "primary",
            StageKind::RetryPrimary => "retry_primary",
            StageKind::Fallback(_) => "fallback",
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, StageKind::Fallback(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub kind: StageKind,
    pub model: String,
    pub prompt: PromptVariant,
    pub policy: RetryPolicy,
}

/// Builds the ordered stage list for one generate call.
pub fn plan_stages(
    primary_model: &str,
    fallback_models: &[String],
    intent: bool,
    primary: RetryPolicy,
    fallback: RetryPolicy,
) -> Vec<Stage> {
    let mut stages = vec![Stage {
        kind: StageKind::Primary,
        model: primary_model.to_string(),
        prompt: PromptVariant::Rewritten,
        policy: primary,
    }];
    if intent {
        stages.push(Stage {
            kind: StageKind::RetryPrimary,
            model: primary_model.to_string(),
            prompt: PromptVariant::Strengthened,
            policy: primary,
        });
    }
    let fallback_prompt = if intent {
        PromptVariant::Strengthened
    } else {
        PromptVariant::Rewritten
    };
    stages.extend(
        fallback_models
            .iter()
            .enumerate()
            .map(|(index, model)| Stage {
                kind: StageKind::Fallback(index),
                model: model.clone(),
                prompt: fallback_prompt,
                policy: fallback,
            }),
    );
    stages
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub openrouter: OpenRouterEndpoint,
    pub gemini: GeminiEndpoint,
    pub image_model: String,
    pub fallback_models: Vec<String>,
    pub gemini_image_model: String,
    pub primary: RetryPolicy,
    pub fallback: RetryPolicy,
}

impl DispatchSettings {
    pub fn from_global(config: &GlobalConfig) -> Self {
        Self {
            openrouter: OpenRouterEndpoint::from_global(config),
            gemini: GeminiEndpoint::from_global(config),
            image_model: config.image_model.clone(),
            fallback_models: config.fallback_models.clone(),
            gemini_image_model: config.gemini_image_model.clone(),
            primary: RetryPolicy::primary(config),
            fallback: RetryPolicy::fallback(config),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchInput {
    pub messages: Vec<Message>,
    pub api_key: String,
    /// Overrides the configured image model.
    pub model: Option<String>,
    /// Browser `Origin`, forwarded as `HTTP-Referer`.
    pub referer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiInput {
    pub messages: Vec<Message>,
    pub api_key: String,
    pub model: Option<String>,
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
}

#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn UpstreamClient>,
    gate: ConcurrencyGate,
    settings: DispatchSettings,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("gate", &self.gate)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(client: Arc<dyn UpstreamClient>, gate: ConcurrencyGate, settings: DispatchSettings) -> Self {
        Self {
            client,
            gate,
            settings,
        }
    }

    pub fn from_config(client: Arc<dyn UpstreamClient>, config: &GlobalConfig) -> Self {
        Self::new(
            client,
            ConcurrencyGate::new(config.max_concurrency),
            DispatchSettings::from_global(config),
        )
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Sends one request under a gate slot with the primary retry budget.
    ///
    /// A streaming 2xx body keeps the slot until the stream is finished;
    /// everything else is buffered and the slot is released on return.
    pub async fn forward(&self, req: UpstreamHttpRequest) -> Result<UpstreamHttpResponse, DispatchError> {
        let permit = self.gate.acquire().await?;
        info!(event = "upstream_request", url = %req.url, stream = req.is_stream);
        let resp = send_with_retry(self.client.as_ref(), &req, self.settings.primary).await?;
        info!(event = "upstream_response", url = %req.url, status = resp.status);
        let body = match resp.body {
            UpstreamBody::Stream(rx) => UpstreamBody::Stream(relay_stream(rx, Some(permit), req.url)),
            UpstreamBody::Bytes(bytes) => UpstreamBody::Bytes(bytes),
        };
        Ok(UpstreamHttpResponse {
            status: resp.status,
            headers: resp.headers,
            body,
        })
    }

    /// Generates an image through OpenRouter, falling back across models.
    pub async fn generate(&self, input: DispatchInput) -> Result<GenerationResult, DispatchError> {
        let _permit = self.gate.acquire().await?;
        let primary_model = non_empty(input.model.as_deref()).unwrap_or(self.settings.image_model.as_str());
        let intent = prompt::has_generation_intent(&prompt::original_prompt(&input.messages));
        let stages = plan_stages(
            primary_model,
            &self.settings.fallback_models,
            intent,
            self.settings.primary,
            self.settings.fallback,
        );

        let mut last_text = None;
        for stage in &stages {
            let messages = prompt::apply(&input.messages, stage.prompt);
            let outcome = self
                .openrouter_stage(stage, &messages, &input.api_key, input.referer.as_deref())
                .await;
            if let Some(result) = settle(stage, outcome, &mut last_text)? {
                return Ok(result);
            }
        }

        Ok(give_up(last_text, primary_model))
    }

    /// Generates an image through the Gemini API directly.
    ///
    /// Fallback models are OpenRouter ids, so only the primary stages run.
    pub async fn generate_with_gemini(&self, input: GeminiInput) -> Result<GenerationResult, DispatchError> {
        let _permit = self.gate.acquire().await?;
        let model = non_empty(input.model.as_deref()).unwrap_or(self.settings.gemini_image_model.as_str());
        let intent = prompt::has_generation_intent(&prompt::original_prompt(&input.messages));
        let stages = plan_stages(model, &[], intent, self.settings.primary, self.settings.fallback);
        let image_config = (input.aspect_ratio.is_some() || input.image_size.is_some()).then(|| ImageConfig {
            aspect_ratio: input.aspect_ratio.clone(),
            image_size: input.image_size.clone(),
        });

        let mut last_text = None;
        for stage in &stages {
            let messages = prompt::apply(&input.messages, stage.prompt);
            let outcome = self
                .gemini_stage(stage, &messages, &input.api_key, image_config.clone())
                .await;
            if let Some(result) = settle(stage, outcome, &mut last_text)? {
                return Ok(result);
            }
        }

        Ok(give_up(last_text, model))
    }

    async fn openrouter_stage(
        &self,
        stage: &Stage,
        messages: &[Message],
        api_key: &str,
        referer: Option<&str>,
    ) -> Result<Classified, DispatchError> {
        let body = ChatCompletionRequest {
            model: stage.model.clone(),
            messages: messages_to_wire(messages),
            stream: false,
            modalities: Some(vec![ResponseModality::Image, ResponseModality::Text]),
        };
        let body = encode(&body)?;
        let req = self.settings.openrouter.request(api_key, referer, body, false);
        let value: JsonValue = self.call_json(stage, req).await?;
        Ok(classify_chat_response(&value))
    }

    async fn gemini_stage(
        &self,
        stage: &Stage,
        messages: &[Message],
        api_key: &str,
        image_config: Option<ImageConfig>,
    ) -> Result<Classified, DispatchError> {
        let (contents, system_instruction) = messages_to_gemini(messages);
        let body = GenerateContentRequestBody {
            contents,
            system_instruction,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec![Modality::Text, Modality::Image]),
                image_config,
            }),
        };
        let body = encode(&body)?;
        let req = self
            .settings
            .gemini
            .request(api_key, &stage.model, GeminiAction::GenerateContent, body);
        let response: GenerateContentResponse = self.call_json(stage, req).await?;
        Ok(classify_gemini_response(&response))
    }

    async fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        stage: &Stage,
        req: UpstreamHttpRequest,
    ) -> Result<T, DispatchError> {
        info!(
            event = "dispatch_stage",
            stage = stage.kind.label(),
            model = %stage.model,
            max_attempts = stage.policy.max_attempts()
        );
        let resp = send_with_retry(self.client.as_ref(), &req, stage.policy).await?;
        let status = resp.status;
        let headers = resp.headers;
        let body = resp.body.collect().await;
        info!(event = "upstream_response", url = %req.url, status, bytes = body.len());
        if !(200..300).contains(&status) {
            return Err(DispatchError::Status {
                status,
                headers,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        serde_json::from_slice(&body).map_err(|err| DispatchError::InvalidJson(err.to_string()))
    }
}

/// Folds one stage outcome into the running result.
///
/// Only a primary failure is surfaced; later stages fail quietly so the next
/// model still gets its turn.
fn settle(
    stage: &Stage,
    outcome: Result<Classified, DispatchError>,
    last_text: &mut Option<String>,
) -> Result<Option<GenerationResult>, DispatchError> {
    match outcome {
        Ok(Classified::Image(uri)) => {
            info!(
                event = "dispatch_stage",
                stage = stage.kind.label(),
                model = %stage.model,
                outcome = "image"
            );
            Ok(Some(GenerationResult::image(uri, stage.model.clone(), stage.kind.is_fallback())))
        }
        Ok(Classified::Text(text)) => {
            info!(
                event = "dispatch_stage",
                stage = stage.kind.label(),
                model = %stage.model,
                outcome = "text"
            );
            if !text.trim().is_empty() {
                *last_text = Some(text);
            }
            Ok(None)
        }
        Err(err) if stage.kind == StageKind::Primary => Err(err),
        Err(err) => {
            warn!(
                event = "dispatch_stage",
                stage = stage.kind.label(),
                model = %stage.model,
                outcome = "error",
                error = %err
            );
            Ok(None)
        }
    }
}

fn give_up(last_text: Option<String>, model: &str) -> GenerationResult {
    info!(event = "dispatch_stage", stage = "give_up", model = %model, has_text = last_text.is_some());
    GenerationResult::text(last_text.unwrap_or_else(|| PLACEHOLDER_TEXT.to_string()), model)
}

fn encode<T: serde::Serialize>(body: &T) -> Result<Bytes, DispatchError> {
    serde_json::to_vec(body)
        .map(Bytes::from)
        .map_err(|err| DispatchError::Encode(err.to_string()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
