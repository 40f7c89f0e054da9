use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CHAT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_IMAGE_MODEL: &str = "google/gemini-2.5-flash-image-preview";
pub const DEFAULT_FALLBACK_MODELS: &[&str] = &[
    "google/gemini-2.5-flash-image",
    "google/gemini-2.0-flash-exp:free",
];
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_FALLBACK_RETRIES: u32 = 1;
pub const DEFAULT_BASE_DELAY_MS: u64 = 400;
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;
pub const DEFAULT_REFERER: &str = "http://localhost:8000";
pub const DEFAULT_APP_TITLE: &str = "Nanobanana";
pub const DEFAULT_USER_AGENT: &str = "Nanobanana/1.1 (nbproxy)";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GlobalConfigError {
    #[error("invalid global config field {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Final, merged configuration used by the running process.
///
/// Merge order: CLI > ENV > built-in defaults. Clap resolves the first two,
/// the patch layer fills in the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    pub openrouter_url: String,
    /// Gemini API root, without the trailing `/models/...`.
    pub gemini_base_url: String,
    /// Model used by the chat passthrough when the request names none.
    pub default_model: String,
    /// Primary model for image generation through OpenRouter.
    pub image_model: String,
    /// Tried in order when the primary model produces no image.
    pub fallback_models: Vec<String>,
    pub gemini_image_model: String,
    pub retries: u32,
    /// Retry budget for each fallback model; smaller than `retries`.
    pub fallback_retries: u32,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    pub max_concurrency: usize,
    /// Optional outbound proxy (for upstream egress).
    pub proxy: Option<String>,
    /// `HTTP-Referer` sent upstream when the browser sends no `Origin`.
    pub referer: String,
    pub app_title: String,
    pub user_agent: String,
    #[serde(skip_serializing)]
    pub openrouter_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    /// Whether `/api/get-env-key` may hand the deployment key to browsers.
    pub expose_env_key: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            openrouter_url: DEFAULT_OPENROUTER_URL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            default_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            fallback_models: DEFAULT_FALLBACK_MODELS
                .iter()
                .map(|model| model.to_string())
                .collect(),
            gemini_image_model: DEFAULT_GEMINI_IMAGE_MODEL.to_string(),
            retries: DEFAULT_RETRIES,
            fallback_retries: DEFAULT_FALLBACK_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            jitter_ms: 0,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            proxy: None,
            referer: DEFAULT_REFERER.to_string(),
            app_title: DEFAULT_APP_TITLE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            openrouter_api_key: None,
            gemini_api_key: None,
            expose_env_key: false,
        }
    }
}

impl GlobalConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Optional layer used for merging global config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub openrouter_url: Option<String>,
    pub gemini_base_url: Option<String>,
    pub default_model: Option<String>,
    pub image_model: Option<String>,
    pub fallback_models: Option<Vec<String>>,
    pub gemini_image_model: Option<String>,
    pub retries: Option<u32>,
    pub fallback_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub jitter_ms: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub proxy: Option<String>,
    pub referer: Option<String>,
    pub app_title: Option<String>,
    pub user_agent: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub expose_env_key: Option<bool>,
}

macro_rules! overlay_fields {
    ($dst:expr, $src:expr, $($field:ident),+ $(,)?) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field;
            }
        )+
    };
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        overlay_fields!(
            self,
            other,
            host,
            port,
            openrouter_url,
            gemini_base_url,
            default_model,
            image_model,
            fallback_models,
            gemini_image_model,
            retries,
            fallback_retries,
            base_delay_ms,
            jitter_ms,
            max_concurrency,
            proxy,
            referer,
            app_title,
            user_agent,
            openrouter_api_key,
            gemini_api_key,
            expose_env_key,
        );
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        let defaults = GlobalConfig::default();
        let config = GlobalConfig {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            openrouter_url: non_empty(self.openrouter_url).unwrap_or(defaults.openrouter_url),
            gemini_base_url: non_empty(self.gemini_base_url)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_base_url),
            default_model: non_empty(self.default_model).unwrap_or(defaults.default_model),
            image_model: non_empty(self.image_model).unwrap_or(defaults.image_model),
            fallback_models: self
                .fallback_models
                .map(|models| {
                    models
                        .into_iter()
                        .map(|model| model.trim().to_string())
                        .filter(|model| !model.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.fallback_models),
            gemini_image_model: non_empty(self.gemini_image_model)
                .unwrap_or(defaults.gemini_image_model),
            retries: self.retries.unwrap_or(defaults.retries),
            fallback_retries: self.fallback_retries.unwrap_or(defaults.fallback_retries),
            base_delay_ms: self.base_delay_ms.unwrap_or(defaults.base_delay_ms),
            jitter_ms: self.jitter_ms.unwrap_or(defaults.jitter_ms),
            max_concurrency: self.max_concurrency.unwrap_or(defaults.max_concurrency),
            proxy: non_empty(self.proxy),
            referer: non_empty(self.referer).unwrap_or(defaults.referer),
            app_title: non_empty(self.app_title).unwrap_or(defaults.app_title),
            user_agent: non_empty(self.user_agent).unwrap_or(defaults.user_agent),
            openrouter_api_key: non_empty(self.openrouter_api_key),
            gemini_api_key: non_empty(self.gemini_api_key),
            expose_env_key: self.expose_env_key.unwrap_or(defaults.expose_env_key),
        };
        if config.max_concurrency == 0 {
            return Err(GlobalConfigError::Invalid {
                field: "max_concurrency",
                reason: "must be at least 1",
            });
        }
        if !config.openrouter_url.starts_with("http") {
            return Err(GlobalConfigError::Invalid {
                field: "openrouter_url",
                reason: "must be an http(s) url",
            });
        }
        if !config.gemini_base_url.starts_with("http") {
            return Err(GlobalConfigError::Invalid {
                field: "gemini_base_url",
                reason: "must be an http(s) url",
            });
        }
        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
}
