use clap::Parser;

use nbproxy_common::GlobalConfigPatch;

#[derive(Debug, Parser)]
#[command(name = "nbproxy", version, about = "Image-generation proxy for OpenRouter and Gemini")]
pub(crate) struct Cli {
    #[arg(long, env = "NBPROXY_HOST")]
    pub(crate) host: Option<String>,
    #[arg(long, env = "PORT")]
    pub(crate) port: Option<u16>,
    #[arg(long, env = "OPENROUTER_URL")]
    pub(crate) openrouter_url: Option<String>,
    #[arg(long, env = "GEMINI_BASE_URL")]
    pub(crate) gemini_base_url: Option<String>,
    /// Model for `/api/chat` when the request names none.
    #[arg(long, env = "NBPROXY_DEFAULT_MODEL")]
    pub(crate) default_model: Option<String>,
    #[arg(long, env = "NBPROXY_IMAGE_MODEL")]
    pub(crate) image_model: Option<String>,
    /// Comma separated, tried in order.
    #[arg(long, env = "NBPROXY_FALLBACK_MODELS", value_delimiter = ',')]
    pub(crate) fallback_models: Option<Vec<String>>,
    #[arg(long, env = "NBPROXY_GEMINI_IMAGE_MODEL")]
    pub(crate) gemini_image_model: Option<String>,
    #[arg(long, env = "NBPROXY_RETRIES")]
    pub(crate) retries: Option<u32>,
    #[arg(long, env = "NBPROXY_FALLBACK_RETRIES")]
    pub(crate) fallback_retries: Option<u32>,
    #[arg(long, env = "NBPROXY_BASE_DELAY_MS")]
    pub(crate) base_delay_ms: Option<u64>,
    #[arg(long, env = "NBPROXY_JITTER_MS")]
    pub(crate) jitter_ms: Option<u64>,
    #[arg(long, env = "NBPROXY_MAX_CONCURRENCY")]
    pub(crate) max_concurrency: Option<usize>,
    /// Outbound proxy for upstream calls.
    #[arg(long, env = "NBPROXY_PROXY")]
    pub(crate) proxy: Option<String>,
    #[arg(long, env = "NBPROXY_REFERER")]
    pub(crate) referer: Option<String>,
    #[arg(long, env = "NBPROXY_APP_TITLE")]
    pub(crate) app_title: Option<String>,
    #[arg(long, env = "NBPROXY_USER_AGENT")]
    pub(crate) user_agent: Option<String>,
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub(crate) openrouter_api_key: Option<String>,
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub(crate) gemini_api_key: Option<String>,
    /// Let `/api/get-env-key` return the OpenRouter key to browsers.
    #[arg(long, env = "NBPROXY_EXPOSE_ENV_KEY")]
    pub(crate) expose_env_key: bool,
}

impl Cli {
    pub(crate) fn into_patch(self) -> GlobalConfigPatch {
        GlobalConfigPatch {
            host: self.host,
            port: self.port,
            openrouter_url: self.openrouter_url,
            gemini_base_url: self.gemini_base_url,
            default_model: self.default_model,
            image_model: self.image_model,
            fallback_models: self.fallback_models,
            gemini_image_model: self.gemini_image_model,
            retries: self.retries,
            fallback_retries: self.fallback_retries,
            base_delay_ms: self.base_delay_ms,
            jitter_ms: self.jitter_ms,
            max_concurrency: self.max_concurrency,
            proxy: self.proxy,
            referer: self.referer,
            app_title: self.app_title,
            user_agent: self.user_agent,
            openrouter_api_key: self.openrouter_api_key,
            gemini_api_key: self.gemini_api_key,
            expose_env_key: self.expose_env_key.then_some(true),
        }
    }
}
