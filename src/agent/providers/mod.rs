//! Concrete provider adapters and chain construction from config.

pub mod anthropic;
pub mod fallback;
pub mod openai;

pub use anthropic::{AnthropicAdapter, AnthropicConfig};
pub use fallback::FallbackChain;
pub use openai::{OpenAiAdapter, OpenAiConfig};

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::error::LlmError;
use super::provider::ProviderAdapter;
use crate::config::LlmConfig;

/// Supported hosted providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub const ALL: [Self; 3] = [Self::Gemini, Self::OpenAi, Self::Anthropic];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-sonnet-20241022",
        }
    }

    /// Whether a configured model name belongs to this provider's family.
    fn owns_model(self, model: &str) -> bool {
        let model = model.to_lowercase();
        match self {
            Self::Gemini => model.contains("gemini"),
            Self::OpenAi => model.contains("gpt") || model.starts_with('o'),
            Self::Anthropic => model.contains("claude"),
        }
    }

    /// The configured model when it fits this provider, else the default.
    pub fn model_for(self, configured: Option<&str>) -> String {
        configured
            .map(str::trim)
            .filter(|m| !m.is_empty() && self.owns_model(m))
            .unwrap_or(self.default_model())
            .to_owned()
    }
}

fn credential(config: &LlmConfig, kind: ProviderKind) -> Option<&str> {
    let key = match kind {
        ProviderKind::Gemini => config.gemini_api_key.as_deref(),
        ProviderKind::OpenAi => config.openai_api_key.as_deref(),
        ProviderKind::Anthropic => config.anthropic_api_key.as_deref(),
    };
    key.map(str::trim).filter(|k| !k.is_empty())
}

fn build_one(
    config: &LlmConfig,
    kind: ProviderKind,
    key: &str,
) -> Result<Arc<dyn ProviderAdapter>, LlmError> {
    let model = kind.model_for(config.model.as_deref());
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let adapter: Arc<dyn ProviderAdapter> = match kind {
        ProviderKind::Gemini => {
            let mut cfg = OpenAiConfig::gemini(key, &model).with_timeout(timeout);
            if let Some(url) = &config.gemini_base_url {
                cfg = cfg.with_base_url(url);
            }
            Arc::new(OpenAiAdapter::new(cfg)?)
        }
        ProviderKind::OpenAi => {
            let mut cfg = OpenAiConfig::new(key, &model).with_timeout(timeout);
            if let Some(url) = &config.openai_base_url {
                cfg = cfg.with_base_url(url);
            }
            Arc::new(OpenAiAdapter::new(cfg)?)
        }
        ProviderKind::Anthropic => {
            let mut cfg = AnthropicConfig::new(key, &model).with_timeout(timeout);
            if let Some(url) = &config.anthropic_base_url {
                cfg = cfg.with_base_url(url);
            }
            Arc::new(AnthropicAdapter::new(cfg)?)
        }
    };
    info!(provider = kind.as_str(), model = %model, "LLM provider configured");
    Ok(adapter)
}

/// Build the provider chain: the configured provider first, then every
/// other provider that has a credential.
///
/// Fails with [`LlmError::Config`] when no provider has a key.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn ProviderAdapter>, LlmError> {
    let preferred = ProviderKind::parse(&config.provider).unwrap_or(ProviderKind::Gemini);
    let order = std::iter::once(preferred).chain(ProviderKind::ALL.into_iter().filter(|k| *k != preferred));

    let mut chain = Vec::new();
    for kind in order {
        if let Some(key) = credential(config, kind) {
            chain.push(build_one(config, kind, key)?);
        }
    }

    match chain.len() {
        0 => Err(LlmError::Config(
            "no LLM provider configured; set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY"
                .into(),
        )),
        1 => Ok(chain.remove(0)),
        _ => Ok(Arc::new(FallbackChain::new(chain)?)),
    }
}
