//! Ordered provider chain.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tracing::warn;

use crate::agent::error::LlmError;
use crate::agent::message::Message;
use crate::agent::provider::{Completion, ProviderAdapter, RequestOptions, ToolDefinition};

/// Tries each provider in order, moving on only for retryable errors.
///
/// Auth and config failures stop the chain immediately so a bad key is
/// reported instead of silently masked by the next provider.
pub struct FallbackChain {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    fallback_count: AtomicU32,
}

impl FallbackChain {
    /// `providers` must be non-empty.
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>) -> Result<Self, LlmError> {
        if providers.is_empty() {
            return Err(LlmError::Config("fallback chain needs at least one provider".into()));
        }
        Ok(Self {
            providers,
            fallback_count: AtomicU32::new(0),
        })
    }

    /// How many times a later provider was tried after an earlier one failed.
    pub fn fallback_count(&self) -> u32 {
        self.fallback_count.load(Ordering::Relaxed)
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("providers", &self.provider_names())
            .field("fallback_count", &self.fallback_count())
            .finish()
    }
}

#[async_trait]
impl ProviderAdapter for FallbackChain {
    fn name(&self) -> &str {
        self.providers.first().map_or("fallback", |p| p.name())
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &RequestOptions,
    ) -> Result<Completion, LlmError> {
        let mut last_err: Option<LlmError> = None;
        for (i, provider) in self.providers.iter().enumerate() {
            if let Some(prev) = &last_err {
                self.fallback_count.fetch_add(1, Ordering::Relaxed);
                warn!(
                    failed = self.providers[i - 1].name(),
                    next = provider.name(),
                    error = %prev,
                    "provider failed with retryable error, trying next"
                );
            }
            match provider.complete(messages, tools, options).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| LlmError::Config("no providers configured".into())))
    }
}
