//! Provider router — builds the right backend for a model reference.
//!
//! Resolves the API key and base URL from configuration, then constructs
//! the provider. An unsupported provider name is a caller error; a missing
//! key is an operational error surfaced before any network call.

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use foreman_config::Config;
use foreman_core::{Error, ModelRef, Provider, Result};
use std::sync::Arc;

/// Build a provider for the given model reference.
pub fn build_provider(model_ref: &ModelRef, config: &Config) -> Result<Arc<dyn Provider>> {
    let provider_name = model_ref.provider.as_str();
    let api_key = config.api_key(provider_name)?;
    let base_url = config.base_url(provider_name);

    let provider: Arc<dyn Provider> = match provider_name {
        "anthropic" => {
            let mut p = AnthropicProvider::new(api_key)?;
            if let Some(url) = base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        "openai" | "openrouter" => {
            let url = base_url.unwrap_or_else(|| default_base_url(provider_name));
            Arc::new(OpenAiCompatProvider::new(provider_name, url, api_key)?)
        }
        // Unknown names need an explicit base_url to be usable as a
        // generic OpenAI-compatible endpoint.
        other => match base_url {
            Some(url) => Arc::new(OpenAiCompatProvider::new(other, url, api_key)?),
            None => {
                return Err(Error::InvalidModelRef {
                    reference: model_ref.to_string(),
                });
            }
        },
    };

    Ok(provider)
}

/// Default base URLs for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        _ => unreachable!("only called for known providers"),
    }
}
