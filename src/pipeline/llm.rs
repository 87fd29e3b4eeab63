//! VLM interaction: send one extraction request and return the raw reply.
//!
//! The transport is deliberately dumb: it delivers the image and instruction
//! and hands back whatever text comes out. Interpreting that text is the job
//! of [`crate::pipeline::parse`]. There is no retry or timeout here; a failed
//! call surfaces once and the user decides whether to try again.

use crate::config::{ExtractorConfig, DEFAULT_MODEL};
use crate::error::McqError;
use crate::pipeline::request::ExtractionRequest;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Anything that can carry an [`ExtractionRequest`] to a model.
pub trait ExtractionTransport {
    /// Send the request and return the model's raw text response.
    fn send(&self, request: &ExtractionRequest) -> impl Future<Output = Result<String, McqError>>;
}

/// Transport backed by an `edgequake-llm` provider.
pub struct LlmTransport {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl std::fmt::Debug for LlmTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmTransport")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.options.temperature)
            .field("max_tokens", &self.options.max_tokens)
            .finish()
    }
}

impl LlmTransport {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractorConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }

    /// Resolve a provider from the configuration and environment.
    ///
    /// Fails with [`McqError::ConfigurationError`] when no credential is
    /// available; in that case no client is ever constructed.
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, McqError> {
        Self::from_config_with(config, env_lookup)
    }

    /// [`Self::from_config`] reading variables through `lookup`.
    pub fn from_config_with(
        config: &ExtractorConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, McqError> {
        let provider = resolve_provider_with(config, lookup)?;
        Ok(Self::new(provider, config))
    }
}

impl ExtractionTransport for LlmTransport {
    async fn send(&self, request: &ExtractionRequest) -> Result<String, McqError> {
        let start = Instant::now();
        let image = ImageData::new(request.image_base64().to_string(), request.media_type());
        let messages = vec![ChatMessage::user_with_images(
            request.instruction(),
            vec![image],
        )];

        debug!(
            "Sending extraction request ({}, expecting {})",
            request.media_type(),
            request.response_format().mime_type()
        );

        match self.provider.chat(&messages, Some(&self.options)).await {
            Ok(response) => {
                debug!(
                    "{} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                Ok(response.content)
            }
            Err(e) => {
                warn!("Extraction call failed after {:?}: {}", start.elapsed(), e);
                Err(McqError::LlmApiError {
                    message: format!("{}", e),
                })
            }
        }
    }
}

/// Build `CompletionOptions` from the extractor config.
fn build_options(config: &ExtractorConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Environment variable holding the credential for a named provider.
///
/// `None` means the provider needs no key (local servers such as Ollama) or is
/// not known here, in which case the provider factory does its own checks.
pub fn credential_env_var(provider_name: &str) -> Option<&'static str> {
    match provider_name.trim().to_ascii_lowercase().as_str() {
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" | "claude" => Some("ANTHROPIC_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "xai" | "grok" => Some("XAI_API_KEY"),
        _ => None,
    }
}

/// Check that the credential for `provider_name` is present and non-empty.
///
/// `lookup` abstracts the environment so the check is testable.
pub fn check_credential(
    provider_name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), McqError> {
    let Some(var) = credential_env_var(provider_name) else {
        return Ok(());
    };
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(McqError::ConfigurationError {
            provider: provider_name.to_string(),
            hint: format!(
                "The {} environment variable is not set.\nExport it before starting: export {}=...",
                var, var
            ),
        }),
    }
}

fn env_lookup(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Variables `ProviderFactory::from_env` checks, in its detection order.
/// Without any of them the factory falls back to its mock provider.
const AUTO_DETECT_VARS: &[&str] = &[
    "OLLAMA_HOST",
    "OLLAMA_MODEL",
    "LMSTUDIO_HOST",
    "LMSTUDIO_MODEL",
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "MISTRAL_API_KEY",
    "AZURE_OPENAI_CONTENTGEN_API_KEY",
    "AZURE_OPENAI_API_KEY",
    "XAI_API_KEY",
    "OPENROUTER_API_KEY",
    "OPENAI_API_KEY",
];

/// First auto-detection variable set to a non-blank value, if any.
pub fn auto_detect_source(lookup: impl Fn(&str) -> Option<String>) -> Option<&'static str> {
    AUTO_DETECT_VARS
        .iter()
        .copied()
        .find(|var| matches!(lookup(*var), Some(v) if !v.trim().is_empty()))
}

fn auto_detect_error(detail: &str) -> McqError {
    McqError::ConfigurationError {
        provider: "auto".to_string(),
        hint: format!(
            "No LLM provider could be auto-detected from environment.\n\
            Set GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
            {}",
            detail
        ),
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn LLMProvider>, McqError> {
    check_credential(provider_name, lookup)?;
    info!("Using provider '{}' with model '{}'", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        McqError::ConfigurationError {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider from the process environment.
///
/// See [`resolve_provider_with`] for the resolution order.
pub fn resolve_provider(config: &ExtractorConfig) -> Result<Arc<dyn LLMProvider>, McqError> {
    resolve_provider_with(config, env_lookup)
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider + model** (`config.provider_name`) — its credential
///    variable must be set.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Full auto-detection** (`ProviderFactory::from_env`), only when one of
///    the detection variables is set. A mock provider is never accepted.
///
/// `lookup` reads environment variables; steps 2 to 4 fail with
/// [`McqError::ConfigurationError`] before any client is built when it finds
/// no credential.
pub fn resolve_provider_with(
    config: &ExtractorConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn LLMProvider>, McqError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model, &lookup);
    }

    if let (Some(prov), Some(model)) = (lookup("EDGEQUAKE_LLM_PROVIDER"), lookup("EDGEQUAKE_MODEL")) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model, &lookup);
        }
    }

    let Some(source) = auto_detect_source(&lookup) else {
        return Err(auto_detect_error("None of the provider variables is set."));
    };
    debug!("Auto-detecting provider ({} is set)", source);

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| auto_detect_error(&format!("Error: {}", e)))?;

    if llm_provider.name().eq_ignore_ascii_case("mock") {
        warn!("Auto-detection fell back to the mock provider");
        return Err(auto_detect_error("Only the mock provider was available."));
    }

    Ok(llm_provider)
}
