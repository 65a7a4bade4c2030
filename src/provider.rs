//! LLM provider resolution shared by extraction and advisory calls.

use crate::config::ConversionConfig;
use crate::error::Pdf2OfficeError;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Provider preferred when its API key is present and nothing else was chosen.
const PREFERRED_PROVIDER: &str = "gemini";
const PREFERRED_KEY_VAR: &str = "GEMINI_API_KEY";

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2OfficeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2OfficeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured before auto-detection so the model choice survives when
///    several API keys are present.
/// 4. **Gemini key** (`GEMINI_API_KEY`). Whole-document PDF input is what
///    this provider accepts natively, so it wins over other detected keys.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Pdf2OfficeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        debug!("Using configured provider {} ({})", name, model);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            debug!("Using provider from environment {} ({})", prov, env_model);
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(key) = std::env::var(PREFERRED_KEY_VAR) {
        if !key.is_empty() {
            return create_provider(PREFERRED_PROVIDER, model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2OfficeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
