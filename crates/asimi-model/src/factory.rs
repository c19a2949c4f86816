// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use asimi_config::LlmConfig;

use crate::{
    anthropic::{AnthropicProvider, Credential},
    mock::MockProvider,
    openai::OpenAiCompatProvider,
    ModelProvider,
};

/// Instantiate a provider from the `[llm]` config section.
///
/// Credentials come from the environment only; config files never carry
/// secrets.  Gemini and Ollama are served through their OpenAI-compatible
/// endpoints.
pub fn from_config(cfg: &LlmConfig) -> anyhow::Result<Arc<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "anthropic" => {
            let credential = if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
                Credential::ApiKey(key)
            } else if let Ok(token) = std::env::var("ANTHROPIC_OAUTH_TOKEN") {
                Credential::OauthToken(token)
            } else {
                anyhow::bail!(
                    "anthropic provider needs ANTHROPIC_API_KEY or ANTHROPIC_OAUTH_TOKEN"
                );
            };
            let base_url = std::env::var("ANTHROPIC_BASE_URL").ok();
            Ok(Arc::new(AnthropicProvider::new(base_url, credential, &cfg.model)))
        }
        "openai" => {
            let key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("openai provider needs OPENAI_API_KEY"))?;
            Ok(Arc::new(OpenAiCompatProvider::new(
                "openai",
                "https://api.openai.com/v1",
                Some(key),
                &cfg.model,
            )))
        }
        "gemini" => {
            let key = std::env::var("GEMINI_API_KEY")
                .map_err(|_| anyhow::anyhow!("gemini provider needs GEMINI_API_KEY"))?;
            Ok(Arc::new(OpenAiCompatProvider::new(
                "gemini",
                "https://generativelanguage.googleapis.com/v1beta/openai",
                Some(key),
                &cfg.model,
            )))
        }
        "ollama" => {
            let host = std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string());
            Ok(Arc::new(OpenAiCompatProvider::new(
                "ollama",
                format!("{}/v1", host.trim_end_matches('/')),
                None,
                &cfg.model,
            )))
        }
        "mock" => Ok(Arc::new(MockProvider)),
        other => anyhow::bail!("unknown provider: {other}"),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
