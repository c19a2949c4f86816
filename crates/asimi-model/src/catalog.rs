// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Static provider/model catalog.
//!
//! Used for the `:models` list and for the context-usage gauge in the status
//! bar.  Unknown models simply fall back to a conservative window; nothing
//! here is load-bearing for correctness.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalogEntry {
    pub provider: &'static str,
    pub model: &'static str,
    pub context_window: u32,
    pub max_output_tokens: u32,
}

const CATALOG: &[ModelCatalogEntry] = &[
    ModelCatalogEntry { provider: "anthropic", model: "claude-sonnet-4-5", context_window: 200_000, max_output_tokens: 64_000 },
    ModelCatalogEntry { provider: "anthropic", model: "claude-haiku-4-5", context_window: 200_000, max_output_tokens: 64_000 },
    ModelCatalogEntry { provider: "anthropic", model: "claude-opus-4-1", context_window: 200_000, max_output_tokens: 32_000 },
    ModelCatalogEntry { provider: "openai", model: "gpt-4o", context_window: 128_000, max_output_tokens: 16_384 },
    ModelCatalogEntry { provider: "openai", model: "gpt-4.1", context_window: 1_000_000, max_output_tokens: 32_768 },
    ModelCatalogEntry { provider: "openai", model: "o4-mini", context_window: 200_000, max_output_tokens: 100_000 },
    ModelCatalogEntry { provider: "gemini", model: "gemini-2.5-pro", context_window: 1_000_000, max_output_tokens: 65_536 },
    ModelCatalogEntry { provider: "gemini", model: "gemini-2.5-flash", context_window: 1_000_000, max_output_tokens: 65_536 },
    ModelCatalogEntry { provider: "ollama", model: "llama3.1", context_window: 128_000, max_output_tokens: 8_192 },
    ModelCatalogEntry { provider: "ollama", model: "qwen2.5-coder", context_window: 32_768, max_output_tokens: 8_192 },
];

pub fn static_catalog() -> Vec<ModelCatalogEntry> {
    CATALOG.to_vec()
}

pub fn lookup(provider: &str, model: &str) -> Option<ModelCatalogEntry> {
    CATALOG
        .iter()
        .find(|e| e.provider == provider && e.model == model)
        .cloned()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
