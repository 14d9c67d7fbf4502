use std::sync::Arc;

use adk_rust::prelude::*;
use anyhow::{Context, Result};

use crate::cli::Provider;
use crate::config::RuntimeConfig;

pub struct ResolvedModel {
    pub llm: Arc<dyn Llm>,
    pub provider: Provider,
    pub model_name: String,
}

impl ResolvedModel {
    /// Google Search grounding is a Gemini built-in; other providers run the
    /// sub-agents on model knowledge alone.
    pub fn search_enabled(&self) -> bool {
        self.provider == Provider::Gemini
    }

    pub fn provider_label(&self) -> String {
        format!("{:?}", self.provider).to_ascii_lowercase()
    }
}

pub fn default_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Gemini | Provider::Auto => "gemini-2.5-pro",
        Provider::Openai => "gpt-5-mini",
        Provider::Anthropic => "claude-sonnet-4-20250514",
        Provider::Deepseek => "deepseek-chat",
        Provider::Groq => "llama-3.3-70b-versatile",
        Provider::Ollama => "llama4",
    }
}

pub fn validate_model_for_provider(provider: Provider, model_name: &str) -> Result<()> {
    let is_valid = match provider {
        Provider::Gemini => model_name.starts_with("gemini"),
        Provider::Openai => {
            model_name.starts_with("gpt-")
                || model_name.starts_with("o1")
                || model_name.starts_with("o3")
        }
        Provider::Anthropic => model_name.starts_with("claude"),
        Provider::Deepseek => model_name.starts_with("deepseek"),
        Provider::Groq | Provider::Ollama => !model_name.trim().is_empty(),
        Provider::Auto => true,
    };

    if is_valid {
        return Ok(());
    }

    Err(anyhow::anyhow!(
        "model '{}' is not compatible with provider '{:?}'",
        model_name,
        provider
    ))
}

pub fn resolve_model(cfg: &RuntimeConfig) -> Result<ResolvedModel> {
    let provider = match cfg.provider {
        Provider::Auto => detect_provider().context(
            "no provider could be auto-detected. Set one of GOOGLE_API_KEY, OPENAI_API_KEY, \
             ANTHROPIC_API_KEY, DEEPSEEK_API_KEY, GROQ_API_KEY, or use --provider ollama",
        )?,
        p => p,
    };
    let model_name = cfg
        .model
        .clone()
        .unwrap_or_else(|| default_model(provider).to_string());
    validate_model_for_provider(provider, &model_name)?;

    let llm: Arc<dyn Llm> = match provider {
        Provider::Gemini => Arc::new(GeminiModel::new(
            required_key("GOOGLE_API_KEY", "Gemini")?,
            model_name.clone(),
        )?),
        Provider::Openai => Arc::new(OpenAIClient::new(OpenAIConfig::new(
            required_key("OPENAI_API_KEY", "OpenAI")?,
            model_name.clone(),
        ))?),
        Provider::Anthropic => Arc::new(AnthropicClient::new(AnthropicConfig::new(
            required_key("ANTHROPIC_API_KEY", "Anthropic")?,
            model_name.clone(),
        ))?),
        Provider::Deepseek => Arc::new(DeepSeekClient::new(DeepSeekConfig::new(
            required_key("DEEPSEEK_API_KEY", "DeepSeek")?,
            model_name.clone(),
        ))?),
        Provider::Groq => Arc::new(GroqClient::new(GroqConfig::new(
            required_key("GROQ_API_KEY", "Groq")?,
            model_name.clone(),
        ))?),
        Provider::Ollama => {
            let host = std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string());
            Arc::new(OllamaModel::new(OllamaConfig::with_host(
                host,
                model_name.clone(),
            ))?)
        }
        Provider::Auto => unreachable!("auto provider must be resolved before matching"),
    };

    Ok(ResolvedModel {
        llm,
        provider,
        model_name,
    })
}

fn required_key(var: &str, label: &str) -> Result<String> {
    std::env::var(var).with_context(|| format!("{var} is required for {label} provider"))
}

// Gemini first: the coordinator instructions assume search grounding.
pub fn detect_provider() -> Option<Provider> {
    [
        ("GOOGLE_API_KEY", Provider::Gemini),
        ("OPENAI_API_KEY", Provider::Openai),
        ("ANTHROPIC_API_KEY", Provider::Anthropic),
        ("DEEPSEEK_API_KEY", Provider::Deepseek),
        ("GROQ_API_KEY", Provider::Groq),
        ("OLLAMA_HOST", Provider::Ollama),
    ]
    .into_iter()
    .find(|(key, _)| env_present(key))
    .map(|(_, provider)| provider)
}

pub fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}
