//! Shared types for ad copy generation

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the user tells us about the product
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyRequest {
    /// Free-form product description (required)
    pub product_description: String,
    pub product_name: Option<String>,
    pub target_audience: Option<String>,
    /// e.g. "divertido", "premium", "urgente"
    pub tone: Option<String>,
    /// e.g. "Instagram", "WhatsApp", "Mercado Livre"
    pub platform: Option<String>,
}

impl CopyRequest {
    pub fn new(product_description: impl Into<String>) -> Self {
        Self {
            product_description: product_description.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.product_description.trim().is_empty() {
            return Err(GenerationError::EmptyInput);
        }
        Ok(())
    }
}

/// Short video script, premium only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VideoScript {
    pub hook: String,
    pub scenes: Vec<String>,
    pub closing: String,
}

/// Parsed ad copy returned by the generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GeneratedCopy {
    pub title: String,
    pub body: String,
    pub call_to_action: String,
    #[serde(default)]
    pub audience_suggestions: Vec<String>,
    #[serde(default)]
    pub video_script: Option<VideoScript>,
}

/// Settings for the generation API client
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: String,

    /// Base URL for API (default: https://api.openai.com)
    pub base_url: String,

    /// Model to use (default: gpt-4o-mini)
    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Retries after the first attempt, on 429/5xx/transport errors
    pub max_retries: u32,

    /// First retry delay, doubled on every retry
    pub retry_base_delay: Duration,

    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.8,
            max_tokens: 1200,
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Errors from the generation path. None of these consume usage.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("ad generation is unavailable: no API key configured")]
    Unavailable,

    #[error("product description is empty")]
    EmptyInput,

    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("generation API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("generation API returned an invalid response: {0}")]
    MalformedResponse(String),
}
