//! Chat completions client for ad copy
//!
//! Sends one structured-output request per ad and retries on rate limits,
//! server errors and transport failures.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::json_parser::extract_json_object;
use super::prompts::{build_copy_prompt, build_copy_schema, COPY_SYSTEM_PROMPT, SCHEMA_NAME};
use super::types::{CopyRequest, GeneratedCopy, GenerationError, GeneratorConfig};
use crate::billing::PlanFeatures;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Ad copy generation client
pub struct CopyClient {
    client: Client,
    config: GeneratorConfig,
}

impl CopyClient {
    /// Create a new client. Fails with `Unavailable` when the key is blank.
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::Unavailable);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Generate one ad, asking only for the fields `features` allows
    pub async fn generate(
        &self,
        request: &CopyRequest,
        features: PlanFeatures,
    ) -> Result<GeneratedCopy, GenerationError> {
        request.validate()?;

        let chat = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: COPY_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_copy_prompt(request, features),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: SCHEMA_NAME,
                    strict: true,
                    schema: build_copy_schema(features),
                },
            },
        };

        let response = self.send_with_retry(&chat).await?;

        if let Some(usage) = &response.usage {
            debug!(model = %self.config.model, tokens = usage.total_tokens, "Generation complete");
        }

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| GenerationError::MalformedResponse("no choices in response".to_string()))?;

        if let Some(refusal) = message.refusal.filter(|r| !r.trim().is_empty()) {
            return Err(GenerationError::MalformedResponse(format!("model refused: {}", refusal)));
        }

        let content = message
            .content
            .ok_or_else(|| GenerationError::MalformedResponse("empty message content".to_string()))?;

        parse_copy(&content, features)
    }

    /// Send request with retry logic
    async fn send_with_retry(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, GenerationError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));
        let max_retries = self.config.max_retries;
        let mut retry_delay = self.config.retry_base_delay;

        for retry in 0..=max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay = retry_delay.saturating_mul(2);
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(request)
                .send()
                .await;

            match resp {
                Ok(r) if r.status().is_success() => {
                    let body = r
                        .text()
                        .await
                        .map_err(|e| GenerationError::Transport(e.to_string()))?;
                    return serde_json::from_str(&body).map_err(|e| {
                        GenerationError::MalformedResponse(format!("Failed to parse response: {}", e))
                    });
                }
                Ok(r) if is_retryable(r.status()) => {
                    let status = r.status();
                    if retry == max_retries {
                        let text = r.text().await.unwrap_or_default();
                        return Err(GenerationError::Api {
                            status: status.as_u16(),
                            message: api_error_message(&text),
                        });
                    }
                    warn!(status = %status, "Generation API busy, retry {}/{}", retry + 1, max_retries);
                }
                Ok(r) => {
                    let status = r.status().as_u16();
                    let text = r.text().await.unwrap_or_default();
                    return Err(GenerationError::Api {
                        status,
                        message: api_error_message(&text),
                    });
                }
                Err(e) => {
                    if retry == max_retries {
                        return Err(GenerationError::Transport(format!(
                            "Request failed after retries: {}",
                            e
                        )));
                    }
                    warn!(error = %e, "Generation request failed, retry {}/{}", retry + 1, max_retries);
                }
            }
        }

        Err(GenerationError::Transport("Max retries exceeded".to_string()))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect())
}

/// Parse and validate model output into [`GeneratedCopy`]
///
/// Fields the tier is not entitled to are dropped even if the model sent
/// them.
pub fn parse_copy(content: &str, features: PlanFeatures) -> Result<GeneratedCopy, GenerationError> {
    let json_str = extract_json_object(content).map_err(GenerationError::MalformedResponse)?;

    let mut copy: GeneratedCopy = serde_json::from_str(json_str)
        .map_err(|e| GenerationError::MalformedResponse(format!("Failed to parse JSON: {}", e)))?;

    for (name, value) in [
        ("title", &copy.title),
        ("body", &copy.body),
        ("call_to_action", &copy.call_to_action),
    ] {
        if value.trim().is_empty() {
            return Err(GenerationError::MalformedResponse(format!("{} is empty", name)));
        }
    }

    if features.audience_suggestions {
        if copy.audience_suggestions.is_empty() {
            return Err(GenerationError::MalformedResponse(
                "audience_suggestions missing".to_string(),
            ));
        }
    } else {
        copy.audience_suggestions.clear();
    }

    if features.video_script {
        match &copy.video_script {
            Some(script) if !script.hook.trim().is_empty() && !script.scenes.is_empty() => {}
            _ => {
                return Err(GenerationError::MalformedResponse(
                    "video_script missing or incomplete".to_string(),
                ))
            }
        }
    } else {
        copy.video_script = None;
    }

    Ok(copy)
}
