//! OpenAI chat-completions extraction client
//!
//! One article per request. The model is forced through a function call
//! whose schema wraps the relations under an `entities` key, mirroring
//! the output parser contract. Batch submission is concurrent per-item
//! calls; retry and timeout discipline belong to the pipeline, not here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{prompt, EntityExtractor, ExtractError, ExtractionValue};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ============================================================================
// Client
// ============================================================================

#[derive(Debug)]
pub struct OpenAiExtractor {
    api_key: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAiExtractor {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_model(api_key, DEFAULT_MODEL)
    }

    pub fn with_model(api_key: String, model: impl Into<String>) -> Result<Self> {
        // No client-side timeout: the pipeline bounds every call explicitly.
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.into(),
            endpoint: OPENAI_CHAT_URL.to_string(),
            client,
        })
    }

    /// Read the API key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    tools: Vec<Tool>,
    tool_choice: Value,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ToolFunction,
}

#[derive(Debug, Serialize)]
struct ToolFunction {
    name: &'static str,
    description: &'static str,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Extraction
// ============================================================================

#[async_trait]
impl EntityExtractor for OpenAiExtractor {
    async fn extract_one(&self, text: &str) -> Result<ExtractionValue, ExtractError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: text.to_string(),
                },
            ],
            tools: vec![Tool {
                kind: "function",
                function: ToolFunction {
                    name: prompt::TOOL_NAME,
                    description: "Daftar hubungan entitas dari berita investasi",
                    parameters: prompt::tool_parameters(),
                },
            }],
            tool_choice: json!({ "type": "function", "function": { "name": prompt::TOOL_NAME } }),
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(api) => api.error.message,
                Err(_) => body,
            };
            return Err(ExtractError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ExtractError::Malformed(format!("bad completion envelope: {e}")))?;
        let message = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ExtractError::Malformed("completion without choices".to_string()))?
            .message;

        Ok(ExtractionValue::from_value(resolve_message(message)))
    }
}

/// Pick the raw value out of a completion message: the forced tool call
/// when present, otherwise plain content parsed as JSON if possible. The
/// raw string is preserved when it is not JSON, so the error record shows
/// what the model actually said.
fn resolve_message(message: ResponseMessage) -> Value {
    if let Some(call) = message.tool_calls.into_iter().next() {
        let arguments = call.function.arguments;
        return serde_json::from_str(&arguments).unwrap_or(Value::String(arguments));
    }

    match message.content {
        Some(content) if !content.is_empty() => {
            serde_json::from_str(&content).unwrap_or(Value::String(content))
        }
        _ => Value::Null,
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// Load the OpenAI API key from `OPENAI_API_KEY`.
pub fn get_api_key() -> Result<String> {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            return Ok(key);
        }
    }
    anyhow::bail!("API key not found. Set the OPENAI_API_KEY environment variable.")
}

/// Whether an API key is configured.
pub fn has_api_key() -> bool {
    std::env::var("OPENAI_API_KEY")
        .map(|k| !k.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================
