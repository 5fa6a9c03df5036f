use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use tably_core::config::LlmConfig;
use tably_core::ApplicationError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model invocation failed: {0}")]
    Model(String),
    #[error("no LLM api key is configured")]
    MissingApiKey,
    #[error("model returned an empty reply")]
    EmptyReply,
}

impl From<AgentError> for ApplicationError {
    fn from(error: AgentError) -> Self {
        match error {
            AgentError::Model(message) => ApplicationError::Model(message),
            other => ApplicationError::Model(other.to_string()),
        }
    }
}

/// One message in the chat-completions wire format. `content` is optional
/// because assistant messages that carry tool calls may omit it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: Some(content.into()), tool_calls: None, tool_call_id: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: Some(content.into()), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: Some(content.into()), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self { role: "assistant".into(), content: None, tool_calls: Some(calls), tool_call_id: None }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, passed through verbatim.
    pub arguments: String,
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Value>,
}

/// What one completion round produced: free text, tool calls, or both.
#[derive(Clone, Debug, Default)]
pub struct ChatReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, AgentError>;
}

/// Chat-completions client for OpenRouter (or any OpenAI-compatible
/// endpoint). Stateless; one instance is shared across every session.
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
}

impl OpenRouterClient {
    pub fn new(config: &LlmConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| AgentError::Model(format!("http client setup failed: {err}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, AgentError> {
        let api_key = self.api_key.as_ref().ok_or(AgentError::MissingApiKey)?;

        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": request.messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools);
        }

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, message_count = request.messages.len(), "calling chat endpoint");

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|err| AgentError::Model(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AgentError::Model(format!(
                "chat endpoint returned {status}: {detail}"
            )));
        }

        let payload: CompletionResponse = response
            .json()
            .await
            .map_err(|err| AgentError::Model(format!("malformed completion payload: {err}")))?;

        let choice = payload.choices.into_iter().next().ok_or(AgentError::EmptyReply)?;
        Ok(ChatReply {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}
