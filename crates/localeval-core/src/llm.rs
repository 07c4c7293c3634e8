//! Minimal client for OpenAI-compatible `/chat/completions` endpoints
//! (Ollama, llama.cpp server, vLLM, OpenAI itself).

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::EndpointConfig;
use crate::error::{LlmError, LlmResult};
use crate::trace::{report_trace, TokenUsage, Trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
}

/// Some servers send `"tool_calls": null` instead of omitting the field.
fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ToolCall>, D::Error> {
    Ok(Option::<Vec<ToolCall>>::deserialize(d)?.unwrap_or_default())
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as produced by the model.
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

/// A function tool the model may call; `parameters` is a JSON schema.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDefinition,
}

impl Tool {
    pub fn function(name: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: "function",
            function: FunctionDefinition {
                name: name.into(),
                description: None,
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: None,
            temperature: None,
        }
    }

    /// Offer a single function tool and force the model to call it.
    pub fn force_tool(mut self, tool: Tool) -> Self {
        self.tool_choice = Some(json!({
            "type": "function",
            "function": { "name": tool.function.name },
        }));
        self.tools = vec![tool];
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    pub fn first_message(&self) -> Option<&ChatMessage> {
        self.choices.first().map(|c| &c.message)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// Cheap to clone: the underlying `reqwest::Client` is a pooled handle.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_endpoint(endpoint: &EndpointConfig) -> Self {
        Self::new(&endpoint.base_url, &endpoint.api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Same credentials and connection pool, different endpoint.
    pub fn with_base_url(&self, base_url: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            base_url: base_url.into(),
            api_key: self.api_key.clone(),
        }
    }

    pub async fn create(&self, request: &ChatRequest) -> LlmResult<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let trace = Trace::start_now().model(&request.model);
        let trace_input = serde_json::to_value(&request.messages)?;

        debug!(%url, model = %request.model, messages = request.messages.len(), "chat completion");

        match self.send(&url, request).await {
            Ok(response) => {
                let output = response
                    .first_message()
                    .map(serde_json::to_value)
                    .transpose()?
                    .unwrap_or(Value::Null);
                report_trace(trace.finish(trace_input, output, response.usage.map(Into::into)));
                Ok(response)
            }
            Err(err) => {
                debug!(%url, error = %err, "chat completion failed");
                report_trace(trace.finish_with_error(trace_input, err.to_string()));
                Err(err)
            }
        }
    }

    async fn send(&self, url: &str, request: &ChatRequest) -> LlmResult<ChatResponse> {
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Send a system prompt plus user input and return the first choice's
    /// text, or an empty string when the model returned none.
    pub async fn complete_text(&self, model: &str, system: &str, user: &str) -> LlmResult<String> {
        let request = ChatRequest::new(
            model,
            vec![ChatMessage::system(system), ChatMessage::user(user)],
        );
        let response = self.create(&request).await?;
        Ok(response
            .first_message()
            .and_then(|m| m.content.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::scope_traces;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_response(content: Option<&str>) -> Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13 }
        })
    }

    #[tokio::test]
    async fn complete_text_posts_chat_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer TEST"))
            .and(body_partial_json(json!({
                "model": "llama3.2",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "What is the capital of France?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response(Some("Paris"))))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(format!("{}/v1/", server.uri()), "TEST");
        let (answer, traces) = scope_traces(client.complete_text(
            "llama3.2",
            "be brief",
            "What is the capital of France?",
        ))
        .await;

        assert_eq!(answer.unwrap(), "Paris");
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].model.as_deref(), Some("llama3.2"));
        assert_eq!(traces[0].usage.map(|u| u.total_tokens), Some(13));
    }

    #[tokio::test]
    async fn missing_content_becomes_empty_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response(None)))
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri(), "TEST");
        let answer = client.complete_text("llama3.2", "sys", "hi").await.unwrap();
        assert_eq!(answer, "");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model \"nope\" not found"))
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri(), "TEST");
        let (result, traces) = scope_traces(client.complete_text("nope", "sys", "hi")).await;
        match result {
            Err(LlmError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("not found"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(traces.len(), 1);
        assert!(traces[0].error.is_some());
    }

    #[test]
    fn null_tool_calls_deserialize_as_empty() {
        let message: ChatMessage =
            serde_json::from_value(json!({ "role": "assistant", "content": "8", "tool_calls": null }))
                .unwrap();
        assert!(message.tool_calls.is_empty());
        assert_eq!(message.content.as_deref(), Some("8"));
    }

    #[test]
    fn force_tool_sets_tool_choice() {
        let request = ChatRequest::new("llama3.2", vec![ChatMessage::user("hi")])
            .force_tool(Tool::function("spam_classifier", json!({ "type": "object" })));
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "spam_classifier");
        assert_eq!(body["tool_choice"]["function"]["name"], "spam_classifier");
        assert!(body.get("temperature").is_none());
    }
}
