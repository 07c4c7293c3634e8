//! Structured output over tool calling.
//!
//! The response type's JSON schema is offered to the model as a single
//! function tool and `tool_choice` forces the call. The call's arguments are
//! validated against the schema and deserialized; when either step fails the
//! errors are fed back to the model and the request is retried.

use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{LlmError, LlmResult};
use crate::llm::{ChatClient, ChatMessage, ChatRequest, ChatResponse, Tool};

/// A type the model can be asked to produce.
pub trait StructuredOutput: DeserializeOwned + Send {
    /// Function name the schema is registered under.
    const NAME: &'static str;

    /// JSON schema (draft 7) describing the type.
    fn json_schema() -> Value;
}

pub async fn create_structured<T: StructuredOutput>(
    client: &ChatClient,
    model: &str,
    messages: Vec<ChatMessage>,
    max_retries: u32,
) -> LlmResult<T> {
    let schema = T::json_schema();
    let validator = JSONSchema::compile(&schema).map_err(|e| LlmError::Schema {
        name: T::NAME,
        message: e.to_string(),
    })?;

    let mut request =
        ChatRequest::new(model, messages).force_tool(Tool::function(T::NAME, schema.clone()));
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let response = client.create(&request).await?;
        let (reply, outcome) = parse_response::<T>(&response, &validator);

        let errors = match outcome {
            Ok(value) => {
                debug!(name = T::NAME, attempt, "structured response accepted");
                return Ok(value);
            }
            Err(errors) => errors,
        };

        if attempt > max_retries {
            return Err(LlmError::RetriesExhausted {
                name: T::NAME,
                attempts: attempt,
                last_error: errors,
            });
        }

        warn!(name = T::NAME, attempt, %errors, "structured response rejected, retrying");
        if let Some(reply) = reply {
            request.messages.push(reply);
        }
        request.messages.push(ChatMessage::user(format!(
            "Please correct the function call; errors encountered:\n{errors}"
        )));
    }
}

/// Returns the assistant turn to echo back on retry and either the parsed
/// value or a description of what was wrong with it.
fn parse_response<T: StructuredOutput>(
    response: &ChatResponse,
    validator: &JSONSchema,
) -> (Option<ChatMessage>, Result<T, String>) {
    let Some(message) = response.first_message() else {
        return (None, Err("the response contained no choices".to_string()));
    };

    let call = message
        .tool_calls
        .iter()
        .find(|c| c.function.name == T::NAME)
        .or_else(|| message.tool_calls.first());
    let Some(call) = call else {
        return (
            Some(message.clone()),
            Err(format!("no call to function `{}` was made", T::NAME)),
        );
    };

    let outcome = serde_json::from_str::<Value>(&call.function.arguments)
        .map_err(|e| format!("arguments are not valid JSON: {e}"))
        .and_then(|args| {
            if let Err(errors) = validator.validate(&args) {
                let msgs: Vec<String> = errors
                    .map(|e| format!("{}: {}", e.instance_path, e))
                    .collect();
                return Err(msgs.join("\n"));
            }
            serde_json::from_value::<T>(args).map_err(|e| e.to_string())
        });

    (Some(message.clone()), outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: u32,
    }

    impl StructuredOutput for Answer {
        const NAME: &'static str = "answer";

        fn json_schema() -> Value {
            json!({
                "type": "object",
                "properties": { "value": { "type": "integer", "minimum": 0 } },
                "required": ["value"]
            })
        }
    }

    fn tool_response(arguments: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "answer", "arguments": arguments }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
    }

    #[tokio::test]
    async fn valid_arguments_are_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "tool_choice": { "type": "function", "function": { "name": "answer" } }
            })))
            .respond_with(tool_response(r#"{"value": 8}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri(), "TEST");
        let answer: Answer = create_structured(&client, "llama3.2", vec![ChatMessage::user("legs?")], 5)
            .await
            .unwrap();
        assert_eq!(answer, Answer { value: 8 });
    }

    #[tokio::test]
    async fn invalid_arguments_are_retried_with_feedback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(tool_response(r#"{"value": "eight"}"#))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [
                    { "role": "user", "content": "legs?" },
                    { "role": "assistant" },
                    { "role": "user" }
                ]
            })))
            .respond_with(tool_response(r#"{"value": 8}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri(), "TEST");
        let answer: Answer = create_structured(&client, "llama3.2", vec![ChatMessage::user("legs?")], 5)
            .await
            .unwrap();
        assert_eq!(answer.value, 8);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(tool_response("not json"))
            .expect(3)
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri(), "TEST");
        let err = create_structured::<Answer>(&client, "llama3.2", vec![ChatMessage::user("legs?")], 2)
            .await
            .unwrap_err();
        match err {
            LlmError::RetriesExhausted { name, attempts, last_error } => {
                assert_eq!(name, "answer");
                assert_eq!(attempts, 3);
                assert!(last_error.contains("not valid JSON"));
            }
            other => panic!("expected retries exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_tool_call_counts_as_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "8" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri(), "TEST");
        let err = create_structured::<Answer>(&client, "llama3.2", vec![ChatMessage::user("legs?")], 0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no call to function `answer`"));
    }

    #[tokio::test]
    async fn http_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri(), "TEST");
        let err = create_structured::<Answer>(&client, "llama3.2", vec![ChatMessage::user("legs?")], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Status { status: 500, .. }));
    }
}
