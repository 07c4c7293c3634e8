use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::EndpointConfig;
use crate::error::LlmResult;
use crate::llm::{ChatClient, ChatMessage};
use crate::structured::{create_structured, StructuredOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassLabel {
    Spam,
    NotSpam,
}

impl ClassLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassLabel::Spam => "SPAM",
            ClassLabel::NotSpam => "NOT_SPAM",
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub class_label: ClassLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Classification {
    pub fn is_spam(&self) -> bool {
        self.class_label == ClassLabel::Spam
    }
}

impl StructuredOutput for Classification {
    const NAME: &'static str = "spam_classifier";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "class_label": {
                    "type": "string",
                    "enum": ["SPAM", "NOT_SPAM"],
                    "description": "The classification of the input text. Does it look like spam or not?"
                },
                "reasoning": {
                    "type": "string",
                    "description": "The reasoning behind the classification"
                }
            },
            "required": ["class_label"]
        })
    }
}

/// Spam classifier backed by the model's structured output. Shared by the
/// dispatch task and the `classify_judge` scorer.
#[derive(Debug, Clone)]
pub struct SpamClassifier {
    client: ChatClient,
    model: String,
    max_retries: u32,
}

impl SpamClassifier {
    pub fn new(client: ChatClient, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_retries,
        }
    }

    pub fn from_endpoint(endpoint: &EndpointConfig) -> Self {
        Self::new(
            ChatClient::from_endpoint(endpoint),
            &endpoint.model,
            endpoint.max_retries,
        )
    }

    pub async fn classify(&self, text: &str) -> LlmResult<Classification> {
        let messages = vec![ChatMessage::user(format!(
            "Classify the following text: {text}"
        ))];
        create_structured(&self.client, &self.model, messages, self.max_retries).await
    }
}
