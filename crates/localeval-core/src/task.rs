use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use localeval_types::value_preview;
use serde_json::{json, Value};
use tracing::debug;

use crate::classify::SpamClassifier;
use crate::config::EndpointConfig;
use crate::llm::ChatClient;

pub const CLASSIFY_MARKER: &str = "CLASSIFY:";

pub const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful assistant. Be succint in your answers. Do not restate the question or include any additional text besides the answer. Do not include punctuation unless it is part of the answer.";

#[async_trait]
pub trait Task: Send + Sync {
	async fn run(&self, input: &Value) -> Result<Value>;
}

/// Wrap an async closure as a `Task`.
pub fn from_async_fn<F, Fut>(f: F) -> Arc<dyn Task>
where
	F: Send + Sync + 'static + Fn(&Value) -> Fut,
	Fut: Future<Output = Result<Value>> + Send + 'static,
{
	struct ClosureTask<F, Fut> {
		f: F,
		_fut: PhantomData<fn() -> Fut>,
	}

	#[async_trait]
	impl<F, Fut> Task for ClosureTask<F, Fut>
	where
		F: Send + Sync + 'static + Fn(&Value) -> Fut,
		Fut: Future<Output = Result<Value>> + Send + 'static,
	{
		async fn run(&self, input: &Value) -> Result<Value> {
			(self.f)(input).await
		}
	}

	Arc::new(ClosureTask { f, _fut: PhantomData })
}

/// Free-text answer: fixed system prompt plus the raw input.
#[derive(Debug, Clone)]
pub struct AnswerTask {
	client: ChatClient,
	model: String,
	system_prompt: String,
}

impl AnswerTask {
	pub fn new(client: ChatClient, model: impl Into<String>) -> Self {
		Self {
			client,
			model: model.into(),
			system_prompt: ANSWER_SYSTEM_PROMPT.to_string(),
		}
	}

	pub fn from_endpoint(endpoint: &EndpointConfig) -> Self {
		Self::new(ChatClient::from_endpoint(endpoint), &endpoint.model)
	}

	pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
		self.system_prompt = prompt.into();
		self
	}

	pub async fn answer(&self, input: &str) -> Result<String> {
		Ok(self
			.client
			.complete_text(&self.model, &self.system_prompt, input)
			.await?)
	}
}

#[async_trait]
impl Task for AnswerTask {
	async fn run(&self, input: &Value) -> Result<Value> {
		Ok(json!(self.answer(&value_preview(input)).await?))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
	/// Text to classify, marker removed.
	Classify(&'a str),
	Answer(&'a str),
}

/// Inputs starting with `CLASSIFY:` go to the classifier with the text up to
/// any further marker, trimmed. Everything else is answered as free text.
pub fn route(input: &str) -> Route<'_> {
	match input.strip_prefix(CLASSIFY_MARKER) {
		Some(rest) => {
			let text = rest.split(CLASSIFY_MARKER).next().unwrap_or_default();
			Route::Classify(text.trim())
		}
		None => Route::Answer(input),
	}
}

/// The suite's task: classify marked inputs, answer the rest.
pub struct DispatchTask {
	classifier: Arc<SpamClassifier>,
	answerer: AnswerTask,
}

impl DispatchTask {
	pub fn new(classifier: Arc<SpamClassifier>, answerer: AnswerTask) -> Self {
		Self { classifier, answerer }
	}
}

#[async_trait]
impl Task for DispatchTask {
	async fn run(&self, input: &Value) -> Result<Value> {
		let text = value_preview(input);
		match route(&text) {
			Route::Classify(data) => {
				debug!(chars = data.len(), "routing to classifier");
				let classification = self.classifier.classify(data).await?;
				Ok(json!(classification.class_label.as_str()))
			}
			Route::Answer(prompt) => {
				debug!(chars = prompt.len(), "routing to free-text answer");
				Ok(json!(self.answerer.answer(prompt).await?))
			}
		}
	}
}
