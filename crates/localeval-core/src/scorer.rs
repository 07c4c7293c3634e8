use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EndpointConfig;
use crate::types::Score;

/// Everything a scorer sees for one case. `base_url` and `model` are only set
/// when the scorer is wrapped with [`with_endpoint`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScorerArgs {
    pub input: Value,
    pub output: Value,
    pub expected: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ScorerArgs {
    pub fn new(input: Value, output: Value, expected: Value) -> Self {
        Self {
            input,
            output,
            expected,
            base_url: None,
            model: None,
        }
    }
}

#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn score(&self, args: &ScorerArgs) -> Result<Score>;
}

/// Points a scorer that calls a model at a specific endpoint.
pub struct WithEndpoint<S> {
    inner: S,
    base_url: String,
    model: String,
}

pub fn with_endpoint<S: Scorer>(scorer: S, endpoint: &EndpointConfig) -> WithEndpoint<S> {
    WithEndpoint {
        inner: scorer,
        base_url: endpoint.base_url.clone(),
        model: endpoint.model.clone(),
    }
}

#[async_trait]
impl<S: Scorer> Scorer for WithEndpoint<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn score(&self, args: &ScorerArgs) -> Result<Score> {
        let args = ScorerArgs {
            base_url: Some(self.base_url.clone()),
            model: Some(self.model.clone()),
            ..args.clone()
        };
        self.inner.score(&args).await
    }
}
