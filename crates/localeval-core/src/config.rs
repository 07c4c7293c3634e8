use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_API_KEY: &str = "TEST";
pub const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub data: Option<DataConfig>,
    #[serde(default = "default_scorers")]
    pub scorers: Vec<ScorerConfig>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            endpoint: EndpointConfig::default(),
            data: None,
            scorers: default_scorers(),
            concurrency: default_concurrency(),
        }
    }
}

impl EvalConfig {
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config in {:?}", path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

fn default_name() -> String {
    "My Eval".to_string()
}

fn default_concurrency() -> usize {
    5
}

/// Where the model lives. Shared by the tasks, the classifier and any scorer
/// wrapped with `with_endpoint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Retries after a structured response fails validation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            model: default_model(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ScorerConfig {
    Levenshtein {
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
    JsonDiff {
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
    Factuality {
        #[serde(default = "default_threshold")]
        threshold: f64,
        /// Judge with the configured endpoint instead of the hosted default.
        #[serde(default = "default_local")]
        local: bool,
    },
    ClassifyJudge,
}

fn default_threshold() -> f64 {
    0.5
}

fn default_local() -> bool {
    true
}

fn default_scorers() -> Vec<ScorerConfig> {
    vec![
        ScorerConfig::Levenshtein { threshold: default_threshold() },
        ScorerConfig::Factuality { threshold: default_threshold(), local: true },
        ScorerConfig::JsonDiff { threshold: default_threshold() },
        ScorerConfig::ClassifyJudge,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = EvalConfig::from_yaml("{}").unwrap();
        assert_eq!(config.name, "My Eval");
        assert_eq!(config.endpoint, EndpointConfig::default());
        assert_eq!(config.endpoint.base_url, "http://localhost:11434/v1");
        assert_eq!(config.endpoint.api_key, "TEST");
        assert_eq!(config.endpoint.model, "llama3.2");
        assert_eq!(config.endpoint.max_retries, 5);
        assert_eq!(config.scorers.len(), 4);
        assert_eq!(config.concurrency, 5);
        assert!(config.data.is_none());
    }

    #[test]
    fn parses_scorers_and_endpoint() {
        let yaml = r#"
name: Spam check
endpoint:
  base_url: http://127.0.0.1:8080/v1
  model: qwen2.5
data:
  path: cases.jsonl
scorers:
  - type: levenshtein
    threshold: 0.8
  - type: factuality
    local: false
  - type: classify_judge
concurrency: 2
"#;
        let config = EvalConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, "Spam check");
        assert_eq!(config.endpoint.base_url, "http://127.0.0.1:8080/v1");
        assert_eq!(config.endpoint.model, "qwen2.5");
        assert_eq!(config.endpoint.api_key, "TEST");
        assert_eq!(config.data.unwrap().path, PathBuf::from("cases.jsonl"));
        assert_eq!(
            config.scorers,
            vec![
                ScorerConfig::Levenshtein { threshold: 0.8 },
                ScorerConfig::Factuality { threshold: 0.5, local: false },
                ScorerConfig::ClassifyJudge,
            ]
        );
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn rejects_unknown_scorer() {
        assert!(EvalConfig::from_yaml("scorers:\n  - type: bleu\n").is_err());
    }
}
