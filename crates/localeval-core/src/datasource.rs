use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::types::TestCase;

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> Result<Vec<TestCase>>;
}

pub struct VecDataSource {
    cases: Vec<TestCase>,
}

impl VecDataSource {
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self { cases }
    }
}

#[async_trait]
impl DataSource for VecDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        Ok(self.cases.clone())
    }
}

/// Read JSONL where each line is either:
/// - {"id": "...", "input": ..., "expected": ...}
/// - {"input": ..., "expected": ...}
pub struct JsonlDataSource {
    path: PathBuf,
}

impl JsonlDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for JsonlDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        parse_jsonl(&content)
    }
}

fn parse_jsonl(content: &str) -> Result<Vec<TestCase>> {
    let mut cases = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Invalid JSON on line {}", idx + 1))?;
        let obj = value
            .as_object()
            .ok_or_else(|| anyhow!("Line {}: expected object", idx + 1))?;
        let input = obj
            .get("input")
            .cloned()
            .ok_or_else(|| anyhow!("Line {}: missing 'input'", idx + 1))?;
        let expected = obj.get("expected").cloned().unwrap_or(Value::Null);
        let id = obj.get("id").map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        cases.push(TestCase {
            id,
            input,
            expected,
        });
    }
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_lines_and_skips_blanks() {
        let content = r#"
{"id": "capital", "input": "What is the capital of France?", "expected": "Paris"}

{"id": 2, "input": "How many legs does a spider have?", "expected": "8"}
{"input": "CLASSIFY: hello"}
"#;
        let cases = parse_jsonl(content).unwrap();
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[0].id.as_deref(), Some("capital"));
        assert_eq!(cases[1].id.as_deref(), Some("2"));
        assert_eq!(cases[1].expected, json!("8"));
        assert!(cases[2].id.is_none());
        assert!(cases[2].expected.is_null());
    }

    #[test]
    fn reports_line_numbers() {
        let err = parse_jsonl("{\"input\": 1}\n{\"expected\": 2}\n").unwrap_err();
        assert!(err.to_string().contains("Line 2: missing 'input'"));

        let err = parse_jsonl("not json").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let source = JsonlDataSource::new("/nonexistent/cases.jsonl");
        assert!(source.load().await.is_err());
    }
}
