use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::levenshtein::similarity;
use crate::scorer::{Scorer, ScorerArgs};
use crate::types::Score;

/// Structural similarity between output and expected JSON.
///
/// Strings that parse as JSON are compared as the parsed value, so a model
/// answering with JSON text is scored against the expected document.
pub struct JsonDiffScorer {
	pub min_similarity: f64,
}

impl JsonDiffScorer {
	pub fn new(min_similarity: f64) -> Self {
		Self { min_similarity }
	}
}

impl Default for JsonDiffScorer {
	fn default() -> Self {
		Self::new(0.5)
	}
}

#[async_trait]
impl Scorer for JsonDiffScorer {
	fn name(&self) -> &'static str {
		"json_diff"
	}

	async fn score(&self, args: &ScorerArgs) -> Result<Score> {
		let value = json_diff(&args.output, &args.expected);
		Ok(Score::with_threshold(self.name(), value, self.min_similarity))
	}
}

pub fn json_diff(output: &Value, expected: &Value) -> f64 {
	let output = parse_if_json(output);
	let expected = parse_if_json(expected);

	match (&output, &expected) {
		(Value::Object(o), Value::Object(e)) => object_diff(o, e),
		(Value::Array(o), Value::Array(e)) => array_diff(o, e),
		(o, e) if o == e => 1.0,
		(Value::Null, _) | (_, Value::Null) => 0.0,
		(Value::Number(o), Value::Number(e)) => {
			number_diff(o.as_f64().unwrap_or(0.0), e.as_f64().unwrap_or(0.0))
		}
		(Value::String(o), Value::String(e)) => similarity(o, e),
		(o, e) => similarity(&json_text(o), &json_text(e)),
	}
}

fn object_diff(output: &Map<String, Value>, expected: &Map<String, Value>) -> f64 {
	let mut keys: Vec<&String> = output.keys().chain(expected.keys()).collect();
	keys.sort();
	keys.dedup();
	if keys.is_empty() {
		return 1.0;
	}

	let total: f64 = keys
		.iter()
		.map(|k| match (output.get(*k), expected.get(*k)) {
			(Some(o), Some(e)) => json_diff(o, e),
			_ => 0.0,
		})
		.sum();
	total / keys.len() as f64
}

fn array_diff(output: &[Value], expected: &[Value]) -> f64 {
	let len = output.len().max(expected.len());
	if len == 0 {
		return 1.0;
	}

	let total: f64 = output
		.iter()
		.zip(expected.iter())
		.map(|(o, e)| json_diff(o, e))
		.sum();
	total / len as f64
}

fn number_diff(output: f64, expected: f64) -> f64 {
	let denom = output.abs() + expected.abs();
	if denom == 0.0 {
		return 1.0;
	}
	1.0 - (output - expected).abs() / denom
}

fn parse_if_json(v: &Value) -> Value {
	match v {
		Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| v.clone()),
		_ => v.clone(),
	}
}

fn json_text(v: &Value) -> String {
	match v {
		Value::String(s) => s.clone(),
		_ => v.to_string(),
	}
}
