use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::SystemTime;
use tabled::Tabled;

/// Record of a single LLM call made while a case was running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// When the call started
    pub start: SystemTime,

    /// When the call ended
    pub end: SystemTime,

    /// Duration of the call in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Model name (e.g., "llama3.2")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Request messages sent to the model
    pub input: Value,

    /// Message returned by the model
    pub output: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    /// Error if the call failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Trace {
    /// Start timing a call. Finish it with [`TraceBuilder::finish`] or
    /// [`TraceBuilder::finish_with_error`].
    pub fn start_now() -> TraceBuilder {
        TraceBuilder {
            start: SystemTime::now(),
            model: None,
        }
    }
}

pub struct TraceBuilder {
    start: SystemTime,
    model: Option<String>,
}

impl TraceBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn finish(self, input: Value, output: Value, usage: Option<TokenUsage>) -> Trace {
        self.complete(input, output, usage, None)
    }

    pub fn finish_with_error(self, input: Value, error: impl Into<String>) -> Trace {
        self.complete(input, Value::Null, None, Some(error.into()))
    }

    fn complete(
        self,
        input: Value,
        output: Value,
        usage: Option<TokenUsage>,
        error: Option<String>,
    ) -> Trace {
        let end = SystemTime::now();
        let duration_ms = end
            .duration_since(self.start)
            .ok()
            .map(|d| d.as_millis() as u64);

        Trace {
            start: self.start,
            end,
            duration_ms,
            model: self.model,
            input,
            output,
            usage,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
	pub id: Option<String>,
	pub input: Value,
	pub expected: Value,
}

impl TestCase {
	pub fn new(input: Value, expected: Value) -> Self {
		Self { id: None, input, expected }
	}

	pub fn with_id(id: impl Into<String>, input: Value, expected: Value) -> Self {
		Self { id: Some(id.into()), input, expected }
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
	pub name: String,
	pub value: f64,
	pub passed: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metadata: Option<Value>,
}

impl Score {
	/// A score that passes when `value` reaches `threshold`.
	pub fn with_threshold(name: impl Into<String>, value: f64, threshold: f64) -> Self {
		Self {
			name: name.into(),
			value,
			passed: value >= threshold,
			reason: None,
			metadata: None,
		}
	}

	/// Zero score recorded when a scorer itself fails.
	pub fn failed(name: impl Into<String>, error: impl std::fmt::Display) -> Self {
		Self {
			name: name.into(),
			value: 0.0,
			passed: false,
			reason: None,
			metadata: Some(serde_json::json!({ "error": error.to_string() })),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
	pub case: TestCase,
	pub output: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub scores: Vec<Score>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub traces: Vec<Trace>,
}

impl CaseResult {
	pub fn passed(&self) -> bool {
		!self.scores.is_empty() && self.scores.iter().all(|s| s.passed)
	}

	pub fn avg_score(&self) -> f64 {
		if self.scores.is_empty() {
			return 0.0;
		}
		let sum: f64 = self.scores.iter().map(|s| s.value).sum();
		sum / (self.scores.len() as f64)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSummary {
	pub total: usize,
	pub passed: usize,
	pub pass_rate: f64,
	pub avg_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
	pub name: String,
	pub cases: Vec<CaseResult>,
	pub summary: EvalSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
struct SummaryRow {
	id: String,
	passed: String,
	avg_score: String,
	input: String,
	output: String,
	expected: String,
}

impl EvalResult {
	pub fn summarize(cases: &[CaseResult]) -> EvalSummary {
		let total = cases.len();
		let passed = cases.iter().filter(|cr| cr.passed()).count();
		let values: Vec<f64> = cases
			.iter()
			.flat_map(|cr| cr.scores.iter().map(|s| s.value))
			.collect();

		let pass_rate = if total == 0 { 0.0 } else { passed as f64 / total as f64 };
		let avg_score = if values.is_empty() {
			0.0
		} else {
			values.iter().sum::<f64>() / values.len() as f64
		};

		EvalSummary { total, passed, pass_rate, avg_score }
	}

	pub fn summary_table(&self) -> String {
		use tabled::Table;
		let rows: Vec<SummaryRow> = self.cases.iter().map(|cr| {
			let id = cr.case.id.clone().unwrap_or_else(|| "-".to_string());
			let passed = if cr.passed() { "✓" } else if cr.error.is_some() { "!" } else { " " };
			let output = match &cr.error {
				Some(err) => format!("error: {err}"),
				None => value_preview(&cr.output),
			};

			SummaryRow {
				id,
				passed: passed.to_string(),
				avg_score: format!("{:.3}", cr.avg_score()),
				input: truncate(value_preview(&cr.case.input), 64),
				output: truncate(output, 64),
				expected: truncate(value_preview(&cr.case.expected), 64),
			}
		}).collect();

		let table = Table::new(rows);

		let summary_text = format!(
			"{}  Total: {}  Passed: {}  Pass rate: {:.1}%  Avg score: {:.3}",
			self.name,
			self.summary.total,
			self.summary.passed,
			self.summary.pass_rate * 100.0,
			self.summary.avg_score
		);

		format!("{}\n\n{}\n", table, summary_text)
	}
}

/// Plain text for string values, compact JSON for everything else.
pub fn value_preview(v: &Value) -> String {
	match v {
		Value::String(s) => s.clone(),
		Value::Null => String::new(),
		_ => v.to_string(),
	}
}

fn truncate(s: String, max_len: usize) -> String {
	let s = s.replace('\n', " ");
	if s.chars().count() <= max_len {
		return s;
	}
	let mut truncated = s.chars().take(max_len.saturating_sub(1)).collect::<String>();
	truncated.push('…');
	truncated
}
