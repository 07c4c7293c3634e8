use std::sync::Arc;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tracing::{info, info_span, warn, Instrument};

use crate::datasource::DataSource;
use crate::scorer::{Scorer, ScorerArgs};
use crate::task::Task;
use crate::trace::scope_traces;
use crate::types::{CaseResult, EvalResult, Score, TestCase};

pub struct EvalBuilder {
	name: String,
	data_source: Option<Arc<dyn DataSource>>,
	task: Option<Arc<dyn Task>>,
	scorers: Vec<Arc<dyn Scorer>>,
	concurrency: usize,
}

impl EvalBuilder {
	pub fn new() -> Self {
		Self {
			name: "eval".to_string(),
			data_source: None,
			task: None,
			scorers: Vec::new(),
			concurrency: 5,
		}
	}

	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn data_source(mut self, data_source: Arc<dyn DataSource>) -> Self {
		self.data_source = Some(data_source);
		self
	}

	pub fn task(mut self, task: Arc<dyn Task>) -> Self {
		self.task = Some(task);
		self
	}

	pub fn scorers<I>(mut self, scorers: I) -> Self
	where
		I: IntoIterator<Item = Arc<dyn Scorer>>,
	{
		self.scorers = scorers.into_iter().collect();
		self
	}

	pub fn add_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
		self.scorers.push(scorer);
		self
	}

	pub fn concurrency(mut self, n: usize) -> Self {
		self.concurrency = n.max(1);
		self
	}

	pub fn build(self) -> Result<Eval> {
		Ok(Eval {
			name: self.name,
			data_source: self.data_source.ok_or_else(|| anyhow::anyhow!("data_source must be set"))?,
			task: self.task.ok_or_else(|| anyhow::anyhow!("task must be set"))?,
			scorers: self.scorers,
			concurrency: self.concurrency,
		})
	}
}

impl Default for EvalBuilder {
	fn default() -> Self {
		Self::new()
	}
}

pub struct Eval {
	name: String,
	data_source: Arc<dyn DataSource>,
	task: Arc<dyn Task>,
	scorers: Vec<Arc<dyn Scorer>>,
	concurrency: usize,
}

impl Eval {
	pub fn builder() -> EvalBuilder {
		EvalBuilder::new()
	}

	pub async fn run(&self) -> Result<EvalResult> {
		let cases = self.data_source.load().await?;
		info!(eval = %self.name, cases = cases.len(), concurrency = self.concurrency, "starting eval");

		let results = self.run_cases(cases).await;
		let summary = EvalResult::summarize(&results);
		info!(
			eval = %self.name,
			passed = summary.passed,
			total = summary.total,
			avg_score = summary.avg_score,
			"eval finished"
		);
		Ok(EvalResult { name: self.name.clone(), cases: results, summary })
	}

	/// Runs cases with bounded concurrency; results keep the input order.
	async fn run_cases(&self, cases: Vec<TestCase>) -> Vec<CaseResult> {
		let stream = stream::iter(cases.into_iter().enumerate()).map(|(idx, case)| {
			let span = info_span!("case", idx, id = case.id.as_deref().unwrap_or("-"));
			let task = self.task.clone();
			let scorers = self.scorers.clone();
			async move {
				let (mut result, traces) = scope_traces(run_case(task, scorers, case)).await;
				result.traces = traces;
				result
			}
			.instrument(span)
		});

		stream.buffered(self.concurrency).collect().await
	}
}

async fn run_case(task: Arc<dyn Task>, scorers: Vec<Arc<dyn Scorer>>, case: TestCase) -> CaseResult {
	let output = match task.run(&case.input).await {
		Ok(output) => output,
		Err(err) => {
			warn!(error = %err, "task failed");
			return CaseResult {
				case,
				output: serde_json::Value::Null,
				error: Some(format!("{err:#}")),
				scores: Vec::new(),
				traces: Vec::new(),
			};
		}
	};

	let args = ScorerArgs::new(case.input.clone(), output, case.expected.clone());
	let mut scores = Vec::with_capacity(scorers.len());
	for s in &scorers {
		match s.score(&args).await {
			Ok(score) => scores.push(score),
			Err(err) => {
				warn!(scorer = s.name(), error = %err, "scorer failed");
				scores.push(Score::failed(s.name(), format!("{err:#}")));
			}
		}
	}

	CaseResult {
		case,
		output: args.output,
		error: None,
		scores,
		traces: Vec::new(),
	}
}
