//! localeval-core: evaluate a local OpenAI-compatible model.
//! Compose a data source, a task and scorers; run with bounded concurrency.
//! [`suite`] wires the built-in cases, the dispatch task and the default
//! scorers to an endpoint described by [`EvalConfig`].

pub mod classify;
pub mod config;
pub mod datasource;
pub mod error;
pub mod llm;
pub mod runner;
pub mod scorer;
pub mod structured;
pub mod suite;
pub mod task;
pub mod testing;
pub mod trace;
pub mod types;

pub mod scorers {
    pub mod classify_judge;
    pub mod factuality;
    pub mod json_diff;
    pub mod levenshtein;

    pub use classify_judge::ClassifyJudge;
    pub use factuality::FactualityScorer;
    pub use json_diff::JsonDiffScorer;
    pub use levenshtein::LevenshteinScorer;
}

pub use classify::{ClassLabel, Classification, SpamClassifier};
pub use config::{EndpointConfig, EvalConfig, ScorerConfig};
pub use datasource::{DataSource, JsonlDataSource, VecDataSource};
pub use error::{LlmError, LlmResult};
pub use llm::ChatClient;
pub use runner::{Eval, EvalBuilder};
pub use scorer::{with_endpoint, Scorer, ScorerArgs, WithEndpoint};
pub use scorers::{ClassifyJudge, FactualityScorer, JsonDiffScorer, LevenshteinScorer};
pub use task::{from_async_fn, AnswerTask, DispatchTask, Task};
pub use types::{CaseResult, EvalResult, EvalSummary, Score, TestCase};
