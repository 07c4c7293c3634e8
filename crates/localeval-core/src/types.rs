pub use localeval_types::{value_preview, CaseResult, EvalResult, EvalSummary, Score, TestCase};
