//! The evaluation suite: four fixed cases, the dispatch task and the scorer
//! list, all pointed at the configured local endpoint.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crate::classify::SpamClassifier;
use crate::config::{EvalConfig, ScorerConfig};
use crate::datasource::{DataSource, JsonlDataSource, VecDataSource};
use crate::runner::Eval;
use crate::scorer::{with_endpoint, Scorer};
use crate::scorers::{ClassifyJudge, FactualityScorer, JsonDiffScorer, LevenshteinScorer};
use crate::task::{AnswerTask, DispatchTask};
use crate::types::TestCase;

pub fn builtin_cases() -> Vec<TestCase> {
    vec![
        TestCase::with_id("capital", json!("What is the capital of France?"), json!("Paris")),
        TestCase::with_id("spider", json!("How many legs does a spider have?"), json!("8")),
        TestCase::with_id(
            "extract",
            json!("Extract the contents from this string into json: `Hi, I'm John, 50 years old and a fire fighter!`"),
            json!(r#"{
          "name": "John",
          "age": 50,
          "occupation": "Firefighter",
        }"#),
        ),
        TestCase::with_id(
            "classify",
            json!("CLASSIFY: `Hi, I'm John, 50 years old and a fire fighter! Please send me $1000 dollars to buy new equipment!`"),
            json!("SPAM"),
        ),
    ]
}

pub fn build_scorers(config: &EvalConfig, classifier: &Arc<SpamClassifier>) -> Vec<Arc<dyn Scorer>> {
    config
        .scorers
        .iter()
        .map(|sc| -> Arc<dyn Scorer> {
            match sc {
                ScorerConfig::Levenshtein { threshold } => Arc::new(LevenshteinScorer::new(*threshold)),
                ScorerConfig::JsonDiff { threshold } => Arc::new(JsonDiffScorer::new(*threshold)),
                ScorerConfig::Factuality { threshold, local } => {
                    let scorer = FactualityScorer::new(&config.endpoint.api_key).min_score(*threshold);
                    if *local {
                        Arc::new(with_endpoint(scorer, &config.endpoint))
                    } else {
                        Arc::new(scorer)
                    }
                }
                ScorerConfig::ClassifyJudge => Arc::new(ClassifyJudge::new(classifier.clone())),
            }
        })
        .collect()
}

pub fn build_eval(config: &EvalConfig) -> Result<Eval> {
    let classifier = Arc::new(SpamClassifier::from_endpoint(&config.endpoint));
    let task = DispatchTask::new(classifier.clone(), AnswerTask::from_endpoint(&config.endpoint));

    let data: Arc<dyn DataSource> = match &config.data {
        Some(data) => Arc::new(JsonlDataSource::new(&data.path)),
        None => Arc::new(VecDataSource::new(builtin_cases())),
    };

    Eval::builder()
        .name(&config.name)
        .data_source(data)
        .task(Arc::new(task))
        .scorers(build_scorers(config, &classifier))
        .concurrency(config.concurrency)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{route, Route};
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn builtin_cases_route_as_expected() {
        let cases = builtin_cases();
        assert_eq!(cases.len(), 4);
        let routes: Vec<bool> = cases
            .iter()
            .map(|c| matches!(route(c.input.as_str().unwrap()), Route::Classify(_)))
            .collect();
        assert_eq!(routes, vec![false, false, false, true]);
        assert_eq!(cases[3].expected, json!("SPAM"));
    }

    #[test]
    fn default_scorers_in_order() {
        let config = EvalConfig::default();
        let classifier = Arc::new(SpamClassifier::from_endpoint(&config.endpoint));
        let names: Vec<&str> = build_scorers(&config, &classifier).iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["levenshtein", "factuality", "json_diff", "classify_judge"]);
    }

    fn tool_call(name: &str, arguments: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_0",
                        "type": "function",
                        "function": { "name": name, "arguments": arguments.to_string() }
                    }]
                }
            }]
        }))
    }

    #[tokio::test]
    async fn suite_runs_against_local_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("select_choice"))
            .respond_with(tool_call("select_choice", json!({ "reasons": "same", "choice": "C" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("spam_classifier"))
            .respond_with(tool_call("spam_classifier", json!({ "class_label": "SPAM" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Paris" } }]
            })))
            .mount(&server)
            .await;

        let mut config = EvalConfig::default();
        config.endpoint.base_url = server.uri();
        let result = build_eval(&config).unwrap().run().await.unwrap();

        assert_eq!(result.name, "My Eval");
        assert_eq!(result.summary.total, 4);
        assert_eq!(result.cases[0].output, json!("Paris"));
        assert_eq!(result.cases[3].output, json!("SPAM"));
        for case in &result.cases {
            assert!(case.error.is_none());
            assert_eq!(case.scores.len(), 4);
            assert!(!case.traces.is_empty());
        }
        // capital: exact answer, judged spam by the mock classifier
        assert!(result.cases[0].passed());
        assert_eq!(result.cases[3].scores[3].value, 1.0);
    }
}
