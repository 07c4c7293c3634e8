use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use localeval_types::value_preview;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{ChatClient, ChatMessage};
use crate::scorer::{Scorer, ScorerArgs};
use crate::structured::{create_structured, StructuredOutput};
use crate::types::Score;

pub const DEFAULT_JUDGE_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_JUDGE_MODEL: &str = "gpt-4o";

const PROMPT: &str = r#"You are comparing a submitted answer to an expert answer on a given question. Here is the data:
[BEGIN DATA]
************
[Question]: {input}
************
[Expert]: {expected}
************
[Submission]: {output}
************
[END DATA]

Compare the factual content of the submitted answer with the expert answer. Ignore any differences in style, grammar, or punctuation.
The submitted answer may either be a subset or superset of the expert answer, or it may conflict with it. Determine which case applies. Answer the question by selecting one of the following options:
(A) The submitted answer is a subset of the expert answer and is fully consistent with it.
(B) The submitted answer is a superset of the expert answer and is fully consistent with it.
(C) The submitted answer contains all the same details as the expert answer.
(D) There is a disagreement between the submitted answer and the expert answer.
(E) The answers differ, but these differences don't matter from the perspective of factuality."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FactualityChoice {
    A,
    B,
    C,
    D,
    E,
}

impl FactualityChoice {
    pub fn score(self) -> f64 {
        match self {
            FactualityChoice::A => 0.4,
            FactualityChoice::B => 0.6,
            FactualityChoice::C => 1.0,
            FactualityChoice::D => 0.0,
            FactualityChoice::E => 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SelectChoice {
    reasons: String,
    choice: FactualityChoice,
}

impl StructuredOutput for SelectChoice {
    const NAME: &'static str = "select_choice";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reasons": {
                    "type": "string",
                    "description": "Write out in a step by step manner your reasoning to be sure that your conclusion is correct. Avoid simply stating the correct answer at the outset."
                },
                "choice": {
                    "type": "string",
                    "enum": ["A", "B", "C", "D", "E"],
                    "description": "The choice"
                }
            },
            "required": ["reasons", "choice"]
        })
    }
}

/// LLM judge for factual agreement between output and expected.
///
/// Talks to the hosted default unless the call arrives through
/// `with_endpoint`, which supplies `base_url` and `model`.
pub struct FactualityScorer {
    client: ChatClient,
    model: String,
    pub min_score: f64,
    pub max_retries: u32,
}

impl FactualityScorer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: ChatClient::new(DEFAULT_JUDGE_BASE_URL, api_key),
            model: DEFAULT_JUDGE_MODEL.to_string(),
            min_score: 0.5,
            max_retries: 0,
        }
    }

    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl Scorer for FactualityScorer {
    fn name(&self) -> &'static str {
        "factuality"
    }

    async fn score(&self, args: &ScorerArgs) -> Result<Score> {
        if args.expected.is_null() {
            bail!("factuality requires an expected value");
        }

        let client = match &args.base_url {
            Some(url) if url != self.client.base_url() => self.client.with_base_url(url),
            _ => self.client.clone(),
        };
        let model = args.model.as_deref().unwrap_or(&self.model);

        let prompt = PROMPT
            .replace("{input}", &value_preview(&args.input))
            .replace("{expected}", &value_preview(&args.expected))
            .replace("{output}", &value_preview(&args.output));

        let selection: SelectChoice = create_structured(
            &client,
            model,
            vec![ChatMessage::user(prompt)],
            self.max_retries,
        )
        .await
        .context("factuality judge failed")?;

        let mut score = Score::with_threshold(self.name(), selection.choice.score(), self.min_score);
        score.metadata = Some(json!({
            "choice": format!("{:?}", selection.choice),
            "rationale": selection.reasons,
        }));
        score.reason = Some(selection.reasons);
        Ok(score)
    }
}
