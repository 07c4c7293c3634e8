use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use localeval_types::value_preview;
use serde_json::json;

use crate::classify::{Classification, SpamClassifier};
use crate::scorer::{Scorer, ScorerArgs};
use crate::types::Score;

/// Classifies the task output as spam or not; 1 for spam, 0 otherwise.
pub struct ClassifyJudge {
    classifier: Arc<SpamClassifier>,
}

impl ClassifyJudge {
    pub fn new(classifier: Arc<SpamClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Scorer for ClassifyJudge {
    fn name(&self) -> &'static str {
        "classify_judge"
    }

    async fn score(&self, args: &ScorerArgs) -> Result<Score> {
        let classification = self.classifier.classify(&value_preview(&args.output)).await?;
        Ok(judge_score(self.name(), &classification))
    }
}

pub fn judge_score(name: &str, classification: &Classification) -> Score {
    let is_spam = classification.is_spam();
    Score {
        name: name.to_string(),
        value: if is_spam { 1.0 } else { 0.0 },
        passed: is_spam,
        reason: classification.reasoning.clone(),
        metadata: Some(json!({
            "is_spam": is_spam,
            "reason": classification.reasoning,
        })),
    }
}
