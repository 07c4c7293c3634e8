use anyhow::{bail, Result};
use async_trait::async_trait;
use localeval_types::value_preview;
use strsim::levenshtein;

use crate::scorer::{Scorer, ScorerArgs};
use crate::types::Score;

pub struct LevenshteinScorer {
    pub min_similarity: f64,
}

impl LevenshteinScorer {
    pub fn new(min_similarity: f64) -> Self {
        Self { min_similarity }
    }
}

impl Default for LevenshteinScorer {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[async_trait]
impl Scorer for LevenshteinScorer {
    fn name(&self) -> &'static str {
        "levenshtein"
    }

    async fn score(&self, args: &ScorerArgs) -> Result<Score> {
        if args.expected.is_null() {
            bail!("levenshtein requires an expected value");
        }
        let similarity = similarity(&value_preview(&args.output), &value_preview(&args.expected));
        Ok(Score::with_threshold(self.name(), similarity, self.min_similarity))
    }
}

/// Normalized edit similarity in `0.0..=1.0`, counted in chars.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}
