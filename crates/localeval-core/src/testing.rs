use crate::types::EvalResult;
use anyhow::Result;

/// Fail when the share of passing cases is below `min_pass_rate`.
///
/// Works in `#[tokio::test]` functions and backs the CLI's `--min-pass-rate`.
///
/// # Example
/// ```ignore
/// #[tokio::test]
/// async fn local_model_meets_bar() -> Result<()> {
///     let eval = localeval_core::suite::build_eval(&EvalConfig::default())?;
///     let result = eval.run().await?;
///     assert_eval_pass_rate(&result, 0.75)?;
///     Ok(())
/// }
/// ```
pub fn assert_eval_pass_rate(result: &EvalResult, min_pass_rate: f64) -> Result<()> {
    if result.summary.pass_rate < min_pass_rate {
        anyhow::bail!(
            "{}: pass rate {:.1}% is below threshold {:.1}%\n{}",
            result.name,
            result.summary.pass_rate * 100.0,
            min_pass_rate * 100.0,
            result.summary_table()
        );
    }
    Ok(())
}

pub fn assert_eval_avg_score(result: &EvalResult, min_avg_score: f64) -> Result<()> {
    if result.summary.avg_score < min_avg_score {
        anyhow::bail!(
            "{}: avg score {:.3} is below threshold {:.3}\n{}",
            result.name,
            result.summary.avg_score,
            min_avg_score,
            result.summary_table()
        );
    }
    Ok(())
}

pub fn assert_eval_all_passed(result: &EvalResult) -> Result<()> {
    if result.summary.passed != result.summary.total {
        anyhow::bail!(
            "{}: {}/{} cases passed\n{}",
            result.name,
            result.summary.passed,
            result.summary.total,
            result.summary_table()
        );
    }
    Ok(())
}
