// Offline quickstart: an echo task scored with the local-only scorers.
//
//   cargo run -p localeval-core --example simple [cases.jsonl]

use std::sync::Arc;

use localeval_core::{
    from_async_fn, Eval, JsonDiffScorer, JsonlDataSource, LevenshteinScorer, Scorer, TestCase,
    VecDataSource,
};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data: Arc<dyn localeval_core::DataSource> = match std::env::args().nth(1) {
        Some(path) => Arc::new(JsonlDataSource::new(path)),
        None => Arc::new(VecDataSource::new(vec![
            TestCase::with_id("0", json!("Hello"), json!("Hello World!")),
            TestCase::with_id("1", json!("{\"greeting\": \"Hi\"}"), json!({"greeting": "Hi World!"})),
        ])),
    };

    let task = from_async_fn(|input| {
        let input = input.clone();
        async move {
            let s = input.as_str().unwrap_or_default();
            Ok(json!(format!("{s} World!")))
        }
    });

    let scorers: Vec<Arc<dyn Scorer>> = vec![
        Arc::new(LevenshteinScorer::new(0.9)),
        Arc::new(JsonDiffScorer::default()),
    ];

    let eval = Eval::builder()
        .name("echo")
        .data_source(data)
        .task(task)
        .scorers(scorers)
        .build()?;

    let result = eval.run().await?;
    println!("{}", result.summary_table());
    Ok(())
}
