pub use localeval_types::{TokenUsage, Trace, TraceBuilder};

use std::cell::RefCell;

tokio::task_local! {
    static TRACES: RefCell<Vec<Trace>>;
}

/// Run a future within a tracing scope and return the result along with the
/// LLM calls it reported.
pub async fn scope_traces<F, R>(f: F) -> (R, Vec<Trace>)
where
    F: std::future::Future<Output = R>,
{
    TRACES
        .scope(RefCell::new(Vec::new()), async move {
            let result = f.await;
            let collected = TRACES.with(|t| t.take());
            (result, collected)
        })
        .await
}

/// Add a trace to the current scope. Outside a scope this is a no-op.
pub fn report_trace(trace: Trace) {
    let _ = TRACES.try_with(|traces| {
        traces.borrow_mut().push(trace);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn scope_collects_reported_traces() {
        let ((), traces) = scope_traces(async {
            report_trace(Trace::start_now().model("llama3.2").finish(json!("a"), json!("b"), None));
            report_trace(Trace::start_now().finish_with_error(json!("c"), "boom"));
        })
        .await;

        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].model.as_deref(), Some("llama3.2"));
        assert_eq!(traces[1].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn report_outside_scope_is_ignored() {
        report_trace(Trace::start_now().finish(json!("a"), json!("b"), None));
        let ((), traces) = scope_traces(async {}).await;
        assert!(traces.is_empty());
    }
}
