//! Running synchronous port calls as cancelable units of work
//!
//! Every call runs on the blocking pool with its own child token. The caller
//! stops waiting as soon as the run token fires or the timeout elapses; the
//! child token is then canceled so the port can return promptly.

use corroborate_domain::{
    CancellationToken, ReasoningError, ReasoningPort, ReasoningRequest, RetrievalError,
    RetrievalPort, SourceDocument, SubQuery,
};
use std::sync::Arc;
use std::time::Duration;

/// Call a reasoning port, giving up when `cancel` fires
pub(crate) async fn reason(
    port: Arc<dyn ReasoningPort>,
    request: ReasoningRequest,
    cancel: &CancellationToken,
) -> Result<String, ReasoningError> {
    if cancel.is_cancelled() {
        return Err(ReasoningError::Canceled);
    }
    let call_token = cancel.child_token();
    let worker_token = call_token.clone();
    let _guard = call_token.drop_guard();

    let handle = tokio::task::spawn_blocking(move || port.generate(&request, &worker_token));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReasoningError::Canceled),
        joined = handle => joined.unwrap_or_else(|e| {
            Err(ReasoningError::Unavailable(format!("reasoning task failed: {}", e)))
        }),
    }
}

/// Call a retrieval port, giving up when `cancel` fires or the port's call
/// budget for `timeout` is spent
pub(crate) async fn retrieve(
    port: Arc<dyn RetrievalPort>,
    sub_query: SubQuery,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<SourceDocument>, RetrievalError> {
    if cancel.is_cancelled() {
        return Err(RetrievalError::Canceled);
    }
    let call_token = cancel.child_token();
    let worker_token = call_token.clone();
    let _guard = call_token.drop_guard();

    let budget = port.call_budget(timeout);
    let handle =
        tokio::task::spawn_blocking(move || port.retrieve(&sub_query, timeout, &worker_token));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RetrievalError::Canceled),
        joined = tokio::time::timeout(budget, handle) => match joined {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RetrievalError::Unavailable(format!("source task failed: {}", e))),
            Err(_) => Err(RetrievalError::Timeout),
        },
    }
}
