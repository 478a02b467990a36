//! Repeating an evaluation once per live selection.

use std::future::Future;

use crate::app::context::ExecutionContext;
use crate::domain::errors::EvalError;

/// Evaluate `evaluate` once per live selection, in order, with that selection as the only one.
///
/// After every call the (possibly moved) live selection is read back, and once all selections
/// have been visited the document receives one updated selection per original index. With no
/// selections `evaluate` is never called and nothing is written back.
pub async fn with_each_selection<T, F, Fut>(
    cx: &ExecutionContext<'_>,
    mut evaluate: F,
) -> Result<Vec<T>, EvalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EvalError>>,
{
    let snapshot = cx.selections();
    tracing::debug!(selections = snapshot.len(), "evaluating once per selection");

    let mut results = Vec::with_capacity(snapshot.len());
    let mut updated = Vec::with_capacity(snapshot.len());

    for (index, selection) in snapshot.iter().enumerate() {
        cx.set_selections(vec![*selection]);
        results.push(evaluate().await?);

        match cx.selections().first() {
            Some(live) => updated.push(*live),
            None => {
                tracing::warn!(index, "command left no live selection; keeping the original");
                updated.push(*selection);
            }
        }
    }

    // No selections means nothing to restore, so the document is left untouched.
    if !snapshot.is_empty() {
        cx.set_selections(updated);
    }

    Ok(results)
}
