use std::future::Future;

use revtrail_core::AppResult;
use revtrail_domain::AuditContext;
use serde_json::Value;

tokio::task_local! {
    static AUDIT_CONTEXT: Value;
}

/// Runs `future` with `context` as the ambient audit context.
///
/// The context is visible only to code awaited inside `future` on the same
/// task and is dropped when the future completes.
pub async fn with_audit_context<F>(context: impl Into<Value>, future: F) -> F::Output
where
    F: Future,
{
    AUDIT_CONTEXT.scope(context.into(), future).await
}

fn current_audit_context_value() -> Value {
    AUDIT_CONTEXT
        .try_with(Clone::clone)
        .unwrap_or(Value::Null)
}

/// Returns the validated ambient context.
///
/// Fails with [`revtrail_core::AppError::InvalidContext`] when the scoped
/// value is not an object.
pub fn current_audit_context() -> AppResult<AuditContext> {
    AuditContext::from_value(current_audit_context_value())
}
