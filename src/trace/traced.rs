// Higher-order span instrumentation for async functions
//
// Design Decision: instrumentation is an explicit wrapper around a function
// value rather than an attribute or macro. The call site names the manager
// it traces through, so there is no hidden global state and tests can pass
// their own manager.

use crate::trace::manager::TraceManager;
use crate::trace::types::SpanKind;
use futures::future::BoxFuture;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// Wraps an async function so every invocation runs inside a method span
///
/// The returned closure behaves exactly like `f`: the value passes through
/// and errors propagate unchanged, with the span recording the failure.
///
/// Usage:
/// ```ignore
/// let load = traced(manager.clone(), "load_users", |id: u64| async move {
///     repo.load(id).await
/// });
/// let users = load(7).await?;
/// ```
pub fn traced<A, T, E, F, Fut>(
    manager: Arc<TraceManager>,
    name: impl Into<String>,
    f: F,
) -> impl Fn(A) -> BoxFuture<'static, std::result::Result<T, E>>
where
    A: Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
{
    let name = name.into();
    move |arg: A| {
        let manager = manager.clone();
        let name = name.clone();
        let f = f.clone();
        Box::pin(async move {
            manager
                .run_with_span(name, SpanKind::Method, None, move || f(arg))
                .await
        })
    }
}
