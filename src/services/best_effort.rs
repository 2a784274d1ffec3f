//! Fire-and-forget side effects.
//!
//! Observability calls (failure reports, memory events) must never block a
//! workflow transition. Routing them through [`best_effort`] keeps every
//! discarded error visible at the call site and in the logs.

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Await `fut`, returning its value, or log and discard its error.
pub async fn best_effort<T, E, F>(label: &str, fut: F) -> Option<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(side_effect = label, error = %e, "best-effort side effect failed; continuing");
            None
        }
    }
}
