//! Supervised background tasks.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;

/// Spawns `fut`, logging its error instead of propagating it.
///
/// Background work (validation, replenishing, skips) must never take the
/// coordinator down; a failure ends that one task and leaves a log line.
pub fn supervise<F, E>(name: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            tracing::error!(task = name, error = %e, "background task failed");
        }
    })
}
