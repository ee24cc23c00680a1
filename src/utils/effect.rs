//! Side effects around a primary write are either required (failure aborts
//! the operation) or best-effort (failure is logged and swallowed).

use std::fmt::Display;
use std::future::Future;

use crate::error::{AppError, AppResult};

/// Runs a blob-store step that the operation cannot complete without.
pub async fn required<T, E, F>(operation: &'static str, effect: F) -> AppResult<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    effect.await.map_err(|err| {
        tracing::error!(operation, error = %err, "required side effect failed");
        AppError::storage(err)
    })
}

/// Runs a step whose failure must not fail the surrounding operation.
pub async fn best_effort<T, E, F>(operation: &'static str, effect: F) -> Option<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match effect.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(operation, error = %err, "best-effort side effect failed");
            None
        }
    }
}
