//! The guarded STARTED -> COMPLETED transition behind every submit.

use crate::core::time::primitive_now_utc;
use crate::repositories::{RecordStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Completed,
    /// Nothing transitioned; another submit got there first.
    AlreadyCompleted,
}

pub async fn complete_attempt(
    store: &dyn RecordStore,
    attempt_id: &str,
) -> Result<Completion, StoreError> {
    match store.complete_attempt(attempt_id, primitive_now_utc()).await {
        Ok(true) => {
            metrics::counter!("attempt_submissions_total", "outcome" => "completed").increment(1);
            tracing::info!(attempt_id, "Attempt submitted");
            Ok(Completion::Completed)
        }
        Ok(false) => {
            metrics::counter!("attempt_submissions_total", "outcome" => "already_completed")
                .increment(1);
            tracing::info!(attempt_id, "Attempt was already completed elsewhere");
            Ok(Completion::AlreadyCompleted)
        }
        Err(err) => {
            metrics::counter!("attempt_submissions_total", "outcome" => "failed").increment(1);
            tracing::warn!(attempt_id, error = %err, "Attempt submission failed");
            Err(err)
        }
    }
}
