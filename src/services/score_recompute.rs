//! Authoritative scoring: rebuilds the report from stored answers with elevated access and
//! persists the total as the attempt's `final_score`.

use thiserror::Error;

use crate::db::types::AttemptStatus;
use crate::repositories::{AttemptScope, RecordStore, StoreError};
use crate::services::scoring::{build_report, Report};

#[derive(Debug, Error)]
pub enum RecomputeError {
    #[error("attemptId is required")]
    MissingAttemptId,
    #[error("Attempt not found")]
    AttemptNotFound,
    #[error("Attempt has not been submitted")]
    NotCompleted,
    #[error("Exam has no questions")]
    NoQuestions,
    #[error("Score {0} is out of range")]
    ScoreOutOfRange(i64),
    #[error("Record store failure: {0}")]
    Store(#[from] StoreError),
}

impl RecomputeError {
    pub fn outcome_label(&self) -> &'static str {
        match self {
            RecomputeError::MissingAttemptId => "invalid",
            RecomputeError::AttemptNotFound | RecomputeError::NoQuestions => "not_found",
            RecomputeError::NotCompleted => "not_completed",
            RecomputeError::ScoreOutOfRange(_) => "out_of_range",
            RecomputeError::Store(_) => "store_error",
        }
    }
}

#[derive(Debug)]
pub struct Recomputation {
    pub score: i32,
    pub report: Report,
}

/// Nothing is written unless the whole computation succeeds.
pub async fn recompute_final_score(
    store: &dyn RecordStore,
    attempt_id: &str,
) -> Result<Recomputation, RecomputeError> {
    let attempt_id = attempt_id.trim();
    if attempt_id.is_empty() {
        return Err(RecomputeError::MissingAttemptId);
    }

    let result = compute(store, attempt_id).await;
    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.outcome_label(),
    };
    metrics::counter!("score_recomputations_total", "outcome" => outcome).increment(1);
    result
}

async fn compute(
    store: &dyn RecordStore,
    attempt_id: &str,
) -> Result<Recomputation, RecomputeError> {
    let attempt = store
        .select_attempt(attempt_id, AttemptScope::Elevated)
        .await?
        .ok_or(RecomputeError::AttemptNotFound)?;
    if attempt.attempt.status != AttemptStatus::Completed {
        return Err(RecomputeError::NotCompleted);
    }

    let questions = store.select_questions_for_exam(&attempt.attempt.exam_id).await?;
    if questions.is_empty() {
        return Err(RecomputeError::NoQuestions);
    }
    let answers = store.select_answer_responses(attempt_id).await?;

    let report = build_report(&questions, &answers);
    let score = i32::try_from(report.total_score)
        .map_err(|_| RecomputeError::ScoreOutOfRange(report.total_score))?;

    store.set_final_score(attempt_id, score).await?;
    tracing::info!(attempt_id, score, "Final score recomputed");

    Ok(Recomputation { score, report })
}
