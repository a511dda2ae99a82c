use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{AttemptWithExam, User};
use crate::db::types::AttemptStatus;
use crate::repositories::{AttemptScope, StartedAttempt};
use crate::schemas::attempt::{
    AnswerSavedResponse, AnswerUpsertRequest, AttemptResponse, AttemptSessionResponse,
    AttemptStartResponse, ExamSummary, PublicQuestion, ReportResponse, SubmitResponse,
};
use crate::services::attempt_completion::{complete_attempt, Completion};
use crate::services::attempt_timing::{accepts_answers, seconds_left};
use crate::services::score_recompute::recompute_final_score;
use crate::services::scoring::build_report;

pub(crate) fn exams_router() -> Router<AppState> {
    Router::new().route("/:exam_id/attempts", post(start_attempt))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:attempt_id", get(get_attempt))
        .route("/:attempt_id/answers/:question_id", put(save_answer))
        .route("/:attempt_id/submit", post(submit_attempt))
        .route("/:attempt_id/report", get(get_report))
}

async fn start_attempt(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AttemptStartResponse>), ApiError> {
    let exam = state
        .store()
        .find_exam(&exam_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let started = state
        .store()
        .start_attempt(&user.id, &exam.id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::store(e, "Failed to start attempt"))?;

    let (status, resumed) = match &started {
        StartedAttempt::Created(attempt) => {
            tracing::info!(
                attempt_id = %attempt.id,
                exam_id = %exam.id,
                user_id = %user.id,
                "Attempt started"
            );
            (StatusCode::CREATED, false)
        }
        StartedAttempt::Resumed(attempt) => {
            tracing::debug!(attempt_id = %attempt.id, "Resuming attempt in progress");
            (StatusCode::OK, true)
        }
    };

    let attempt = AttemptResponse::from(started.attempt());
    Ok((status, Json(AttemptStartResponse { attempt, resumed })))
}

async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptSessionResponse>, ApiError> {
    let row = load_owned_attempt(&state, &user, &attempt_id).await?;

    let links = state
        .store()
        .select_questions_for_exam(&row.attempt.exam_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to fetch questions"))?;
    if links.is_empty() {
        return Err(ApiError::NotFound("Exam has no questions".to_string()));
    }
    let answers = state
        .store()
        .select_answer_responses(&attempt_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to fetch answers"))?;

    let time_left_seconds = match row.attempt.status {
        AttemptStatus::Started => {
            seconds_left(row.attempt.start_time, row.duration_minutes, primitive_now_utc())
        }
        AttemptStatus::Completed => 0,
    };

    Ok(Json(AttemptSessionResponse {
        attempt: AttemptResponse::from(&row.attempt),
        exam: ExamSummary::from(&row),
        questions: links.iter().filter_map(PublicQuestion::from_link).collect(),
        answers,
        time_left_seconds,
    }))
}

async fn save_answer(
    Path((attempt_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AnswerUpsertRequest>,
) -> Result<Json<AnswerSavedResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let row = load_owned_attempt(&state, &user, &attempt_id).await?;
    if row.attempt.status == AttemptStatus::Completed {
        return Err(ApiError::Conflict("Attempt already submitted".to_string()));
    }
    let grace = state.settings().exam().answer_grace_seconds;
    if !accepts_answers(row.attempt.start_time, row.duration_minutes, primitive_now_utc(), grace) {
        return Err(ApiError::Conflict("Attempt time is over".to_string()));
    }

    let links = state
        .store()
        .select_questions_for_exam(&row.attempt.exam_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to fetch questions"))?;
    if !links.iter().any(|link| link.question_id == question_id && link.question.is_some()) {
        return Err(ApiError::NotFound("Question not found in this exam".to_string()));
    }

    let action = payload.stored_action();
    state
        .store()
        .upsert_answer_response(&attempt_id, &question_id, payload.selected_answer.as_ref(), action)
        .await
        .map_err(|e| {
            metrics::counter!("answer_saves_total", "outcome" => "failed").increment(1);
            ApiError::store(e, "Failed to save answer")
        })?;
    metrics::counter!("answer_saves_total", "outcome" => "saved").increment(1);

    Ok(Json(AnswerSavedResponse {
        attempt_id,
        question_id,
        selected_answer: payload.selected_answer,
        action,
    }))
}

async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let row = load_owned_attempt(&state, &user, &attempt_id).await?;
    match row.attempt.status {
        AttemptStatus::Completed if row.attempt.final_score.is_some() => {
            return Err(ApiError::Conflict("Attempt already submitted".to_string()));
        }
        // Completed earlier but the score was never stored: only the scoring is retried.
        AttemptStatus::Completed => {
            tracing::info!(attempt_id = %attempt_id, "Retrying final score of submitted attempt");
        }
        AttemptStatus::Started => {
            let completion = complete_attempt(state.store(), &attempt_id)
                .await
                .map_err(|e| ApiError::store(e, "Failed to submit attempt"))?;
            if completion == Completion::AlreadyCompleted {
                return Err(ApiError::Conflict("Attempt already submitted".to_string()));
            }
        }
    }

    let recomputed =
        recompute_final_score(state.store(), &attempt_id).await.map_err(ApiError::recompute)?;

    let row = load_owned_attempt(&state, &user, &attempt_id).await?;
    Ok(Json(SubmitResponse {
        attempt: AttemptResponse::from(&row.attempt),
        final_score: recomputed.score,
    }))
}

async fn get_report(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ReportResponse>, ApiError> {
    let row = load_owned_attempt(&state, &user, &attempt_id).await?;
    if row.attempt.status != AttemptStatus::Completed {
        return Err(ApiError::Conflict("Attempt is still in progress".to_string()));
    }

    let links = state
        .store()
        .select_questions_for_exam(&row.attempt.exam_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to fetch questions"))?;
    if links.is_empty() {
        return Err(ApiError::NotFound("Exam has no questions".to_string()));
    }
    let answers = state
        .store()
        .select_answer_responses(&attempt_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to fetch answers"))?;

    Ok(Json(ReportResponse {
        attempt: AttemptResponse::from(&row.attempt),
        exam: ExamSummary::from(&row),
        report: build_report(&links, &answers),
    }))
}

/// Owner-scoped lookup. A foreign attempt is reported as 403, a missing one as 404.
pub(crate) async fn load_owned_attempt(
    state: &AppState,
    user: &User,
    attempt_id: &str,
) -> Result<AttemptWithExam, ApiError> {
    let owned = state
        .store()
        .select_attempt(attempt_id, AttemptScope::Owner(&user.id))
        .await
        .map_err(|e| ApiError::store(e, "Failed to fetch attempt"))?;
    if let Some(row) = owned {
        return Ok(row);
    }

    let exists = state
        .store()
        .select_attempt(attempt_id, AttemptScope::Elevated)
        .await
        .map_err(|e| ApiError::store(e, "Failed to fetch attempt"))?
        .is_some();
    if exists {
        Err(ApiError::Forbidden("Not enough permissions for this attempt"))
    } else {
        Err(ApiError::NotFound("Attempt not found".to_string()))
    }
}
