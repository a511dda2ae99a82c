//! Server-side functions. Unlike the REST routes these answer with `{score}` or `{error}`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::repositories::AttemptScope;
use crate::schemas::attempt::{RecomputeErrorResponse, RecomputeRequest, RecomputeResponse};
use crate::services::score_recompute::{recompute_final_score, RecomputeError};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/recompute-score", post(recompute_score))
}

async fn recompute_score(
    user: Result<CurrentUser, ApiError>,
    State(state): State<AppState>,
    payload: Result<Json<RecomputeRequest>, JsonRejection>,
) -> Response {
    let Ok(CurrentUser(user)) = user else {
        return error_response(StatusCode::UNAUTHORIZED, "Not authenticated");
    };
    let Ok(Json(payload)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
    };
    let Some(attempt_id) = payload.attempt_id.filter(|id| !id.trim().is_empty()) else {
        return recompute_error(RecomputeError::MissingAttemptId);
    };

    let owner = match state.store().select_attempt(&attempt_id, AttemptScope::Elevated).await {
        Ok(Some(row)) => row.attempt.user_id,
        Ok(None) => return recompute_error(RecomputeError::AttemptNotFound),
        Err(err) => return recompute_error(RecomputeError::Store(err)),
    };
    if owner != user.id && !user.is_admin {
        return error_response(StatusCode::FORBIDDEN, "Not enough permissions for this attempt");
    }

    match recompute_final_score(state.store(), &attempt_id).await {
        Ok(result) => {
            (StatusCode::OK, Json(RecomputeResponse { score: result.score })).into_response()
        }
        Err(err) => recompute_error(err),
    }
}

fn recompute_error(err: RecomputeError) -> Response {
    let err = ApiError::recompute(err);
    error_response(err.status(), err.detail())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(RecomputeErrorResponse { error: message.to_string() })).into_response()
}
