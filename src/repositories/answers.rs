use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::AnswerResponse;
use crate::db::types::AnswerAction;

pub(crate) const COLUMNS: &str = "attempt_id, question_id, selected_answer, action, updated_at";

pub(crate) async fn upsert(
    pool: &PgPool,
    attempt_id: &str,
    question_id: &str,
    selected_answer: Option<&serde_json::Value>,
    action: AnswerAction,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO answer_responses (attempt_id, question_id, selected_answer, action, updated_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (attempt_id, question_id) DO UPDATE SET
            selected_answer = EXCLUDED.selected_answer,
            action = EXCLUDED.action,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(attempt_id)
    .bind(question_id)
    .bind(selected_answer.cloned().map(Json))
    .bind(action)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_attempt(
    pool: &PgPool,
    attempt_id: &str,
) -> Result<Vec<AnswerResponse>, sqlx::Error> {
    sqlx::query_as::<_, AnswerResponse>(&format!(
        "SELECT {COLUMNS} FROM answer_responses WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_all(pool)
    .await
}
