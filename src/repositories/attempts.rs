use sqlx::PgPool;

use crate::db::models::{Attempt, AttemptWithExam};
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, user_id, exam_id, status, start_time, end_time, final_score, created_at, updated_at";

const JOINED_COLUMNS: &str = "\
    a.id, a.user_id, a.exam_id, a.status, a.start_time, a.end_time, a.final_score, \
    a.created_at, a.updated_at, e.name AS exam_name, e.duration_minutes";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) start_time: time::PrimitiveDateTime,
}

/// Inserts a STARTED attempt. Returns `false` when the partial unique index already holds a
/// STARTED attempt for the same user and exam.
pub(crate) async fn create(pool: &PgPool, attempt: CreateAttempt<'_>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO attempts (id, user_id, exam_id, status, start_time, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5, $5)
         ON CONFLICT DO NOTHING",
    )
    .bind(attempt.id)
    .bind(attempt.user_id)
    .bind(attempt.exam_id)
    .bind(AttemptStatus::Started)
    .bind(attempt.start_time)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn find_started(
    pool: &PgPool,
    user_id: &str,
    exam_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE user_id = $1 AND exam_id = $2 AND status = $3"
    ))
    .bind(user_id)
    .bind(exam_id)
    .bind(AttemptStatus::Started)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_with_exam(
    pool: &PgPool,
    id: &str,
    owner_id: Option<&str>,
) -> Result<Option<AttemptWithExam>, sqlx::Error> {
    match owner_id {
        Some(owner_id) => {
            sqlx::query_as::<_, AttemptWithExam>(&format!(
                "SELECT {JOINED_COLUMNS} FROM attempts a JOIN exams e ON e.id = a.exam_id
                 WHERE a.id = $1 AND a.user_id = $2"
            ))
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, AttemptWithExam>(&format!(
                "SELECT {JOINED_COLUMNS} FROM attempts a JOIN exams e ON e.id = a.exam_id
                 WHERE a.id = $1"
            ))
            .bind(id)
            .fetch_optional(pool)
            .await
        }
    }
}

/// STARTED -> COMPLETED. Returns `false` if the attempt was not STARTED.
pub(crate) async fn complete(
    pool: &PgPool,
    id: &str,
    end_time: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts SET status = $1, end_time = $2, updated_at = $2
         WHERE id = $3 AND status = $4",
    )
    .bind(AttemptStatus::Completed)
    .bind(end_time)
    .bind(id)
    .bind(AttemptStatus::Started)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn set_final_score(
    pool: &PgPool,
    id: &str,
    score: i32,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE attempts SET final_score = $1, updated_at = $2 WHERE id = $3")
        .bind(score)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
