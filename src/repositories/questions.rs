use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{LinkedQuestion, Question};

/// Link row LEFT JOINed with its question; every question column is nullable so that a
/// dangling link still comes back as a row.
#[derive(Debug, sqlx::FromRow)]
struct LinkedQuestionRow {
    link_question_id: String,
    question_number: i32,
    id: Option<String>,
    question_type: Option<String>,
    subject: Option<String>,
    content: Option<String>,
    options: Option<Json<serde_json::Value>>,
    correct_answer: Option<Json<serde_json::Value>>,
    created_at: Option<PrimitiveDateTime>,
}

impl From<LinkedQuestionRow> for LinkedQuestion {
    fn from(row: LinkedQuestionRow) -> Self {
        let question = match (row.id, row.question_type, row.created_at) {
            (Some(id), Some(question_type), Some(created_at)) => Some(Question {
                id,
                question_type,
                subject: row.subject,
                content: row.content.unwrap_or_default(),
                options: row.options.unwrap_or_else(|| Json(serde_json::json!([]))),
                correct_answer: row.correct_answer.unwrap_or_else(|| Json(serde_json::json!([]))),
                created_at,
            }),
            _ => None,
        };

        LinkedQuestion {
            question_id: row.link_question_id,
            question_number: row.question_number,
            question,
        }
    }
}

pub(crate) async fn list_for_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<LinkedQuestion>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LinkedQuestionRow>(
        "SELECT eq.question_id AS link_question_id, eq.question_number,
                q.id, q.question_type, q.subject, q.content, q.options, q.correct_answer,
                q.created_at
         FROM exam_questions eq
         LEFT JOIN questions q ON q.id = eq.question_id
         WHERE eq.exam_id = $1
         ORDER BY eq.question_number ASC",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(LinkedQuestion::from).collect())
}
