use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AnswerAction, AttemptStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exam {
    pub id: String,
    pub name: String,
    pub duration_minutes: i32,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: String,
    /// Free text; see [`crate::db::types::QuestionType::parse`].
    pub question_type: String,
    pub subject: Option<String>,
    pub content: String,
    /// `[{"id": .., "label": ..}, ..]` for single-choice questions.
    pub options: Json<serde_json::Value>,
    /// Non-empty array whose first element is the canonical answer.
    pub correct_answer: Json<serde_json::Value>,
    pub created_at: PrimitiveDateTime,
}

/// One exam↔question link. `question` is `None` when the linked row no longer exists.
#[derive(Debug, Clone)]
pub struct LinkedQuestion {
    pub question_id: String,
    pub question_number: i32,
    pub question: Option<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attempt {
    pub id: String,
    pub user_id: String,
    pub exam_id: String,
    pub status: AttemptStatus,
    pub start_time: PrimitiveDateTime,
    pub end_time: Option<PrimitiveDateTime>,
    pub final_score: Option<i32>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct AttemptWithExam {
    #[sqlx(flatten)]
    pub attempt: Attempt,
    pub exam_name: String,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerResponse {
    pub attempt_id: String,
    pub question_id: String,
    pub selected_answer: Option<Json<serde_json::Value>>,
    pub action: AnswerAction,
    pub updated_at: PrimitiveDateTime,
}
