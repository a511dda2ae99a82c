use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "attempt_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Started,
    Completed,
}

/// Persisted answer status. Storage has no `not_visited`; see
/// [`crate::services::question_state::QuestionStatus::persisted_action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "answer_action", rename_all = "snake_case")]
pub enum AnswerAction {
    Unanswered,
    Answered,
    MarkedForReview,
}

impl AnswerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerAction::Unanswered => "unanswered",
            AnswerAction::Answered => "answered",
            AnswerAction::MarkedForReview => "marked_for_review",
        }
    }
}

/// Question kinds the judge understands. The column itself is free text so rows with an
/// unknown kind still load and are simply judged incorrect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    Numerical,
}

impl QuestionType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SINGLE_CHOICE" => Some(QuestionType::SingleChoice),
            "NUMERICAL" => Some(QuestionType::Numerical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "SINGLE_CHOICE",
            QuestionType::Numerical => "NUMERICAL",
        }
    }
}
