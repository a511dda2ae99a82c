use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use crate::core::time::{format_optional, format_primitive};
use crate::db::models::{Attempt, AttemptWithExam, LinkedQuestion};
use crate::db::types::{AnswerAction, AttemptStatus};
use crate::services::answer_judge::has_answer;
use crate::services::question_state::QuestionStatus;
use crate::services::scoring::Report;

const MAX_ANSWER_LEN: usize = 256;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerUpsertRequest {
    #[serde(default, alias = "selectedAnswer")]
    #[validate(custom(function = "validate_selected_answer"))]
    pub(crate) selected_answer: Option<Value>,
    /// Only `marked_for_review` is taken as given; otherwise the stored action follows
    /// `selected_answer`.
    pub(crate) action: QuestionStatus,
}

impl AnswerUpsertRequest {
    pub(crate) fn stored_action(&self) -> AnswerAction {
        match self.action {
            QuestionStatus::MarkedForReview => AnswerAction::MarkedForReview,
            _ if has_answer(self.selected_answer.as_ref()) => AnswerAction::Answered,
            _ => AnswerAction::Unanswered,
        }
    }
}

fn validate_selected_answer(value: &Value) -> Result<(), ValidationError> {
    match value {
        Value::Array(_) | Value::Object(_) => {
            Err(ValidationError::new("selected_answer_shape")
                .with_message("selected_answer must be a string, number or boolean".into()))
        }
        Value::String(text) if text.chars().count() > MAX_ANSWER_LEN => {
            Err(ValidationError::new("selected_answer_length")
                .with_message("selected_answer is too long".into()))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerSavedResponse {
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) selected_answer: Option<Value>,
    pub(crate) action: AnswerAction,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) exam_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) start_time: String,
    pub(crate) end_time: Option<String>,
    pub(crate) final_score: Option<i32>,
}

impl From<&Attempt> for AttemptResponse {
    fn from(attempt: &Attempt) -> Self {
        Self {
            id: attempt.id.clone(),
            user_id: attempt.user_id.clone(),
            exam_id: attempt.exam_id.clone(),
            status: attempt.status,
            start_time: format_primitive(attempt.start_time),
            end_time: format_optional(attempt.end_time),
            final_score: attempt.final_score,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamSummary {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) duration_minutes: i32,
}

impl From<&AttemptWithExam> for ExamSummary {
    fn from(row: &AttemptWithExam) -> Self {
        Self {
            id: row.attempt.exam_id.clone(),
            name: row.exam_name.clone(),
            duration_minutes: row.duration_minutes,
        }
    }
}

/// Question as shown to the person sitting the exam; the key stays server-side.
#[derive(Debug, Serialize)]
pub(crate) struct PublicQuestion {
    pub(crate) id: String,
    pub(crate) question_number: i32,
    pub(crate) question_type: String,
    pub(crate) subject: Option<String>,
    pub(crate) content: String,
    pub(crate) options: Value,
}

impl PublicQuestion {
    pub(crate) fn from_link(link: &LinkedQuestion) -> Option<Self> {
        let question = link.question.as_ref()?;
        Some(Self {
            id: question.id.clone(),
            question_number: link.question_number,
            question_type: question.question_type.clone(),
            subject: question.subject.clone(),
            content: question.content.clone(),
            options: question.options.0.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptStartResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) resumed: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptSessionResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) exam: ExamSummary,
    pub(crate) questions: Vec<PublicQuestion>,
    pub(crate) answers: HashMap<String, Option<Value>>,
    pub(crate) time_left_seconds: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) final_score: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReportResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) exam: ExamSummary,
    #[serde(flatten)]
    pub(crate) report: Report,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecomputeRequest {
    #[serde(default, rename = "attemptId", alias = "attempt_id")]
    pub(crate) attempt_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RecomputeResponse {
    pub(crate) score: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct RecomputeErrorResponse {
    pub(crate) error: String,
}
