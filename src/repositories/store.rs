use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{Attempt, AttemptWithExam, Exam, LinkedQuestion, User};
use crate::db::types::AnswerAction;
use crate::repositories;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("attempt {0} could not be started")]
    StartConflict(String),
}

/// Who is reading an attempt. Owners only ever see their own rows; `Elevated` bypasses the
/// ownership filter and is used for score recomputation and existence checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptScope<'a> {
    Owner(&'a str),
    Elevated,
}

#[derive(Debug, Clone)]
pub enum StartedAttempt {
    Created(Attempt),
    Resumed(Attempt),
}

impl StartedAttempt {
    pub fn attempt(&self) -> &Attempt {
        match self {
            StartedAttempt::Created(attempt) | StartedAttempt::Resumed(attempt) => attempt,
        }
    }

    pub fn into_attempt(self) -> Attempt {
        match self {
            StartedAttempt::Created(attempt) | StartedAttempt::Resumed(attempt) => attempt,
        }
    }
}

/// Transactional record store behind every attempt operation.
///
/// Upserts are keyed on `(attempt_id, question_id)` and last write wins.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, StoreError>;

    /// Returns the caller's STARTED attempt for the exam, creating one if none exists.
    async fn start_attempt(
        &self,
        user_id: &str,
        exam_id: &str,
        start_time: PrimitiveDateTime,
    ) -> Result<StartedAttempt, StoreError>;

    async fn select_attempt(
        &self,
        attempt_id: &str,
        scope: AttemptScope<'_>,
    ) -> Result<Option<AttemptWithExam>, StoreError>;

    /// Link rows ordered by `question_number` ascending.
    async fn select_questions_for_exam(
        &self,
        exam_id: &str,
    ) -> Result<Vec<LinkedQuestion>, StoreError>;

    async fn upsert_answer_response(
        &self,
        attempt_id: &str,
        question_id: &str,
        selected_answer: Option<&Value>,
        action: AnswerAction,
    ) -> Result<(), StoreError>;

    async fn select_answer_responses(
        &self,
        attempt_id: &str,
    ) -> Result<HashMap<String, Option<Value>>, StoreError>;

    /// STARTED -> COMPLETED. `Ok(false)` when the attempt was already completed.
    async fn complete_attempt(
        &self,
        attempt_id: &str,
        end_time: PrimitiveDateTime,
    ) -> Result<bool, StoreError>;

    async fn set_final_score(&self, attempt_id: &str, score: i32) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(repositories::users::find_by_id(&self.pool, user_id).await?)
    }

    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, StoreError> {
        Ok(repositories::exams::find_by_id(&self.pool, exam_id).await?)
    }

    async fn start_attempt(
        &self,
        user_id: &str,
        exam_id: &str,
        start_time: PrimitiveDateTime,
    ) -> Result<StartedAttempt, StoreError> {
        if let Some(existing) =
            repositories::attempts::find_started(&self.pool, user_id, exam_id).await?
        {
            return Ok(StartedAttempt::Resumed(existing));
        }

        let attempt_id = Uuid::new_v4().to_string();
        let inserted = repositories::attempts::create(
            &self.pool,
            repositories::attempts::CreateAttempt {
                id: &attempt_id,
                user_id,
                exam_id,
                start_time,
            },
        )
        .await?;

        // Losing the insert race means another request started the attempt first.
        let attempt = repositories::attempts::find_started(&self.pool, user_id, exam_id)
            .await?
            .ok_or_else(|| StoreError::StartConflict(attempt_id.clone()))?;

        if inserted && attempt.id == attempt_id {
            Ok(StartedAttempt::Created(attempt))
        } else {
            Ok(StartedAttempt::Resumed(attempt))
        }
    }

    async fn select_attempt(
        &self,
        attempt_id: &str,
        scope: AttemptScope<'_>,
    ) -> Result<Option<AttemptWithExam>, StoreError> {
        let owner = match scope {
            AttemptScope::Owner(user_id) => Some(user_id),
            AttemptScope::Elevated => None,
        };
        Ok(repositories::attempts::find_with_exam(&self.pool, attempt_id, owner).await?)
    }

    async fn select_questions_for_exam(
        &self,
        exam_id: &str,
    ) -> Result<Vec<LinkedQuestion>, StoreError> {
        Ok(repositories::questions::list_for_exam(&self.pool, exam_id).await?)
    }

    async fn upsert_answer_response(
        &self,
        attempt_id: &str,
        question_id: &str,
        selected_answer: Option<&Value>,
        action: AnswerAction,
    ) -> Result<(), StoreError> {
        repositories::answers::upsert(
            &self.pool,
            attempt_id,
            question_id,
            selected_answer,
            action,
            primitive_now_utc(),
        )
        .await?;
        Ok(())
    }

    async fn select_answer_responses(
        &self,
        attempt_id: &str,
    ) -> Result<HashMap<String, Option<Value>>, StoreError> {
        let rows = repositories::answers::list_by_attempt(&self.pool, attempt_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.question_id, row.selected_answer.map(|value| value.0)))
            .collect())
    }

    async fn complete_attempt(
        &self,
        attempt_id: &str,
        end_time: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        Ok(repositories::attempts::complete(&self.pool, attempt_id, end_time).await?)
    }

    async fn set_final_score(&self, attempt_id: &str, score: i32) -> Result<(), StoreError> {
        repositories::attempts::set_final_score(&self.pool, attempt_id, score, primitive_now_utc())
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(repositories::health::ping(&self.pool).await?)
    }
}
