//! Per-question status lifecycle during an attempt.
//!
//! All transitions are pure `(QuestionState, QuestionEvent) -> QuestionState` functions;
//! [`AnswerSheet`] is the owned aggregate that applies them for a whole exam.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::types::AnswerAction;
use crate::services::answer_judge::has_answer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    NotVisited,
    Unanswered,
    Answered,
    MarkedForReview,
}

impl QuestionStatus {
    /// Storage has no `not_visited`; it is persisted as `unanswered`.
    pub fn persisted_action(self) -> AnswerAction {
        match self {
            QuestionStatus::NotVisited | QuestionStatus::Unanswered => AnswerAction::Unanswered,
            QuestionStatus::Answered => AnswerAction::Answered,
            QuestionStatus::MarkedForReview => AnswerAction::MarkedForReview,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionState {
    pub status: QuestionStatus,
    pub selected_answer: Option<Value>,
    /// Reserved; nothing computes it yet.
    pub time_taken_sec: Option<u32>,
}

impl Default for QuestionState {
    fn default() -> Self {
        Self { status: QuestionStatus::NotVisited, selected_answer: None, time_taken_sec: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestionEvent {
    Visit,
    SetAnswer(Option<Value>),
    Clear,
    MarkForReview,
}

pub fn transition(state: QuestionState, event: QuestionEvent) -> QuestionState {
    match event {
        QuestionEvent::Visit => {
            if state.status == QuestionStatus::NotVisited {
                QuestionState { status: QuestionStatus::Unanswered, ..state }
            } else {
                state
            }
        }
        // An edit recomputes the status from the value, dropping any review mark.
        QuestionEvent::SetAnswer(value) => {
            let status = if has_answer(value.as_ref()) {
                QuestionStatus::Answered
            } else {
                QuestionStatus::Unanswered
            };
            QuestionState { status, selected_answer: value, ..state }
        }
        QuestionEvent::Clear => {
            QuestionState { status: QuestionStatus::Unanswered, selected_answer: None, ..state }
        }
        QuestionEvent::MarkForReview => {
            QuestionState { status: QuestionStatus::MarkedForReview, ..state }
        }
    }
}

/// Exactly one [`QuestionState`] per question, in navigation order.
#[derive(Debug, Clone)]
pub struct AnswerSheet {
    order: Vec<String>,
    states: HashMap<String, QuestionState>,
}

impl AnswerSheet {
    /// Builds a fresh sheet; the first question starts out visited.
    pub fn new(question_ids: Vec<String>) -> Self {
        let states =
            question_ids.iter().map(|id| (id.clone(), QuestionState::default())).collect();
        let mut sheet = Self { order: question_ids, states };
        if let Some(first) = sheet.order.first().cloned() {
            sheet.apply(&first, QuestionEvent::Visit);
        }
        sheet
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn question_id(&self, index: usize) -> Option<&str> {
        self.order.get(index).map(String::as_str)
    }

    pub fn state(&self, question_id: &str) -> Option<&QuestionState> {
        self.states.get(question_id)
    }

    pub fn state_at(&self, index: usize) -> Option<&QuestionState> {
        self.question_id(index).and_then(|id| self.states.get(id))
    }

    /// Applies `event` and returns the new state, or `None` for an unknown question.
    pub fn apply(&mut self, question_id: &str, event: QuestionEvent) -> Option<&QuestionState> {
        let slot = self.states.get_mut(question_id)?;
        let current = std::mem::take(slot);
        *slot = transition(current, event);
        Some(&*slot)
    }
}
