//! Report aggregation over an exam's questions and an attempt's stored answers.
//!
//! Pure and deterministic: the same inputs always produce the same [`Report`], whether the
//! caller is the read-only report view or the authoritative recomputation.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::db::models::LinkedQuestion;
use crate::services::answer_judge::{has_answer, is_correct};

pub const POINTS_PER_CORRECT: i64 = 4;
pub const PENALTY_PER_INCORRECT: i64 = 1;
pub const UNCATEGORIZED_SUBJECT: &str = "UNCATEGORIZED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Correct,
    Incorrect,
    Unattempted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub question_number: i32,
    pub question_type: String,
    pub subject: String,
    pub status: ResultStatus,
    pub selected_answer: Option<Value>,
    pub correct_answer: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubjectStats {
    pub correct: u32,
    pub incorrect: u32,
    pub unattempted: u32,
    pub score: i64,
}

impl SubjectStats {
    fn record(&mut self, status: ResultStatus) {
        match status {
            ResultStatus::Correct => self.correct += 1,
            ResultStatus::Incorrect => self.incorrect += 1,
            ResultStatus::Unattempted => self.unattempted += 1,
        }
        self.score = score_for(self.correct, self.incorrect);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub questions: Vec<QuestionResult>,
    pub total_correct: u32,
    pub total_incorrect: u32,
    pub total_unattempted: u32,
    pub total_score: i64,
    pub subject_stats: BTreeMap<String, SubjectStats>,
}

pub fn score_for(correct: u32, incorrect: u32) -> i64 {
    i64::from(correct) * POINTS_PER_CORRECT - i64::from(incorrect) * PENALTY_PER_INCORRECT
}

/// Upper-cases the subject as stored. Missing or empty subjects are `UNCATEGORIZED`.
pub fn normalize_subject(subject: Option<&str>) -> String {
    match subject.filter(|value| !value.is_empty()) {
        Some(value) => value.to_uppercase(),
        None => UNCATEGORIZED_SUBJECT.to_string(),
    }
}

pub fn classify(
    question_type: &str,
    selected: Option<&Value>,
    correct_answer: &Value,
) -> ResultStatus {
    if !has_answer(selected) {
        ResultStatus::Unattempted
    } else if is_correct(question_type, selected, correct_answer) {
        ResultStatus::Correct
    } else {
        ResultStatus::Incorrect
    }
}

/// Builds the report in ascending `question_number` order.
///
/// Links whose question row did not resolve are left out of every count.
pub fn build_report(
    questions: &[LinkedQuestion],
    answers: &HashMap<String, Option<Value>>,
) -> Report {
    let mut ordered: Vec<&LinkedQuestion> = questions.iter().collect();
    ordered.sort_by_key(|link| link.question_number);

    let mut total = SubjectStats::default();
    let mut subject_stats: BTreeMap<String, SubjectStats> = BTreeMap::new();
    let mut results = Vec::with_capacity(ordered.len());

    for link in ordered {
        let Some(question) = link.question.as_ref() else {
            tracing::debug!(
                question_id = %link.question_id,
                question_number = link.question_number,
                "Skipping unresolved question link"
            );
            continue;
        };

        let selected = answers.get(&question.id).and_then(Option::as_ref);
        let status = classify(&question.question_type, selected, &question.correct_answer.0);
        let subject = normalize_subject(question.subject.as_deref());

        total.record(status);
        subject_stats.entry(subject.clone()).or_default().record(status);

        results.push(QuestionResult {
            question_id: question.id.clone(),
            question_number: link.question_number,
            question_type: question.question_type.clone(),
            subject,
            status,
            selected_answer: selected.cloned(),
            correct_answer: question.correct_answer.0.clone(),
        });
    }

    Report {
        questions: results,
        total_correct: total.correct,
        total_incorrect: total.incorrect,
        total_unattempted: total.unattempted,
        total_score: total.score,
        subject_stats,
    }
}
