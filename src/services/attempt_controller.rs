//! In-process driver for one attempt: navigation, best-effort answer saves and the guarded
//! submit path.
//!
//! The controller owns the [`AnswerSheet`]; every mutation goes through `&mut self`. The
//! countdown and user input share it as `Arc<tokio::sync::Mutex<AttemptController>>`, see
//! [`run_countdown`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::PrimitiveDateTime;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Duration, Instant};

use crate::db::models::{AttemptWithExam, LinkedQuestion};
use crate::db::types::AttemptStatus;
use crate::repositories::{AttemptScope, RecordStore, StoreError};
use crate::services::attempt_completion::complete_attempt;
use crate::services::attempt_timing::seconds_left;
use crate::services::question_state::{AnswerSheet, QuestionEvent, QuestionState};
use crate::services::save_queue::SaveQueue;
use crate::services::scoring::{build_report, Report};
use crate::services::session_timer::{SessionTimer, Tick};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("attempt not found")]
    NotFound,
    #[error("attempt already completed")]
    AlreadyCompleted,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Nothing was completed; the attempt is still STARTED and the submit can be retried.
    #[error("failed to persist submission: {0}")]
    Persistence(StoreError),
    /// The attempt is COMPLETED but the stored answers could not be read back for the report.
    #[error("submission saved but report unavailable: {0}")]
    Report(StoreError),
}

impl SubmitError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Persistence(_))
    }
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Submitted(Report),
    /// Another submission already ran or is in flight.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Active,
    Submitting,
    Submitted,
}

/// Clears the in-flight flag on drop unless the submission went through.
struct InFlight {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl InFlight {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(false, Ordering::Release);
        }
    }
}

pub struct AttemptController {
    store: Arc<dyn RecordStore>,
    attempt: AttemptWithExam,
    questions: Vec<LinkedQuestion>,
    sheet: AnswerSheet,
    current: usize,
    saves: SaveQueue,
    in_flight: Arc<AtomicBool>,
    submitted: bool,
}

impl AttemptController {
    /// Loads a STARTED attempt owned by `user_id`. Previously stored answers are restored
    /// into the sheet so a reloaded session resumes where it left off.
    pub async fn load(
        store: Arc<dyn RecordStore>,
        attempt_id: &str,
        user_id: &str,
    ) -> Result<Self, LoadError> {
        let attempt = store
            .select_attempt(attempt_id, AttemptScope::Owner(user_id))
            .await?
            .ok_or(LoadError::NotFound)?;
        if attempt.attempt.status == AttemptStatus::Completed {
            return Err(LoadError::AlreadyCompleted);
        }

        let questions: Vec<LinkedQuestion> = store
            .select_questions_for_exam(&attempt.attempt.exam_id)
            .await?
            .into_iter()
            .filter(|link| link.question.is_some())
            .collect();
        let stored = store.select_answer_responses(attempt_id).await?;

        let mut sheet =
            AnswerSheet::new(questions.iter().map(|link| link.question_id.clone()).collect());
        for link in &questions {
            if let Some(Some(value)) = stored.get(&link.question_id) {
                sheet.apply(&link.question_id, QuestionEvent::SetAnswer(Some(value.clone())));
            }
        }

        tracing::debug!(
            attempt_id,
            questions = questions.len(),
            restored = stored.len(),
            "Attempt session loaded"
        );

        let saves = SaveQueue::new(store.clone(), attempt_id);
        Ok(Self {
            store,
            attempt,
            questions,
            sheet,
            current: 0,
            saves,
            in_flight: Arc::new(AtomicBool::new(false)),
            submitted: false,
        })
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt.attempt.id
    }

    pub fn attempt(&self) -> &AttemptWithExam {
        &self.attempt
    }

    pub fn sheet(&self) -> &AnswerSheet {
        &self.sheet
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_state(&self) -> Option<&QuestionState> {
        self.sheet.state_at(self.current)
    }

    pub fn phase(&self) -> SessionPhase {
        if self.submitted {
            SessionPhase::Submitted
        } else if self.in_flight.load(Ordering::Acquire) {
            SessionPhase::Submitting
        } else {
            SessionPhase::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase() == SessionPhase::Active
    }

    /// Countdown for the time left at `now`; a reloaded session keeps the original deadline.
    pub fn session_timer(&self, now: PrimitiveDateTime) -> SessionTimer {
        let attempt = &self.attempt;
        let left = seconds_left(attempt.attempt.start_time, attempt.duration_minutes, now);
        SessionTimer::from_seconds(u64::try_from(left).unwrap_or(0))
    }

    pub fn navigate(&mut self, target: usize) {
        if !self.is_active() || target == self.current || target >= self.sheet.len() {
            return;
        }

        if let Some(outgoing) = self.sheet.question_id(self.current) {
            if let Some(state) = self.sheet.state(outgoing) {
                self.saves.enqueue(outgoing, state);
            }
        }

        if let Some(incoming) = self.sheet.question_id(target).map(str::to_string) {
            self.sheet.apply(&incoming, QuestionEvent::Visit);
        }
        self.current = target;
    }

    pub fn save_and_next(&mut self) {
        self.navigate(self.current + 1);
    }

    pub fn mark_for_review_and_next(&mut self) {
        self.apply_current(QuestionEvent::MarkForReview);
        self.navigate(self.current + 1);
    }

    pub fn clear_response(&mut self) {
        self.apply_current(QuestionEvent::Clear);
    }

    /// Edits stay in memory until the question is left or the attempt is submitted.
    pub fn answer_change(&mut self, value: Option<Value>) {
        self.apply_current(QuestionEvent::SetAnswer(value));
    }

    /// Waits for every background save issued so far.
    pub async fn settle(&self) {
        self.saves.settle().await;
    }

    /// Completes the attempt at most once.
    ///
    /// Flushes the active question, marks the attempt COMPLETED and builds the advisory report
    /// from the stored answers. A racing or repeated call returns [`SubmitOutcome::Ignored`].
    pub async fn submit(&mut self) -> Result<SubmitOutcome, SubmitError> {
        if self.submitted || self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!(attempt_id = %self.attempt_id(), "Ignoring duplicate submit");
            return Ok(SubmitOutcome::Ignored);
        }
        let guard = InFlight { flag: self.in_flight.clone(), armed: true };

        self.persist_submission().await.map_err(SubmitError::Persistence)?;

        guard.disarm();
        self.submitted = true;

        let answers = self
            .store
            .select_answer_responses(&self.attempt.attempt.id)
            .await
            .map_err(SubmitError::Report)?;
        Ok(SubmitOutcome::Submitted(build_report(&self.questions, &answers)))
    }

    async fn persist_submission(&mut self) -> Result<(), StoreError> {
        self.saves.settle().await;

        let active = self
            .sheet
            .question_id(self.current)
            .map(|id| (id.to_string(), self.sheet.state(id).cloned().unwrap_or_default()));
        if let Some((question_id, state)) = active {
            if let Err(err) = self.saves.flush(&question_id, &state).await {
                metrics::counter!("attempt_submissions_total", "outcome" => "failed").increment(1);
                tracing::warn!(
                    attempt_id = %self.attempt_id(),
                    error = %err,
                    "Final answer flush failed"
                );
                return Err(err);
            }
        }

        complete_attempt(self.store.as_ref(), &self.attempt.attempt.id).await?;
        Ok(())
    }

    fn apply_current(&mut self, event: QuestionEvent) {
        if !self.is_active() {
            return;
        }
        if let Some(question_id) = self.sheet.question_id(self.current).map(str::to_string) {
            self.sheet.apply(&question_id, event);
        }
    }
}

/// Ticks `timer` once per second while the session is active and submits when it expires.
///
/// Returns the submit result when the countdown fired, or `None` when the session ended
/// first or `shutdown` was signalled.
pub async fn run_countdown(
    controller: Arc<Mutex<AttemptController>>,
    mut timer: SessionTimer,
    mut shutdown: watch::Receiver<bool>,
) -> Option<Result<SubmitOutcome, SubmitError>> {
    let period = Duration::from_secs(1);
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        if *shutdown.borrow() {
            return None;
        }

        tokio::select! {
            _ = shutdown.changed() => return None,
            _ = ticker.tick() => {}
        }

        let mut session = controller.lock().await;
        if session.phase() == SessionPhase::Submitted {
            return None;
        }

        match timer.tick(session.is_active()) {
            Tick::Running(_) | Tick::Idle => {}
            Tick::Expired => {
                tracing::info!(attempt_id = %session.attempt_id(), "Attempt time expired");
                return Some(session.submit().await);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::core::time::primitive_now_utc;
    use crate::db::types::AnswerAction;
    use crate::services::question_state::QuestionStatus;
    use crate::services::scoring::ResultStatus;
    use crate::test_support::{MemoryStore, OTHER_STUDENT_ID, SCENARIO_EXAM_ID, STUDENT_ID};

    async fn started_session(store: &Arc<MemoryStore>) -> AttemptController {
        let attempt = store
            .start_attempt(STUDENT_ID, SCENARIO_EXAM_ID, primitive_now_utc())
            .await
            .expect("start attempt")
            .into_attempt();
        AttemptController::load(store.clone(), &attempt.id, STUDENT_ID).await.expect("load")
    }

    #[tokio::test]
    async fn three_question_session_scores_three() {
        let store = Arc::new(MemoryStore::with_scenario());
        let mut session = started_session(&store).await;

        session.answer_change(Some(json!("A")));
        session.save_and_next();
        session.answer_change(Some(json!("C")));
        session.save_and_next();

        let SubmitOutcome::Submitted(report) = session.submit().await.expect("submit") else {
            panic!("expected a submitted report");
        };
        assert_eq!(report.total_correct, 1);
        assert_eq!(report.total_incorrect, 1);
        assert_eq!(report.total_unattempted, 1);
        assert_eq!(report.total_score, 3);
        assert_eq!(report.questions[2].status, ResultStatus::Unattempted);

        let attempt = store.attempt(session.attempt_id()).expect("attempt");
        assert_eq!(attempt.status, AttemptStatus::Completed);
        assert!(attempt.end_time.is_some());
        assert_eq!(
            store.answer(session.attempt_id(), "q3"),
            Some((None, AnswerAction::Unanswered))
        );
        assert_eq!(session.phase(), SessionPhase::Submitted);
    }

    #[tokio::test]
    async fn navigation_visits_and_saves_outgoing_question() {
        let store = Arc::new(MemoryStore::with_scenario());
        let mut session = started_session(&store).await;

        session.navigate(5);
        session.navigate(0);
        assert_eq!(session.current_index(), 0);
        assert_eq!(store.upsert_count(), 0);

        session.mark_for_review_and_next();
        session.settle().await;
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.current_state().map(|s| s.status), Some(QuestionStatus::Unanswered));
        assert_eq!(
            session.sheet().state("q3").map(|s| s.status),
            Some(QuestionStatus::NotVisited)
        );
        assert_eq!(
            store.answer(session.attempt_id(), "q1"),
            Some((None, AnswerAction::MarkedForReview))
        );

        session.answer_change(Some(json!("B")));
        session.clear_response();
        let cleared = session.current_state().expect("current state");
        assert_eq!(cleared.status, QuestionStatus::Unanswered);
        assert_eq!(cleared.selected_answer, None);
    }

    #[tokio::test]
    async fn save_failures_do_not_block_navigation() {
        let store = Arc::new(MemoryStore::with_scenario());
        let mut session = started_session(&store).await;
        store.fail_upserts(true);

        session.answer_change(Some(json!("A")));
        session.save_and_next();
        session.settle().await;

        assert_eq!(session.current_index(), 1);
        assert_eq!(session.sheet().state("q1").map(|s| s.status), Some(QuestionStatus::Answered));
        assert!(store.answer(session.attempt_id(), "q1").is_none());
    }

    #[tokio::test]
    async fn failed_submit_can_be_retried() {
        let store = Arc::new(MemoryStore::with_scenario());
        let mut session = started_session(&store).await;
        session.answer_change(Some(json!("A")));

        store.fail_completion(true);
        let err = session.submit().await.expect_err("completion fails");
        assert!(err.is_retryable());
        assert_eq!(session.phase(), SessionPhase::Active);
        let attempt = store.attempt(session.attempt_id()).expect("attempt");
        assert_eq!(attempt.status, AttemptStatus::Started);

        store.fail_completion(false);
        let outcome = session.submit().await.expect("retry");
        assert!(matches!(outcome, SubmitOutcome::Submitted(ref report) if report.total_score == 4));
        assert!(matches!(session.submit().await, Ok(SubmitOutcome::Ignored)));
        assert_eq!(store.completion_count(), 1);
    }

    #[tokio::test]
    async fn submitted_session_ignores_further_edits() {
        let store = Arc::new(MemoryStore::with_scenario());
        let mut session = started_session(&store).await;
        session.submit().await.expect("submit");

        session.answer_change(Some(json!("D")));
        session.save_and_next();
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.current_state().and_then(|s| s.selected_answer.clone()), None);
    }

    #[tokio::test]
    async fn load_checks_owner_and_status() {
        let store = Arc::new(MemoryStore::with_scenario());
        let session = started_session(&store).await;
        let attempt_id = session.attempt_id().to_string();

        let foreign = AttemptController::load(store.clone(), &attempt_id, OTHER_STUDENT_ID).await;
        assert!(matches!(foreign, Err(LoadError::NotFound)));

        store.complete_attempt(&attempt_id, primitive_now_utc()).await.expect("complete");
        let completed = AttemptController::load(store.clone(), &attempt_id, STUDENT_ID).await;
        assert!(matches!(completed, Err(LoadError::AlreadyCompleted)));
    }

    #[tokio::test]
    async fn reload_restores_stored_answers() {
        let store = Arc::new(MemoryStore::with_scenario());
        let mut session = started_session(&store).await;
        session.answer_change(Some(json!("A")));
        session.save_and_next();
        session.settle().await;
        let attempt_id = session.attempt_id().to_string();
        drop(session);

        let reloaded = AttemptController::load(store.clone(), &attempt_id, STUDENT_ID)
            .await
            .expect("reload");
        let restored = reloaded.sheet().state("q1").expect("q1");
        assert_eq!(restored.status, QuestionStatus::Answered);
        assert_eq!(restored.selected_answer, Some(json!("A")));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_expiry_and_user_click_submit_once() {
        let store = Arc::new(MemoryStore::with_scenario());
        let session = started_session(&store).await;
        let controller = Arc::new(Mutex::new(session));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let timer = SessionTimer::from_seconds(3);
        let countdown = run_countdown(controller.clone(), timer, shutdown_rx);
        let click = {
            let controller = controller.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                controller.lock().await.submit().await
            }
        };

        let (timer_result, click_result) = tokio::join!(countdown, click);

        let timer_submitted = matches!(timer_result, Some(Ok(SubmitOutcome::Submitted(_))));
        let click_submitted = matches!(click_result, Ok(SubmitOutcome::Submitted(_)));
        assert!(timer_submitted ^ click_submitted);
        assert_eq!(store.completion_count(), 1);
        assert_eq!(controller.lock().await.phase(), SessionPhase::Submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::with_scenario());
        let controller = Arc::new(Mutex::new(started_session(&store).await));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_countdown(
            controller.clone(),
            SessionTimer::from_seconds(600),
            shutdown_rx,
        ));
        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown_tx.send(true).expect("send shutdown");

        assert!(handle.await.expect("join").is_none());
        assert_eq!(store.completion_count(), 0);
        assert!(controller.lock().await.is_active());
    }
}
