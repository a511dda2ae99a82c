//! Best-effort answer persistence.
//!
//! Every question gets its own lane: a detached task draining an unbounded channel, so saves
//! for one question land in the order they were issued while saves for different questions
//! stay independent. Enqueued saves are fire-and-forget; failures are logged and counted,
//! never surfaced to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::db::types::AnswerAction;
use crate::repositories::{RecordStore, StoreError};
use crate::services::question_state::QuestionState;

type SaveAck = oneshot::Sender<Result<(), StoreError>>;

enum LaneJob {
    Save { selected_answer: Option<Value>, action: AnswerAction, ack: Option<SaveAck> },
    Barrier(oneshot::Sender<()>),
}

pub struct SaveQueue {
    store: Arc<dyn RecordStore>,
    attempt_id: Arc<str>,
    lanes: HashMap<String, mpsc::UnboundedSender<LaneJob>>,
}

impl SaveQueue {
    pub fn new(store: Arc<dyn RecordStore>, attempt_id: &str) -> Self {
        Self { store, attempt_id: Arc::from(attempt_id), lanes: HashMap::new() }
    }

    /// Queues a save of `state` and returns immediately.
    pub fn enqueue(&mut self, question_id: &str, state: &QuestionState) {
        let job = LaneJob::Save {
            selected_answer: state.selected_answer.clone(),
            action: state.status.persisted_action(),
            ack: None,
        };
        if self.send(question_id, job).is_err() {
            tracing::warn!(
                attempt_id = %self.attempt_id,
                question_id,
                "Answer save lane closed, dropping save"
            );
            metrics::counter!("answer_saves_total", "outcome" => "dropped").increment(1);
        }
    }

    /// Saves `state` behind any queued saves for the same question and waits for the result.
    pub async fn flush(
        &mut self,
        question_id: &str,
        state: &QuestionState,
    ) -> Result<(), StoreError> {
        let (ack, done) = oneshot::channel();
        let job = LaneJob::Save {
            selected_answer: state.selected_answer.clone(),
            action: state.status.persisted_action(),
            ack: Some(ack),
        };
        self.send(question_id, job).map_err(|_| closed_lane(question_id))?;
        done.await.map_err(|_| closed_lane(question_id))?
    }

    /// Waits until every save queued so far has been attempted.
    pub async fn settle(&self) {
        let mut pending = Vec::with_capacity(self.lanes.len());
        for lane in self.lanes.values() {
            let (tx, rx) = oneshot::channel();
            if lane.send(LaneJob::Barrier(tx)).is_ok() {
                pending.push(rx);
            }
        }
        for barrier in pending {
            let _ = barrier.await;
        }
    }

    fn send(&mut self, question_id: &str, job: LaneJob) -> Result<(), LaneJob> {
        let needs_lane = self.lanes.get(question_id).map_or(true, |lane| lane.is_closed());
        if needs_lane {
            let lane = self.spawn_lane(question_id);
            self.lanes.insert(question_id.to_string(), lane);
        }
        match self.lanes.get(question_id) {
            Some(lane) => lane.send(job).map_err(|err| err.0),
            None => Err(job),
        }
    }

    fn spawn_lane(&self, question_id: &str) -> mpsc::UnboundedSender<LaneJob> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_lane(
            self.store.clone(),
            self.attempt_id.clone(),
            question_id.to_string(),
            rx,
        ));
        tx
    }
}

async fn run_lane(
    store: Arc<dyn RecordStore>,
    attempt_id: Arc<str>,
    question_id: String,
    mut jobs: mpsc::UnboundedReceiver<LaneJob>,
) {
    while let Some(job) = jobs.recv().await {
        let (selected_answer, action, ack) = match job {
            LaneJob::Save { selected_answer, action, ack } => (selected_answer, action, ack),
            LaneJob::Barrier(done) => {
                let _ = done.send(());
                continue;
            }
        };

        let result = store
            .upsert_answer_response(&attempt_id, &question_id, selected_answer.as_ref(), action)
            .await;

        match &result {
            Ok(()) => {
                metrics::counter!("answer_saves_total", "outcome" => "saved").increment(1);
            }
            Err(err) => {
                metrics::counter!("answer_saves_total", "outcome" => "failed").increment(1);
                if ack.is_none() {
                    tracing::warn!(
                        attempt_id = %attempt_id,
                        question_id = %question_id,
                        action = action.as_str(),
                        error = %err,
                        "Background answer save failed"
                    );
                }
            }
        }

        if let Some(ack) = ack {
            let _ = ack.send(result);
        }
    }
}

fn closed_lane(question_id: &str) -> StoreError {
    StoreError::Unavailable(format!("save lane for question {question_id} closed"))
}
