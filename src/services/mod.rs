pub mod answer_judge;
pub mod attempt_completion;
pub mod attempt_controller;
pub(crate) mod attempt_timing;
pub mod question_state;
pub mod save_queue;
pub mod score_recompute;
pub mod scoring;
pub mod session_timer;
