pub(crate) mod answers;
pub(crate) mod attempts;
pub(crate) mod exams;
pub(crate) mod health;
pub(crate) mod questions;
pub mod store;
pub(crate) mod users;

pub use store::{AttemptScope, PgRecordStore, RecordStore, StartedAttempt, StoreError};
