//! Background processing of submitted documents.
//!
//! [`JobCoordinator`] claims pending documents found by a [`WorkSource`] and drives each
//! one through extraction and recognition to `ocr_completed` or `error`.

mod coordinator;
mod source;

pub use coordinator::{CycleOutcome, JobCoordinator, WorkerStats};
pub use source::{StorePoller, WorkSource};
