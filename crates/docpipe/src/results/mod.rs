//! Per-job result documents persisted as JSON files.

mod document;
mod store;

pub use document::{QnaEntry, ResultDocument, Step, FAILED_STATUS};
pub use store::ResultStore;
