//! Job records and the durable job store.

mod model;
mod store;

pub use model::{new_job_id, Job, JobStatus, TerminalStatus};
pub use store::JobStore;
