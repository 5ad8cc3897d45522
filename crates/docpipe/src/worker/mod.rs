pub mod dispatcher;
pub mod job;
pub mod pool;

pub use dispatcher::Dispatcher;
pub use job::{JobSource, SubmitOptions, WorkItem};
pub use pool::WorkerPool;

use crate::error::{ServiceError, WorkerError};

/// Runs blocking store work off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Worker(WorkerError::Join(e.to_string())))?
}
