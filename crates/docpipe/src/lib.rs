pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod jobs;
pub mod pipeline;
pub mod remote;
pub mod results;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod worker;

pub use config::{load_config, load_effective_config, Config};
pub use error::{ConfigError, DocpipeError, Result, ServiceError, StorageError, WorkerError};
pub use export::{ExportFormat, ExportedDocument};
pub use jobs::{Job, JobStatus, JobStore};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext};
pub use remote::{MistralClient, RemoteError, RemoteService};
pub use results::{ResultDocument, ResultStore};
pub use secrets::{resolve_secret, SecretError};
pub use service::{JobService, JobStatusReport};
pub use worker::SubmitOptions;
