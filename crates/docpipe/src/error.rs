use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocpipeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Remote service error: {0}")]
    Remote(#[from] crate::remote::RemoteError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: String, value: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed result document '{path}': {source}")]
    MalformedDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize result document: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("No result document for job {0}")]
    MissingDocument(String),

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Result store lock poisoned")]
    LockPoisoned,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Blocking task failed: {0}")]
    Join(String),
}

/// Errors surfaced to clients of [`crate::service::JobService`].
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed client input; nothing was persisted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Result not ready for job {0}")]
    NotReady(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Remote service failed: {0}")]
    Remote(#[from] crate::remote::RemoteError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Database failed: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Export failed: {0}")]
    Export(#[from] crate::export::ExportError),

    #[error("Worker failed: {0}")]
    Worker(#[from] WorkerError),
}

impl ServiceError {
    /// True for errors caused by the caller rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidInput(_) | ServiceError::NotFound(_) | ServiceError::NotReady(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DocpipeError>;
