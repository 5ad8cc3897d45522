use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding uploads, results and the job database.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    /// Number of pipeline worker threads.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data")
}

fn default_max_workers() -> usize {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            max_workers: default_max_workers(),
            remote: RemoteConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn paths(&self) -> StoragePaths {
        StoragePaths::new(&self.storage_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key given inline. Prefer `api_key_file` or `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_ocr_model")]
    pub ocr_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_signed_url_expiry_hours")]
    pub signed_url_expiry_hours: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.mistral.ai".to_string()
}

fn default_api_key_env() -> String {
    "MISTRAL_API_KEY".to_string()
}

fn default_ocr_model() -> String {
    "mistral-ocr-latest".to_string()
}

fn default_chat_model() -> String {
    "mistral-small-latest".to_string()
}

fn default_signed_url_expiry_hours() -> u32 {
    24
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            ocr_model: default_ocr_model(),
            chat_model: default_chat_model(),
            signed_url_expiry_hours: default_signed_url_expiry_hours(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// On-disk layout below the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub root: PathBuf,
    pub uploads: PathBuf,
    pub results: PathBuf,
    pub database: PathBuf,
}

impl StoragePaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            uploads: root.join("uploads"),
            results: root.join("results"),
            database: root.join("jobs.db"),
            root,
        }
    }

    /// Creates the storage root and its subdirectories.
    pub fn ensure(&self) -> Result<(), crate::error::StorageError> {
        for dir in [&self.root, &self.uploads, &self.results] {
            std::fs::create_dir_all(dir).map_err(|e| {
                crate::error::StorageError::CreateDirectory {
                    path: dir.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }
}
