use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Loads a config file. `.yaml`/`.yml` files are parsed as YAML, anything else as JSON.
/// Environment overrides are NOT applied here; see [`apply_env_overrides`].
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    if is_yaml {
        let json_value: serde_json::Value = serde_yaml::from_str(&content)?;
        load_config_from_value(json_value)
    } else {
        load_config_from_str(&content)
    }
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;
    load_config_from_value(json_value)
}

fn load_config_from_value(json_value: serde_json::Value) -> Result<Config, ConfigError> {
    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the config at `path` when given, otherwise the default file if it exists,
/// otherwise built-in defaults. Environment overrides are applied last.
pub fn load_effective_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => load_config(p)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(p) => load_config(p)?,
            None => Config::default(),
        },
    };
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Returns the default config location: `~/.docpipe/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".docpipe").join("config.json"))
}

/// Applies the environment variables understood by earlier deployments
/// (`STORAGE_PATH`, `MAX_WORKERS`, `DOC_QNA_MODEL`) plus docpipe-specific ones.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Some(path) = env_value("STORAGE_PATH") {
        config.storage_path = PathBuf::from(path);
    }
    if let Some(raw) = env_value("MAX_WORKERS") {
        config.max_workers = raw.parse().map_err(|_| ConfigError::InvalidEnv {
            name: "MAX_WORKERS".to_string(),
            value: raw.clone(),
        })?;
    }
    if let Some(model) = env_value("DOC_QNA_MODEL") {
        config.remote.chat_model = model;
    }
    if let Some(model) = env_value("DOCPIPE_OCR_MODEL") {
        config.remote.ocr_model = model;
    }
    if let Some(url) = env_value("DOCPIPE_BASE_URL") {
        config.remote.base_url = url;
    }
    if let Some(level) = env_value("DOCPIPE_LOG_LEVEL") {
        config.logging.level = level;
    }
    Ok(())
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.max_workers == 0 {
        return Err(ConfigError::Validation {
            message: "max_workers must be at least 1".to_string(),
        });
    }

    let base_url = &config.remote.base_url;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation {
            message: format!("remote.base_url must be an http(s) URL: {}", base_url),
        });
    }

    if config.storage_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "storage_path must not be empty".to_string(),
        });
    }

    Ok(())
}
