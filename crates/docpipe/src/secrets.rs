//! API key resolution for the remote document service.
//!
//! The key is looked up in priority order:
//!
//! 1. **Inline value** from the config file (`remote.api_key`), handy for local testing
//! 2. **Key file** (`remote.api_key_file`), the Docker secrets pattern
//! 3. **Environment variable** (`remote.api_key_env`, `MISTRAL_API_KEY` by default)

use secrecy::SecretString;

use crate::config::RemoteConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key configured (set remote.api_key, remote.api_key_file or the env var named by remote.api_key_env)")]
    NoSourceProvided,

    #[error("Failed to read API key from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("API key from {origin} is empty")]
    Empty { origin: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves the API key for the remote service from its config section.
pub fn resolve_api_key(remote: &RemoteConfig) -> Result<SecretString> {
    let env_var = Some(remote.api_key_env.as_str()).filter(|s| !s.is_empty());
    resolve_secret(
        remote.api_key.as_deref(),
        remote.api_key_file.as_deref(),
        env_var,
    )
}

/// Resolves a secret from an inline value, a file, or an environment variable,
/// in that order. Empty inline values and empty paths count as "not configured".
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = std::fs::read_to_string(&expanded).map_err(|e| {
            SecretError::FileReadError {
                path: expanded.clone(),
                source: e,
            }
        })?;
        return non_empty(content.trim(), &expanded);
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            // Env files often leave a trailing newline behind.
            Ok(value) => non_empty(value.trim(), name),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

fn non_empty(value: &str, origin: &str) -> Result<SecretString> {
    if value.is_empty() {
        return Err(SecretError::Empty {
            origin: origin.to_string(),
        });
    }
    Ok(SecretString::from(value.to_string()))
}

/// Expands a leading `~` or `~/` to the current user's home directory.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
