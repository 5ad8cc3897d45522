pub mod loader;
pub mod schema;

pub use loader::{
    apply_env_overrides, default_config_path, load_config, load_config_from_str,
    load_effective_config,
};
pub use schema::{Config, LoggingConfig, RemoteConfig, StoragePaths};
