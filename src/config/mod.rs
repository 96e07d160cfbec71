//! Configuration module for avatarforge
//!
//! Provides types and loading for `avatarforge.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{find_config, load_config, ConfigError, CONFIG_FILE};
pub use schema::{CacheConfig, ProjectConfig};
