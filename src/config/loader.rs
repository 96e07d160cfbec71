//! Configuration loading and discovery for `avatarforge.toml`

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::schema::ProjectConfig;

/// Project config file name.
pub const CONFIG_FILE: &str = "avatarforge.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse avatarforge.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// Find `avatarforge.toml` by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    let mut dir = env::current_dir().ok()?;
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Load project configuration.
///
/// An explicit path must exist and parse; without one, a discovered
/// `avatarforge.toml` is used when present, and built-in defaults otherwise.
pub fn load_config(explicit: Option<&Path>) -> Result<ProjectConfig, ConfigError> {
    let config = match explicit {
        Some(path) => parse_file(path)?,
        None => match find_config() {
            Some(path) => parse_file(&path)?,
            None => ProjectConfig::default(),
        },
    };
    let problems = config.validate();
    if !problems.is_empty() {
        return Err(ConfigError::Validation(problems));
    }
    Ok(config)
}

fn parse_file(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let data = fs::read_to_string(path)?;
    Ok(toml::from_str(&data)?)
}
