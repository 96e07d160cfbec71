//! Configuration schema types for `avatarforge.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_MAX_AGE_DAYS};

/// Project configuration.
///
/// Every field has a default, so an empty file (or no file) is a valid
/// project; unknown keys are rejected to catch typos.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Root directory of avatar art: `<assets>/<species>/base.png` and
    /// `<assets>/items/<id>.png`
    #[serde(default = "default_assets")]
    pub assets: PathBuf,
    /// Placement store path
    #[serde(default = "default_placements")]
    pub placements: PathBuf,
    /// Item catalog path
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
    /// Thumbnail cache settings
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Thumbnail cache section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache file path
    #[serde(default = "default_cache_file")]
    pub file: PathBuf,
    /// Maximum retained entries
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Entry lifetime in days
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

fn default_assets() -> PathBuf {
    PathBuf::from("assets")
}

fn default_placements() -> PathBuf {
    PathBuf::from("placements.json")
}

fn default_catalog() -> PathBuf {
    PathBuf::from("catalog.json")
}

fn default_cache_file() -> PathBuf {
    PathBuf::from(".avatarforge/thumbnails.json")
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_max_age_days() -> i64 {
    DEFAULT_MAX_AGE_DAYS
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            placements: default_placements(),
            catalog: default_catalog(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file: default_cache_file(),
            capacity: default_capacity(),
            max_age_days: default_max_age_days(),
        }
    }
}

impl ProjectConfig {
    /// Validate cross-field constraints. Returns a list of problems, empty
    /// when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.cache.capacity == 0 {
            problems.push("cache.capacity must be at least 1".to_string());
        }
        if self.cache.max_age_days < 1 {
            problems.push("cache.max_age_days must be at least 1".to_string());
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let config: ProjectConfig = toml::from_str("").unwrap();
        assert_eq!(config.assets, PathBuf::from("assets"));
        assert_eq!(config.cache.capacity, 100);
        assert_eq!(config.cache.max_age_days, 7);
    }

    #[test]
    fn test_partial_cache_section() {
        let config: ProjectConfig = toml::from_str(
            r#"
            assets = "art"

            [cache]
            capacity = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.assets, PathBuf::from("art"));
        assert_eq!(config.cache.capacity, 50);
        assert_eq!(config.cache.max_age_days, 7);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result: Result<ProjectConfig, _> = toml::from_str("asets = \"typo\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_flags_zero_capacity() {
        let mut config = ProjectConfig::default();
        config.cache.capacity = 0;
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn test_validate_default_is_clean() {
        assert!(ProjectConfig::default().validate().is_empty());
    }
}
