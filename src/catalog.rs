//! Item catalog
//!
//! Metadata for the decorative items students can equip. The renderer only
//! needs an item's category (for anchor defaults) and display name; art is
//! resolved by id under the asset root.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::placement::ItemCategory;

/// Catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read item catalog '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write item catalog '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed item catalog: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One equippable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Human-readable name for UI and CLI output
    pub name: String,
    pub category: ItemCategory,
}

/// The full item catalog, keyed by item id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemCatalog {
    pub items: BTreeMap<String, CatalogItem>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from disk; a missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| CatalogError::Write {
                    path: path.display().to_string(),
                    source,
                })?;
            }
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data).map_err(|source| CatalogError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn get(&self, item_id: &str) -> Option<&CatalogItem> {
        self.items.get(item_id)
    }

    pub fn insert(&mut self, item_id: impl Into<String>, item: CatalogItem) {
        self.items.insert(item_id.into(), item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut catalog = ItemCatalog::new();
        catalog.insert(
            "hat_wizard",
            CatalogItem {
                name: "Wizard Hat".into(),
                category: ItemCategory::Hat,
            },
        );
        assert_eq!(catalog.get("hat_wizard").unwrap().name, "Wizard Hat");
        assert!(catalog.get("hat_party").is_none());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut catalog = ItemCatalog::new();
        catalog.insert(
            "glasses_round",
            CatalogItem {
                name: "Round Glasses".into(),
                category: ItemCategory::Glasses,
            },
        );
        let json = serde_json::to_string(&catalog).unwrap();
        let parsed: ItemCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.get("glasses_round"), catalog.get("glasses_round"));
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&ItemCategory::Hat).unwrap();
        assert_eq!(json, "\"hat\"");
    }
}
