//! Normalized item placements and the placement store
//!
//! A placement records where an item sits on a species' base art,
//! independent of final render size: normalized [0,1] coordinates against
//! the rendered (letterboxed) image rectangle, a stored scale percent, a
//! rotation, and the anchor point within the item's own box that lands on
//! the target coordinate. Placements are captured in pixel space by the
//! admin tool, normalized on the way in, and persisted per
//! (species, item id) pair.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{pixels_to_normalized, GeometryError, ImageBounds, Point};
use crate::species::canonical_key;

/// Schema version of the persisted placement store.
const STORE_VERSION: u32 = 1;

/// Item slot category. Determines the default anchor when a capture does not
/// override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Hat,
    Glasses,
    Accessory,
}

impl ItemCategory {
    /// Default anchor point for the category.
    ///
    /// A hat anchors at its brim (bottom-center) so the brim, not the
    /// bounding-box corner, sits on the head; glasses and accessories anchor
    /// at their geometric center.
    pub fn default_anchor(&self) -> (f32, f32) {
        match self {
            ItemCategory::Hat => (0.5, 1.0),
            ItemCategory::Glasses | ItemCategory::Accessory => (0.5, 0.5),
        }
    }
}

/// Where an item sits on a species, independent of render size.
///
/// `x`, `y`, `anchor_x`, `anchor_y` are normalized to [0,1]; `scale` is the
/// stored integer percent (1–100) fed through the species correction at
/// render time; `rotation` is degrees, applied about the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPosition {
    pub x: f32,
    pub y: f32,
    pub scale: u8,
    #[serde(default)]
    pub rotation: f32,
    pub anchor_x: f32,
    pub anchor_y: f32,
}

/// Placement errors
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("{field} must be within [0,1], got {value}")]
    OutOfRange { field: &'static str, value: f32 },
    #[error("scale must be between 1 and 100 percent, got {0}")]
    InvalidScale(u8),
    #[error("rotation must be finite, got {0}")]
    InvalidRotation(f32),
    #[error("invalid placement for '{key}': {source}")]
    InvalidRecord {
        key: String,
        #[source]
        source: Box<PlacementError>,
    },
    #[error("unsupported placement store version {0}")]
    UnsupportedVersion(u32),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("cannot read placement store '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write placement store '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed placement store: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl NormalizedPosition {
    /// Check the record invariants: coordinates and anchor in [0,1], scale
    /// in 1–100, rotation finite.
    pub fn validate(&self) -> Result<(), PlacementError> {
        let unit_fields = [
            ("x", self.x),
            ("y", self.y),
            ("anchor_x", self.anchor_x),
            ("anchor_y", self.anchor_y),
        ];
        for (field, value) in unit_fields {
            if !(value >= 0.0 && value <= 1.0) {
                return Err(PlacementError::OutOfRange { field, value });
            }
        }
        if self.scale == 0 || self.scale > 100 {
            return Err(PlacementError::InvalidScale(self.scale));
        }
        if !self.rotation.is_finite() {
            return Err(PlacementError::InvalidRotation(self.rotation));
        }
        Ok(())
    }
}

/// A pixel-space placement as captured by the admin tool against a rendered
/// preview.
#[derive(Debug, Clone, Copy)]
pub struct Capture {
    /// Preview container dimensions in pixels
    pub container: (f32, f32),
    /// Intrinsic dimensions of the base art
    pub image: (f32, f32),
    /// Clicked point in container space
    pub pixel: Point,
    /// Stored scale percent (1–100)
    pub scale: u8,
    /// Rotation in degrees
    pub rotation: f32,
    /// Anchor override; defaults by category when `None`
    pub anchor: Option<(f32, f32)>,
    /// Item category, for the anchor default
    pub category: ItemCategory,
}

/// Normalize a pixel-space capture into a storable placement.
///
/// The clicked point is converted against the preview's contain-fit bounds
/// and clamps to the image edge if the admin overshot slightly. Degenerate
/// preview dimensions are the one hard error on this path.
pub fn capture_placement(capture: &Capture) -> Result<NormalizedPosition, PlacementError> {
    let (container_w, container_h) = capture.container;
    let (image_w, image_h) = capture.image;
    let bounds = ImageBounds::contain(container_w, container_h, image_w, image_h)?;
    let normalized = pixels_to_normalized(capture.pixel, &bounds);
    let (anchor_x, anchor_y) = capture
        .anchor
        .unwrap_or_else(|| capture.category.default_anchor());

    let position = NormalizedPosition {
        x: normalized.x,
        y: normalized.y,
        scale: capture.scale,
        rotation: capture.rotation,
        anchor_x,
        anchor_y,
    };
    position.validate()?;
    Ok(position)
}

/// Persisted shape of the placement store.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedPlacements {
    version: u32,
    placements: BTreeMap<String, NormalizedPosition>,
}

/// Central store of placements, keyed by (species, item id).
///
/// The admin tool writes this file; every renderer reads it.
#[derive(Debug, Default, Clone)]
pub struct PlacementStore {
    records: BTreeMap<String, NormalizedPosition>,
}

fn record_key(species: &str, item_id: &str) -> String {
    format!("{}/{}", canonical_key(species), item_id)
}

impl PlacementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a store from disk. A missing file is an empty
    /// store; an invalid record is an error naming the offending key.
    pub fn load(path: &Path) -> Result<Self, PlacementError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path).map_err(|source| PlacementError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let persisted: PersistedPlacements = serde_json::from_str(&data)?;
        if persisted.version != STORE_VERSION {
            return Err(PlacementError::UnsupportedVersion(persisted.version));
        }
        for (key, record) in &persisted.placements {
            record.validate().map_err(|source| PlacementError::InvalidRecord {
                key: key.clone(),
                source: Box::new(source),
            })?;
        }
        Ok(Self {
            records: persisted.placements,
        })
    }

    /// Write the store to disk, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), PlacementError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| PlacementError::Write {
                    path: path.display().to_string(),
                    source,
                })?;
            }
        }
        let persisted = PersistedPlacements {
            version: STORE_VERSION,
            placements: self.records.clone(),
        };
        let data = serde_json::to_string_pretty(&persisted)?;
        fs::write(path, data).map_err(|source| PlacementError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn get(&self, species: &str, item_id: &str) -> Option<&NormalizedPosition> {
        self.records.get(&record_key(species, item_id))
    }

    /// Insert or replace a placement after validating it.
    pub fn upsert(
        &mut self,
        species: &str,
        item_id: &str,
        position: NormalizedPosition,
    ) -> Result<(), PlacementError> {
        position.validate()?;
        self.records.insert(record_key(species, item_id), position);
        Ok(())
    }

    pub fn remove(&mut self, species: &str, item_id: &str) -> Option<NormalizedPosition> {
        self.records.remove(&record_key(species, item_id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records as (key, placement), sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NormalizedPosition)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }
}
