//! Built-in per-species render configuration.
//!
//! Source illustrations are drawn by different artists and carry different
//! effective bounding boxes: an otter drawn small in a large transparent
//! canvas needs to be scaled up relative to an owl drawn edge to edge. The
//! table below is the sole source of those correction factors, compiled in
//! and immutable at runtime.

use thiserror::Error;
use tracing::warn;

/// Fraction of its container the base animal occupies by convention.
pub const BASE_FILL: f32 = 0.75;

/// Default attachment points for a species, in normalized coordinates of the
/// rendered base art. Used by the placement tool as starting defaults when an
/// item has no stored placement yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesAnchors {
    /// Where a hat sits (top of the head)
    pub head: (f32, f32),
    /// Where glasses sit (eye line)
    pub eyes: (f32, f32),
    /// Where a held/worn accessory sits
    pub chest: (f32, f32),
}

/// Static render configuration for one species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesConfig {
    /// Human-readable name for UI and CLI output
    pub display_name: &'static str,
    /// Correction for the species' effective bounding box (1.0 = art fills
    /// its canvas)
    pub base_scale: f32,
    /// Correction applied to item scales on this species
    pub item_scale: f32,
    /// Default attachment points
    pub anchors: SpeciesAnchors,
}

/// Error type for strict species lookups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown species: {0}")]
pub struct UnknownSpecies(pub String);

const DEFAULT_ANCHORS: SpeciesAnchors = SpeciesAnchors {
    head: (0.5, 0.12),
    eyes: (0.5, 0.3),
    chest: (0.5, 0.62),
};

const OWL: SpeciesConfig = SpeciesConfig {
    display_name: "Owl",
    base_scale: 1.0,
    item_scale: 1.0,
    anchors: SpeciesAnchors { head: (0.5, 0.08), eyes: (0.5, 0.28), chest: (0.5, 0.6) },
};

const OTTER: SpeciesConfig = SpeciesConfig {
    display_name: "Otter",
    base_scale: 1.8,
    item_scale: 1.1,
    anchors: SpeciesAnchors { head: (0.5, 0.1), eyes: (0.5, 0.24), chest: (0.5, 0.58) },
};

const MEERKAT: SpeciesConfig = SpeciesConfig {
    display_name: "Meerkat",
    base_scale: 1.15,
    item_scale: 0.8,
    anchors: SpeciesAnchors { head: (0.5, 0.06), eyes: (0.5, 0.18), chest: (0.5, 0.5) },
};

const FOX: SpeciesConfig = SpeciesConfig {
    display_name: "Fox",
    base_scale: 1.2,
    item_scale: 1.0,
    anchors: SpeciesAnchors { head: (0.5, 0.1), eyes: (0.5, 0.27), chest: (0.5, 0.6) },
};

const PANDA: SpeciesConfig = SpeciesConfig {
    display_name: "Panda",
    base_scale: 0.95,
    item_scale: 1.15,
    anchors: SpeciesAnchors { head: (0.5, 0.1), eyes: (0.5, 0.3), chest: (0.5, 0.65) },
};

const KOALA: SpeciesConfig = SpeciesConfig {
    display_name: "Koala",
    base_scale: 1.05,
    item_scale: 1.05,
    anchors: DEFAULT_ANCHORS,
};

const HEDGEHOG: SpeciesConfig = SpeciesConfig {
    display_name: "Hedgehog",
    base_scale: 1.4,
    item_scale: 0.9,
    anchors: SpeciesAnchors { head: (0.5, 0.16), eyes: (0.5, 0.34), chest: (0.5, 0.66) },
};

const RED_PANDA: SpeciesConfig = SpeciesConfig {
    display_name: "Red Panda",
    base_scale: 1.25,
    item_scale: 1.0,
    anchors: DEFAULT_ANCHORS,
};

const TURTLE: SpeciesConfig = SpeciesConfig {
    display_name: "Turtle",
    base_scale: 1.1,
    item_scale: 0.85,
    anchors: SpeciesAnchors { head: (0.5, 0.2), eyes: (0.5, 0.32), chest: (0.5, 0.6) },
};

const BUNNY: SpeciesConfig = SpeciesConfig {
    display_name: "Bunny",
    base_scale: 1.3,
    item_scale: 0.95,
    // Ears push the head anchor down relative to the art's top edge
    anchors: SpeciesAnchors { head: (0.5, 0.3), eyes: (0.5, 0.45), chest: (0.5, 0.7) },
};

/// List of all species keys known to the table.
const SPECIES_KEYS: &[&str] = &[
    "owl",
    "otter",
    "meerkat",
    "fox",
    "panda",
    "koala",
    "hedgehog",
    "red-panda",
    "turtle",
    "bunny",
];

/// Returns a list of all known species keys.
pub fn list_species() -> Vec<&'static str> {
    SPECIES_KEYS.to_vec()
}

/// Canonicalize a species name into a table key: trimmed, lowercased,
/// spaces replaced with hyphens (`"Red Panda"` → `"red-panda"`).
pub fn canonical_key(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

/// Strict lookup: returns the config for a species, or `UnknownSpecies`.
///
/// Rendering paths that must degrade gracefully should use [`base_scale`]
/// and [`item_scale`] instead; this form exists so callers (and tests) can
/// distinguish known-good configuration from defaulted behavior.
pub fn lookup(name: &str) -> Result<&'static SpeciesConfig, UnknownSpecies> {
    match canonical_key(name).as_str() {
        "owl" => Ok(&OWL),
        "otter" => Ok(&OTTER),
        "meerkat" => Ok(&MEERKAT),
        "fox" => Ok(&FOX),
        "panda" => Ok(&PANDA),
        "koala" => Ok(&KOALA),
        "hedgehog" => Ok(&HEDGEHOG),
        "red-panda" => Ok(&RED_PANDA),
        "turtle" => Ok(&TURTLE),
        "bunny" => Ok(&BUNNY),
        _ => Err(UnknownSpecies(name.to_string())),
    }
}

/// Effective container-relative scale for a species' base art.
///
/// `BASE_FILL` times the species correction. Unknown species fall back to a
/// neutral correction of 1.0 so a misconfigured or newly added animal renders
/// at a sane size instead of breaking the page.
pub fn base_scale(name: &str) -> f32 {
    match lookup(name) {
        Ok(config) => BASE_FILL * config.base_scale,
        Err(_) => {
            warn!(species = name, "unknown species, using neutral base scale");
            BASE_FILL
        }
    }
}

/// Effective scale fraction for an item on a species.
///
/// `db_scale` is the stored integer percent (0–100). The result is that
/// fraction times the species' item correction, with a neutral 1.0 correction
/// for unknown species.
pub fn item_scale(db_scale: u8, name: &str) -> f32 {
    let fraction = f32::from(db_scale.min(100)) / 100.0;
    match lookup(name) {
        Ok(config) => fraction * config.item_scale,
        Err(_) => {
            warn!(species = name, "unknown species, using neutral item scale");
            fraction
        }
    }
}
