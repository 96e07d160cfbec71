//! Class rosters and batch thumbnail rendering
//!
//! A roster lists the students whose avatars a list view needs. The batch
//! renderer consults the thumbnail cache first (colors plus outfit
//! fingerprint), composites only the misses in parallel, and writes the
//! results back through the cache.

use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::cache::{outfit_fingerprint, ThumbnailCache};
use crate::compositor::{AvatarSize, AvatarSpec, Compositor};
use crate::output::to_data_url;

/// Roster errors
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("cannot read roster '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed roster: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One student's avatar configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub species: String,
    pub primary_color: String,
    pub secondary_color: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// A class roster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    pub students: Vec<Student>,
}

impl Roster {
    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let data = fs::read_to_string(path).map_err(|source| RosterError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Outcome of a batch render.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Thumbnails composited this run
    pub rendered: usize,
    /// Thumbnails served from the cache
    pub reused: usize,
    /// (student id, error) for students whose render failed
    pub failed: Vec<(String, String)>,
}

impl Student {
    fn avatar_spec(&self) -> AvatarSpec {
        AvatarSpec {
            species: self.species.clone(),
            primary_color: self.primary_color.clone(),
            secondary_color: self.secondary_color.clone(),
            items: self.items.clone(),
        }
    }
}

/// Render thumbnails for every student in the roster, reusing cached
/// entries whose colors and outfit are unchanged.
///
/// Misses are composited in parallel; the cache is written back on the
/// calling thread. The caller persists the cache when it is done.
pub fn render_thumbnails(
    roster: &Roster,
    compositor: &Compositor<'_>,
    cache: &mut ThumbnailCache,
) -> BatchReport {
    let mut report = BatchReport::default();

    let todo: Vec<&Student> = roster
        .students
        .iter()
        .filter(|student| {
            cache.needs_refresh_with_outfit(
                &student.id,
                &student.primary_color,
                &student.secondary_color,
                &outfit_fingerprint(&student.items),
            )
        })
        .collect();
    report.reused = roster.students.len() - todo.len();

    let results: Vec<(&Student, Result<String, String>)> = todo
        .par_iter()
        .map(|student| {
            let result = compositor
                .render(&student.avatar_spec(), AvatarSize::Thumbnail)
                .map_err(|e| e.to_string())
                .and_then(|canvas| to_data_url(&canvas).map_err(|e| e.to_string()));
            (*student, result)
        })
        .collect();

    for (student, result) in results {
        match result {
            Ok(data_url) => {
                cache.set(
                    &student.id,
                    data_url,
                    &student.species,
                    &student.primary_color,
                    &student.secondary_color,
                    Some(outfit_fingerprint(&student.items)),
                );
                report.rendered += 1;
            }
            Err(error) => report.failed.push((student.id.clone(), error)),
        }
    }

    info!(
        rendered = report.rendered,
        reused = report.reused,
        failed = report.failed.len(),
        "batch thumbnail render complete"
    );
    report
}
