//! Letterbox geometry and normalized-coordinate conversion
//!
//! Avatar art ships in whatever proportions the illustrator drew it, but item
//! placements must survive any container size. Placements are therefore stored
//! in normalized [0,1] coordinates relative to the *rendered* image rectangle
//! (the contain-fit letterbox), and converted back to pixels per render.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in either pixel or normalized space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The rectangle an image actually occupies inside a container under
/// contain-fit semantics.
///
/// Derived on demand, never persisted. `width / height` preserves the image's
/// intrinsic aspect ratio; `left`/`top` center the rectangle in the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBounds {
    /// Rendered width in pixels
    pub width: f32,
    /// Rendered height in pixels
    pub height: f32,
    /// Horizontal offset of the rendered rectangle within the container
    pub left: f32,
    /// Vertical offset of the rendered rectangle within the container
    pub top: f32,
}

/// Error type for degenerate geometry inputs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Container dimensions must be positive
    #[error("container dimensions must be positive, got {width}x{height}")]
    InvalidContainer { width: f32, height: f32 },
    /// Image dimensions must be positive
    #[error("image dimensions must be positive, got {width}x{height}")]
    InvalidImage { width: f32, height: f32 },
}

impl ImageBounds {
    /// Compute the contain-fit placement of an image inside a container.
    ///
    /// If the container is relatively wider than the image, the image is
    /// height-constrained (full container height, width from the aspect
    /// ratio) and horizontally centered; otherwise it is width-constrained
    /// and vertically centered.
    ///
    /// Dimensions must be positive; degenerate inputs are rejected rather
    /// than producing NaN bounds.
    pub fn contain(
        container_w: f32,
        container_h: f32,
        image_w: f32,
        image_h: f32,
    ) -> Result<Self, GeometryError> {
        if !(container_w > 0.0 && container_h > 0.0) {
            return Err(GeometryError::InvalidContainer {
                width: container_w,
                height: container_h,
            });
        }
        if !(image_w > 0.0 && image_h > 0.0) {
            return Err(GeometryError::InvalidImage {
                width: image_w,
                height: image_h,
            });
        }

        let container_ratio = container_w / container_h;
        let image_ratio = image_w / image_h;

        if container_ratio > image_ratio {
            // Container relatively wider: image fills the height
            let height = container_h;
            let width = height * image_ratio;
            Ok(Self {
                width,
                height,
                left: (container_w - width) / 2.0,
                top: 0.0,
            })
        } else {
            // Container relatively taller (or same ratio): image fills the width
            let width = container_w;
            let height = width / image_ratio;
            Ok(Self {
                width,
                height,
                left: 0.0,
                top: (container_h - height) / 2.0,
            })
        }
    }

    /// Scale the rendered rectangle by a factor, keeping its center fixed
    /// within the original container footprint.
    ///
    /// Used for the base-fill convention: the animal occupies a fraction of
    /// its container rather than touching the edges. Factors above 1.0 are
    /// allowed (species whose source art carries large transparent margins);
    /// the resulting rectangle may extend past the container and is clipped
    /// at composite time.
    pub fn scaled(&self, factor: f32) -> Self {
        let width = self.width * factor;
        let height = self.height * factor;
        Self {
            width,
            height,
            left: self.left + (self.width - width) / 2.0,
            top: self.top + (self.height - height) / 2.0,
        }
    }
}

/// Convert a pixel point (container space) to normalized [0,1] coordinates
/// relative to the rendered image rectangle.
///
/// Out-of-bounds input clamps to the nearest edge rather than erroring:
/// placements captured slightly outside the visible image still resolve to a
/// valid stored position.
pub fn pixels_to_normalized(point: Point, bounds: &ImageBounds) -> Point {
    Point {
        x: ((point.x - bounds.left) / bounds.width).clamp(0.0, 1.0),
        y: ((point.y - bounds.top) / bounds.height).clamp(0.0, 1.0),
    }
}

/// Convert a normalized position back to pixel coordinates in container space.
///
/// The inverse of [`pixels_to_normalized`], minus the clamp: stored data is
/// trusted to already satisfy the [0,1] invariant.
pub fn normalized_to_pixels(point: Point, bounds: &ImageBounds) -> Point {
    Point {
        x: bounds.left + point.x * bounds.width,
        y: bounds.top + point.y * bounds.height,
    }
}
