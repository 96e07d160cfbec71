//! Anchored item transforms
//!
//! An item's designated anchor point (a hat's brim-bottom-center, glasses'
//! center) must land on the stored target coordinate, whatever the item art's
//! native proportions. The builder produces two renditions of that rule: a
//! CSS transform string for web renderers, where the translation is expressed
//! in percentages of the item's own rendered size, and a resolved pixel
//! rectangle for the native compositor.

use crate::geometry::{normalized_to_pixels, ImageBounds, Point};
use crate::placement::NormalizedPosition;
use crate::species;

/// Format a [0,1] fraction as a CSS percentage, trimming a trailing `.0`.
fn fmt_pct(fraction: f32) -> String {
    let pct = fraction * 100.0;
    if (pct - pct.round()).abs() < 1e-3 {
        format!("{}", pct.round() as i32)
    } else {
        format!("{:.1}", pct)
    }
}

/// Format degrees, trimming a trailing `.0`.
fn fmt_deg(degrees: f32) -> String {
    if (degrees - degrees.round()).abs() < 1e-3 {
        format!("{}", degrees.round() as i32)
    } else {
        format!("{:.1}", degrees)
    }
}

/// Build the CSS transform for a placement: a translation of
/// `-anchor * 100%` of the item's own rendered size, then the rotation.
///
/// Anchoring via percentage translation is what keeps items of varying
/// native aspect ratio aligned; the rotation term is omitted when zero.
pub fn css_transform(position: &NormalizedPosition) -> String {
    let translate = format!(
        "translate(-{}%, -{}%)",
        fmt_pct(position.anchor_x),
        fmt_pct(position.anchor_y)
    );
    if position.rotation == 0.0 {
        translate
    } else {
        format!("{} rotate({}deg)", translate, fmt_deg(position.rotation))
    }
}

/// CSS `transform-origin` matching the anchor, so rotation pivots around the
/// anchored point instead of displacing it.
pub fn transform_origin(anchor_x: f32, anchor_y: f32) -> String {
    format!("{}% {}%", fmt_pct(anchor_x), fmt_pct(anchor_y))
}

/// A placement resolved against concrete bounds: where the item goes in
/// container pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemTransform {
    /// The anchored point in container space
    pub target: Point,
    /// Rendered item width in pixels
    pub width: f32,
    /// Rendered item height in pixels
    pub height: f32,
    /// Top-left corner of the un-rotated item rectangle
    pub left: f32,
    /// Top-left corner of the un-rotated item rectangle
    pub top: f32,
    /// Rotation in degrees, applied about `target`
    pub rotation: f32,
    /// Anchor within the item box, carried through for the rotation pivot
    pub anchor: (f32, f32),
}

/// Resolve a stored placement to container pixels.
///
/// The rendered item width is the effective scale (stored percent times the
/// species correction) of the rendered animal width; height follows the item
/// art's aspect ratio. The top-left offset subtracts the anchor so the
/// anchored point, not the box corner, lands on the target.
pub fn resolve(
    position: &NormalizedPosition,
    bounds: &ImageBounds,
    item_width: u32,
    item_height: u32,
    species_name: &str,
) -> ItemTransform {
    let effective = species::item_scale(position.scale, species_name);
    let width = effective * bounds.width;
    let height = if item_width == 0 {
        0.0
    } else {
        width * item_height as f32 / item_width as f32
    };

    let target = normalized_to_pixels(Point::new(position.x, position.y), bounds);

    ItemTransform {
        target,
        width,
        height,
        left: target.x - position.anchor_x * width,
        top: target.y - position.anchor_y * height,
        rotation: position.rotation,
        anchor: (position.anchor_x, position.anchor_y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hat_position() -> NormalizedPosition {
        NormalizedPosition {
            x: 0.5,
            y: 0.2,
            scale: 50,
            rotation: 0.0,
            anchor_x: 0.5,
            anchor_y: 1.0,
        }
    }

    #[test]
    fn test_css_transform_without_rotation() {
        assert_eq!(css_transform(&hat_position()), "translate(-50%, -100%)");
    }

    #[test]
    fn test_css_transform_with_rotation() {
        let mut position = hat_position();
        position.rotation = 15.0;
        assert_eq!(
            css_transform(&position),
            "translate(-50%, -100%) rotate(15deg)"
        );
    }

    #[test]
    fn test_css_transform_fractional_anchor() {
        let mut position = hat_position();
        position.anchor_x = 0.375;
        assert_eq!(css_transform(&position), "translate(-37.5%, -100%)");
    }

    #[test]
    fn test_transform_origin_matches_anchor() {
        assert_eq!(transform_origin(0.5, 1.0), "50% 100%");
        assert_eq!(transform_origin(0.5, 0.5), "50% 50%");
    }

    #[test]
    fn test_resolve_anchors_bottom_center() {
        let bounds = ImageBounds {
            width: 100.0,
            height: 100.0,
            left: 0.0,
            top: 0.0,
        };
        // Owl has a neutral item correction, so 50% of 100px bounds = 50px wide
        let transform = resolve(&hat_position(), &bounds, 50, 25, "owl");
        assert!((transform.width - 50.0).abs() < 1e-4);
        assert!((transform.height - 25.0).abs() < 1e-4);
        assert!((transform.target.x - 50.0).abs() < 1e-4);
        assert!((transform.target.y - 20.0).abs() < 1e-4);
        // Anchor (0.5, 1.0): box shifts left by half its width, up by its height
        assert!((transform.left - 25.0).abs() < 1e-4);
        assert!((transform.top - -5.0).abs() < 1e-4);
    }

    #[test]
    fn test_resolve_applies_species_correction() {
        let bounds = ImageBounds {
            width: 100.0,
            height: 100.0,
            left: 0.0,
            top: 0.0,
        };
        // Meerkat corrects items by 0.8: 50% becomes 40px of a 100px bounds
        let transform = resolve(&hat_position(), &bounds, 50, 25, "meerkat");
        assert!((transform.width - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_resolve_respects_bounds_offset() {
        let bounds = ImageBounds {
            width: 100.0,
            height: 100.0,
            left: 30.0,
            top: 10.0,
        };
        let transform = resolve(&hat_position(), &bounds, 50, 25, "owl");
        assert!((transform.target.x - 80.0).abs() < 1e-4);
        assert!((transform.target.y - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_resolve_zero_width_item() {
        let bounds = ImageBounds {
            width: 100.0,
            height: 100.0,
            left: 0.0,
            top: 0.0,
        };
        let transform = resolve(&hat_position(), &bounds, 0, 25, "owl");
        assert_eq!(transform.height, 0.0);
    }
}
