//! Avatar compositing
//!
//! Layers a student's recolored base animal and their equipped items into a
//! fixed-size square canvas. The base art is contain-fit and scaled by the
//! species' base-fill factor; each item is placed through the stored
//! normalized placement, the species item correction, and the anchored
//! transform. A missing item layer degrades to a warning; only missing base
//! art fails the render.

use std::path::PathBuf;
use std::str::FromStr;

use image::imageops::FilterType;
use image::{imageops, Rgba, RgbaImage};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::ItemCatalog;
use crate::color::{parse_color, ColorError};
use crate::geometry::{GeometryError, ImageBounds};
use crate::placement::PlacementStore;
use crate::species;
use crate::transform;

/// Maximum number of item layers composited onto one avatar.
pub const MAX_ITEM_SLOTS: usize = 3;

/// The three standard container sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarSize {
    /// List views and the community forum
    Thumbnail,
    /// The shared room/garden view
    Room,
    /// The customization screen
    Customization,
}

impl AvatarSize {
    /// Square container edge in pixels.
    pub fn px(&self) -> u32 {
        match self {
            AvatarSize::Thumbnail => 96,
            AvatarSize::Room => 160,
            AvatarSize::Customization => 320,
        }
    }
}

impl FromStr for AvatarSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thumbnail" => Ok(AvatarSize::Thumbnail),
            "room" => Ok(AvatarSize::Room),
            "customization" => Ok(AvatarSize::Customization),
            other => Err(format!(
                "unknown size '{}', expected thumbnail, room, or customization",
                other
            )),
        }
    }
}

/// Everything needed to render one student's avatar.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarSpec {
    pub species: String,
    /// Hex color applied to primary marker pixels in the base art
    pub primary_color: String,
    /// Hex color applied to secondary marker pixels
    pub secondary_color: String,
    /// Equipped item ids, in slot order
    pub items: Vec<String>,
}

/// Composite errors
#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("cannot load base art for '{species}' from '{path}': {source}")]
    BaseArt {
        species: String,
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Color(#[from] ColorError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Renders avatars from an asset directory plus the placement store and item
/// catalog. Holds no mutable state; safe to share across render threads.
pub struct Compositor<'a> {
    asset_root: PathBuf,
    placements: &'a PlacementStore,
    catalog: &'a ItemCatalog,
}

impl<'a> Compositor<'a> {
    pub fn new(
        asset_root: impl Into<PathBuf>,
        placements: &'a PlacementStore,
        catalog: &'a ItemCatalog,
    ) -> Self {
        Self {
            asset_root: asset_root.into(),
            placements,
            catalog,
        }
    }

    /// `<assets>/<species-key>/base.png`
    pub fn base_art_path(&self, species_name: &str) -> PathBuf {
        self.asset_root
            .join(species::canonical_key(species_name))
            .join("base.png")
    }

    /// `<assets>/items/<id>.png`
    pub fn item_art_path(&self, item_id: &str) -> PathBuf {
        self.asset_root.join("items").join(format!("{}.png", item_id))
    }

    /// Composite one avatar into a square canvas of the given size.
    pub fn render(&self, spec: &AvatarSpec, size: AvatarSize) -> Result<RgbaImage, CompositeError> {
        let primary = parse_color(&spec.primary_color)?;
        let secondary = parse_color(&spec.secondary_color)?;

        let base_path = self.base_art_path(&spec.species);
        let mut base = image::open(&base_path)
            .map_err(|source| CompositeError::BaseArt {
                species: spec.species.clone(),
                path: base_path.display().to_string(),
                source,
            })?
            .to_rgba8();
        recolor_markers(&mut base, primary, secondary);

        let container = size.px() as f32;
        let bounds =
            ImageBounds::contain(container, container, base.width() as f32, base.height() as f32)?
                .scaled(species::base_scale(&spec.species));

        let mut canvas = RgbaImage::new(size.px(), size.px());
        let base_layer = imageops::resize(
            &base,
            (bounds.width.round() as u32).max(1),
            (bounds.height.round() as u32).max(1),
            FilterType::Triangle,
        );
        overlay_at(
            &mut canvas,
            &base_layer,
            bounds.left.round() as i32,
            bounds.top.round() as i32,
        );

        if spec.items.len() > MAX_ITEM_SLOTS {
            warn!(
                count = spec.items.len(),
                "more than {} items equipped, extra slots ignored", MAX_ITEM_SLOTS
            );
        }
        for item_id in spec.items.iter().take(MAX_ITEM_SLOTS) {
            self.composite_item(&mut canvas, &bounds, &spec.species, item_id);
        }

        Ok(canvas)
    }

    /// Layer a single item. Any failure here skips the layer with a warning;
    /// the avatar still renders.
    fn composite_item(
        &self,
        canvas: &mut RgbaImage,
        bounds: &ImageBounds,
        species_name: &str,
        item_id: &str,
    ) {
        let Some(item) = self.catalog.get(item_id) else {
            warn!(item_id, "item not in catalog, layer skipped");
            return;
        };
        let Some(position) = self.placements.get(species_name, item_id) else {
            warn!(item_id, species = species_name, "no stored placement, layer skipped");
            return;
        };
        let art_path = self.item_art_path(item_id);
        let art = match image::open(&art_path) {
            Ok(img) => img.to_rgba8(),
            Err(error) => {
                warn!(item_id, %error, "cannot load item art, layer skipped");
                return;
            }
        };

        let placed = transform::resolve(position, bounds, art.width(), art.height(), species_name);
        if placed.width < 1.0 || placed.height < 1.0 {
            debug!(item_id, "item resolves below one pixel, layer skipped");
            return;
        }
        debug!(item = %item.name, species = species_name, "layering item");

        let scaled = imageops::resize(
            &art,
            placed.width.round() as u32,
            placed.height.round() as u32,
            FilterType::Triangle,
        );

        if placed.rotation == 0.0 {
            overlay_at(
                canvas,
                &scaled,
                placed.left.round() as i32,
                placed.top.round() as i32,
            );
        } else {
            // Rotate about the anchor, then re-seat the moved anchor on the
            // target point so rotation does not displace the placement.
            let pivot = (
                placed.anchor.0 * scaled.width() as f32,
                placed.anchor.1 * scaled.height() as f32,
            );
            let (rotated, rotated_pivot) = rotate_about(&scaled, placed.rotation, pivot);
            overlay_at(
                canvas,
                &rotated,
                (placed.target.x - rotated_pivot.0).round() as i32,
                (placed.target.y - rotated_pivot.1).round() as i32,
            );
        }
    }
}

/// Recolor customization markers in base art.
///
/// Artists shade recolorable regions with pure marker ramps: magenta
/// `(v, 0, v)` for the primary region, cyan `(0, v, v)` for the secondary.
/// Each marker pixel becomes the student color scaled by the ramp value, so
/// shading survives the swap. All other pixels pass through untouched.
pub fn recolor_markers(image: &mut RgbaImage, primary: Rgba<u8>, secondary: Rgba<u8>) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }
        if r == b && g == 0 && r > 0 {
            *pixel = shade(primary, r, a);
        } else if g == b && r == 0 && g > 0 {
            *pixel = shade(secondary, g, a);
        }
    }
}

fn shade(color: Rgba<u8>, ramp: u8, alpha: u8) -> Rgba<u8> {
    let scale = |c: u8| -> u8 { ((c as u16 * ramp as u16) / 255) as u8 };
    Rgba([scale(color[0]), scale(color[1]), scale(color[2]), alpha])
}

/// Alpha-composite `top` over `base` with a signed offset, clipping at the
/// canvas edges.
fn overlay_at(base: &mut RgbaImage, top: &RgbaImage, left: i32, top_offset: i32) {
    let (base_w, base_h) = (base.width() as i32, base.height() as i32);
    for (dx, dy, pixel) in top.enumerate_pixels() {
        let x = left + dx as i32;
        let y = top_offset + dy as i32;
        if x < 0 || y < 0 || x >= base_w || y >= base_h {
            continue;
        }
        let alpha = pixel[3] as f32 / 255.0;
        if alpha > 0.99 {
            base.put_pixel(x as u32, y as u32, *pixel);
        } else if alpha > 0.01 {
            let bg = base.get_pixel(x as u32, y as u32);
            let blended = blend_pixel(bg, pixel, alpha);
            base.put_pixel(x as u32, y as u32, blended);
        }
    }
}

fn blend_pixel(bg: &Rgba<u8>, fg: &Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let inv = 1.0 - alpha;
    let out_alpha = (fg[3] as f32 + bg[3] as f32 * inv).min(255.0);
    Rgba([
        (fg[0] as f32 * alpha + bg[0] as f32 * inv) as u8,
        (fg[1] as f32 * alpha + bg[1] as f32 * inv) as u8,
        (fg[2] as f32 * alpha + bg[2] as f32 * inv) as u8,
        out_alpha as u8,
    ])
}

/// Rotate an image clockwise by `degrees` about a pivot in source pixel
/// coordinates. Returns the rotated image (sized to the rotated bounding
/// box) and the pivot's position within it.
fn rotate_about(image: &RgbaImage, degrees: f32, pivot: (f32, f32)) -> (RgbaImage, (f32, f32)) {
    let radians = degrees.to_radians();
    let (sin, cos) = radians.sin_cos();
    let (w, h) = (image.width() as f32, image.height() as f32);

    let out_w = (w * cos.abs() + h * sin.abs()).round().max(1.0);
    let out_h = (w * sin.abs() + h * cos.abs()).round().max(1.0);
    let (src_cx, src_cy) = (w / 2.0, h / 2.0);
    let (dst_cx, dst_cy) = (out_w / 2.0, out_h / 2.0);

    let mut out = RgbaImage::new(out_w as u32, out_h as u32);
    for y in 0..out.height() {
        for x in 0..out.width() {
            // Inverse-map the destination pixel center back into source space
            let dx = x as f32 + 0.5 - dst_cx;
            let dy = y as f32 + 0.5 - dst_cy;
            let sx = dx * cos + dy * sin + src_cx - 0.5;
            let sy = -dx * sin + dy * cos + src_cy - 0.5;
            out.put_pixel(x, y, sample_bilinear(image, sx, sy));
        }
    }

    // The pivot moves with the forward rotation about the center
    let px = pivot.0 - src_cx;
    let py = pivot.1 - src_cy;
    let rotated_pivot = (
        px * cos - py * sin + dst_cx,
        px * sin + py * cos + dst_cy,
    );
    (out, rotated_pivot)
}

/// Bilinear sample with transparent-outside semantics.
fn sample_bilinear(image: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let tx = x - x0 as f32;
    let ty = y - y0 as f32;

    let fetch = |px: i32, py: i32| -> [f32; 4] {
        if px < 0 || py < 0 || px >= w || py >= h {
            [0.0; 4]
        } else {
            let p = image.get_pixel(px as u32, py as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        }
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut channels = [0u8; 4];
    for i in 0..4 {
        let top = p00[i] * (1.0 - tx) + p10[i] * tx;
        let bottom = p01[i] * (1.0 - tx) + p11[i] * tx;
        channels[i] = (top * (1.0 - ty) + bottom * ty).round() as u8;
    }
    Rgba(channels)
}
