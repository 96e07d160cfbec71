//! End-to-end pipeline through the library API: capture a placement, persist
//! the stores, composite an avatar, and batch-render roster thumbnails with
//! the cache.

use image::{Rgba, RgbaImage};
use tempfile::tempdir;

use avatarforge::cache::{JsonFileStorage, SystemClock, ThumbnailCache};
use avatarforge::catalog::{CatalogItem, ItemCatalog};
use avatarforge::compositor::{AvatarSize, AvatarSpec, Compositor};
use avatarforge::geometry::Point;
use avatarforge::output::save_png;
use avatarforge::placement::{capture_placement, Capture, ItemCategory, PlacementStore};
use avatarforge::roster::{render_thumbnails, Roster, Student};

/// Write marker-colored base art and one hat into an asset root.
fn write_assets(root: &std::path::Path) {
    let base = RgbaImage::from_pixel(40, 40, Rgba([255, 0, 255, 255]));
    save_png(&base, &root.join("owl/base.png")).unwrap();

    let hat = RgbaImage::from_pixel(16, 8, Rgba([200, 40, 40, 255]));
    save_png(&hat, &root.join("items/hat_wizard.png")).unwrap();
}

fn write_stores(dir: &std::path::Path) -> (PlacementStore, ItemCatalog) {
    // The admin captured the hat near the top of a 400x400 preview of the
    // square owl art
    let position = capture_placement(&Capture {
        container: (400.0, 400.0),
        image: (40.0, 40.0),
        pixel: Point::new(200.0, 80.0),
        scale: 50,
        rotation: 0.0,
        anchor: None,
        category: ItemCategory::Hat,
    })
    .unwrap();

    let mut placements = PlacementStore::new();
    placements.upsert("owl", "hat_wizard", position).unwrap();
    let placements_path = dir.join("placements.json");
    placements.save(&placements_path).unwrap();

    let mut catalog = ItemCatalog::new();
    catalog.insert(
        "hat_wizard",
        CatalogItem {
            name: "Wizard Hat".into(),
            category: ItemCategory::Hat,
        },
    );
    let catalog_path = dir.join("catalog.json");
    catalog.save(&catalog_path).unwrap();

    // Read both back through disk so the test covers the persisted format
    (
        PlacementStore::load(&placements_path).unwrap(),
        ItemCatalog::load(&catalog_path).unwrap(),
    )
}

#[test]
fn captured_placement_renders_at_every_size() {
    let dir = tempdir().unwrap();
    write_assets(dir.path());
    let (placements, catalog) = write_stores(dir.path());

    let compositor = Compositor::new(dir.path(), &placements, &catalog);
    let spec = AvatarSpec {
        species: "owl".into(),
        primary_color: "#3fa7d6".into(),
        secondary_color: "#fde68a".into(),
        items: vec!["hat_wizard".into()],
    };

    for size in [AvatarSize::Thumbnail, AvatarSize::Room, AvatarSize::Customization] {
        let canvas = compositor.render(&spec, size).unwrap();
        assert_eq!(canvas.dimensions(), (size.px(), size.px()));

        // Base is recolored to the primary color at the canvas center
        let center = size.px() / 2;
        assert_eq!(canvas.get_pixel(center, center), &Rgba([0x3f, 0xa7, 0xd6, 255]));

        // The hat pixel: target sits at y = 0.2 of the rendered base; just
        // above it the hat's red fill is visible at any size
        let fill = 0.75 * size.px() as f32;
        let offset = (size.px() as f32 - fill) / 2.0;
        let hat_y = (offset + 0.2 * fill - 2.0) as u32;
        assert_eq!(
            canvas.get_pixel(center, hat_y),
            &Rgba([200, 40, 40, 255]),
            "hat missing at {:?}",
            size
        );
    }
}

#[test]
fn batch_reuses_cache_until_colors_or_outfit_change() {
    let dir = tempdir().unwrap();
    write_assets(dir.path());
    let (placements, catalog) = write_stores(dir.path());
    let compositor = Compositor::new(dir.path(), &placements, &catalog);

    let cache_path = dir.path().join("thumbnails.json");
    let mut cache = ThumbnailCache::new(
        Box::new(JsonFileStorage::new(&cache_path)),
        Box::new(SystemClock),
    )
    .unwrap();

    let mut roster = Roster {
        students: vec![
            Student {
                id: "S-001".into(),
                species: "owl".into(),
                primary_color: "#ff0000".into(),
                secondary_color: "#00ff00".into(),
                items: vec!["hat_wizard".into()],
            },
            Student {
                id: "S-002".into(),
                species: "owl".into(),
                primary_color: "#0000ff".into(),
                secondary_color: "#ffffff".into(),
                items: vec![],
            },
        ],
    };

    let first = render_thumbnails(&roster, &compositor, &mut cache);
    assert_eq!(first.rendered, 2);
    assert_eq!(first.reused, 0);
    assert!(first.failed.is_empty());

    // Unchanged roster: everything comes from the cache
    let second = render_thumbnails(&roster, &compositor, &mut cache);
    assert_eq!(second.rendered, 0);
    assert_eq!(second.reused, 2);

    // Taking off the hat invalidates only that student
    roster.students[0].items.clear();
    let third = render_thumbnails(&roster, &compositor, &mut cache);
    assert_eq!(third.rendered, 1);
    assert_eq!(third.reused, 1);

    // A color change invalidates too
    roster.students[1].primary_color = "#123456".into();
    let fourth = render_thumbnails(&roster, &compositor, &mut cache);
    assert_eq!(fourth.rendered, 1);
    assert_eq!(fourth.reused, 1);

    // Cached data URLs decode back into thumbnail-sized PNGs
    let entry = cache.get("S-001").unwrap();
    let encoded = entry.data_url.strip_prefix("data:image/png;base64,").unwrap();
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!(decoded.width(), AvatarSize::Thumbnail.px());
}

#[test]
fn batch_reports_failures_without_aborting() {
    let dir = tempdir().unwrap();
    write_assets(dir.path());
    let (placements, catalog) = write_stores(dir.path());
    let compositor = Compositor::new(dir.path(), &placements, &catalog);

    let mut cache = ThumbnailCache::new(
        Box::new(JsonFileStorage::new(dir.path().join("thumbnails.json"))),
        Box::new(SystemClock),
    )
    .unwrap();

    let roster = Roster {
        students: vec![
            Student {
                id: "S-001".into(),
                species: "owl".into(),
                primary_color: "#ff0000".into(),
                secondary_color: "#00ff00".into(),
                items: vec![],
            },
            // No base art on disk for this species
            Student {
                id: "S-404".into(),
                species: "otter".into(),
                primary_color: "#ff0000".into(),
                secondary_color: "#00ff00".into(),
                items: vec![],
            },
        ],
    };

    let report = render_thumbnails(&roster, &compositor, &mut cache);
    assert_eq!(report.rendered, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "S-404");
    assert!(cache.get("S-001").is_some());
    assert!(cache.get("S-404").is_none());
}
