//! Command-line interface implementation

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use crate::cache::ThumbnailCache;
use crate::catalog::ItemCatalog;
use crate::compositor::{AvatarSize, AvatarSpec, Compositor};
use crate::config::{load_config, ProjectConfig};
use crate::geometry::Point;
use crate::output::save_png;
use crate::placement::{capture_placement, Capture, ItemCategory, PlacementStore};
use crate::roster::{render_thumbnails, Roster};
use crate::transform::{css_transform, transform_origin};

/// Exit codes
const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// Avatarforge - composite classroom avatars and manage item placements
#[derive(Parser)]
#[command(name = "avf")]
#[command(about = "Avatarforge - composite classroom avatars and manage item placements")]
#[command(version)]
pub struct Cli {
    /// Path to avatarforge.toml (discovered from the working directory if omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SizeArg {
    Thumbnail,
    Room,
    Customization,
}

impl From<SizeArg> for AvatarSize {
    fn from(value: SizeArg) -> Self {
        match value {
            SizeArg::Thumbnail => AvatarSize::Thumbnail,
            SizeArg::Room => AvatarSize::Room,
            SizeArg::Customization => AvatarSize::Customization,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Hat,
    Glasses,
    Accessory,
}

impl From<CategoryArg> for ItemCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Hat => ItemCategory::Hat,
            CategoryArg::Glasses => ItemCategory::Glasses,
            CategoryArg::Accessory => ItemCategory::Accessory,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture an item placement from preview pixel coordinates
    Place {
        /// Species the placement applies to
        species: String,

        /// Item id the placement applies to
        item: String,

        /// Preview container size as WxH (e.g. 400x400)
        #[arg(long)]
        container: String,

        /// Intrinsic base art size as WxH
        #[arg(long)]
        image: String,

        /// Captured pixel point as X,Y in container space
        #[arg(long)]
        pixel: String,

        /// Stored scale percent
        #[arg(long, default_value = "50", value_parser = clap::value_parser!(u8).range(1..=100))]
        scale: u8,

        /// Rotation in degrees
        #[arg(long, default_value = "0")]
        rotation: f32,

        /// Anchor override as X,Y in [0,1] (defaults by category)
        #[arg(long)]
        anchor: Option<String>,

        /// Item category, which sets the default anchor
        #[arg(long, value_enum, default_value = "hat")]
        category: CategoryArg,
    },

    /// List stored placements and their resolved CSS transforms
    Show {
        /// Only placements for this species
        #[arg(short, long)]
        species: Option<String>,
    },

    /// Composite one avatar to a PNG
    Render {
        /// Species to render
        species: String,

        /// Equipped item ids, comma separated
        #[arg(short, long, value_delimiter = ',')]
        items: Vec<String>,

        /// Primary customization color (hex)
        #[arg(long, default_value = "#a78bfa")]
        primary: String,

        /// Secondary customization color (hex)
        #[arg(long, default_value = "#fde68a")]
        secondary: String,

        /// Container size
        #[arg(long, value_enum, default_value = "customization")]
        size: SizeArg,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render thumbnails for a roster, reusing the cache
    Thumbs {
        /// Roster JSON file
        roster: PathBuf,

        /// Write a JSON manifest of student id -> data URL
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Inspect or maintain the thumbnail cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Print entry count and oldest write time
    Stats,
    /// Remove expired entries
    Cleanup,
    /// Drop every entry
    Clear,
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    match cli.command {
        Commands::Place {
            species,
            item,
            container,
            image,
            pixel,
            scale,
            rotation,
            anchor,
            category,
        } => run_place(
            &config, &species, &item, &container, &image, &pixel, scale, rotation,
            anchor.as_deref(), category,
        ),
        Commands::Show { species } => run_show(&config, species.as_deref()),
        Commands::Render {
            species,
            items,
            primary,
            secondary,
            size,
            output,
        } => run_render(&config, &species, &items, &primary, &secondary, size.into(), &output),
        Commands::Thumbs { roster, manifest } => {
            run_thumbs(&config, &roster, manifest.as_deref())
        }
        Commands::Cache { action } => run_cache(&config, &action),
    }
}

/// Parse a `WxH` dimension pair.
fn parse_dims(input: &str) -> Result<(f32, f32), String> {
    let parts: Vec<&str> = input.splitn(2, 'x').collect();
    if parts.len() != 2 {
        return Err(format!("expected WxH, got '{}'", input));
    }
    let w = parts[0].trim().parse::<f32>().map_err(|_| format!("bad width '{}'", parts[0]))?;
    let h = parts[1].trim().parse::<f32>().map_err(|_| format!("bad height '{}'", parts[1]))?;
    Ok((w, h))
}

/// Parse an `X,Y` coordinate pair.
fn parse_pair(input: &str) -> Result<(f32, f32), String> {
    let parts: Vec<&str> = input.splitn(2, ',').collect();
    if parts.len() != 2 {
        return Err(format!("expected X,Y, got '{}'", input));
    }
    let x = parts[0].trim().parse::<f32>().map_err(|_| format!("bad x '{}'", parts[0]))?;
    let y = parts[1].trim().parse::<f32>().map_err(|_| format!("bad y '{}'", parts[1]))?;
    Ok((x, y))
}

fn run_place(
    config: &ProjectConfig,
    species: &str,
    item: &str,
    container: &str,
    image: &str,
    pixel: &str,
    scale: u8,
    rotation: f32,
    anchor: Option<&str>,
    category: CategoryArg,
) -> ExitCode {
    let parsed = (|| -> Result<Capture, String> {
        let container = parse_dims(container)?;
        let image = parse_dims(image)?;
        let (px, py) = parse_pair(pixel)?;
        let anchor = anchor.map(parse_pair).transpose()?;
        Ok(Capture {
            container,
            image,
            pixel: Point::new(px, py),
            scale,
            rotation,
            anchor,
            category: category.into(),
        })
    })();

    let capture = match parsed {
        Ok(capture) => capture,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let position = match capture_placement(&capture) {
        Ok(position) => position,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let mut store = match PlacementStore::load(&config.placements) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    if let Err(e) = store.upsert(species, item, position) {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }
    if let Err(e) = store.save(&config.placements) {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }

    println!(
        "Stored {}/{}: x={:.4} y={:.4} scale={}% rotation={}deg anchor=({}, {})",
        species, item, position.x, position.y, position.scale, position.rotation,
        position.anchor_x, position.anchor_y
    );
    println!("  transform: {}", css_transform(&position));
    println!("  transform-origin: {}", transform_origin(position.anchor_x, position.anchor_y));
    ExitCode::from(EXIT_SUCCESS)
}

fn run_show(config: &ProjectConfig, species: Option<&str>) -> ExitCode {
    let store = match PlacementStore::load(&config.placements) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let filter = species.map(crate::species::canonical_key);
    let mut shown = 0;
    for (key, position) in store.iter() {
        if let Some(prefix) = &filter {
            if !key.starts_with(&format!("{}/", prefix)) {
                continue;
            }
        }
        println!(
            "{}: x={:.4} y={:.4} scale={}% rotation={}deg anchor=({}, {})",
            key, position.x, position.y, position.scale, position.rotation,
            position.anchor_x, position.anchor_y
        );
        println!("  transform: {}", css_transform(position));
        shown += 1;
    }
    if shown == 0 {
        println!("No placements stored.");
    }
    ExitCode::from(EXIT_SUCCESS)
}

fn run_render(
    config: &ProjectConfig,
    species: &str,
    items: &[String],
    primary: &str,
    secondary: &str,
    size: AvatarSize,
    output: &std::path::Path,
) -> ExitCode {
    let (placements, catalog) = match load_stores(config) {
        Ok(stores) => stores,
        Err(code) => return code,
    };
    let compositor = Compositor::new(&config.assets, &placements, &catalog);
    let spec = AvatarSpec {
        species: species.to_string(),
        primary_color: primary.to_string(),
        secondary_color: secondary.to_string(),
        items: items.to_vec(),
    };

    let canvas = match compositor.render(&spec, size) {
        Ok(canvas) => canvas,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    if let Err(e) = save_png(&canvas, output) {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }
    println!("Rendered {} at {}px -> {}", species, size.px(), output.display());
    ExitCode::from(EXIT_SUCCESS)
}

fn run_thumbs(
    config: &ProjectConfig,
    roster_path: &std::path::Path,
    manifest: Option<&std::path::Path>,
) -> ExitCode {
    let roster = match Roster::load(roster_path) {
        Ok(roster) => roster,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let (placements, catalog) = match load_stores(config) {
        Ok(stores) => stores,
        Err(code) => return code,
    };
    let mut cache = match open_cache(config) {
        Ok(cache) => cache,
        Err(code) => return code,
    };
    // One-shot startup sweep; expiry is otherwise lazy on get
    cache.cleanup_old_entries();

    let compositor = Compositor::new(&config.assets, &placements, &catalog);
    let report = render_thumbnails(&roster, &compositor, &mut cache);

    if let Err(e) = cache.persist() {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }

    if let Some(manifest_path) = manifest {
        let mut entries: BTreeMap<String, String> = BTreeMap::new();
        for student in &roster.students {
            if let Some(entry) = cache.get(&student.id) {
                entries.insert(student.id.clone(), entry.data_url.clone());
            }
        }
        let data = match serde_json::to_string_pretty(&entries) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        };
        if let Err(e) = std::fs::write(manifest_path, data) {
            eprintln!("Error: cannot write manifest '{}': {}", manifest_path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    println!(
        "Thumbnails: {} rendered, {} reused from cache",
        report.rendered, report.reused
    );
    if !report.failed.is_empty() {
        for (id, error) in &report.failed {
            eprintln!("Error: {}: {}", id, error);
        }
        return ExitCode::from(EXIT_ERROR);
    }
    ExitCode::from(EXIT_SUCCESS)
}

fn run_cache(config: &ProjectConfig, action: &CacheAction) -> ExitCode {
    let mut cache = match open_cache(config) {
        Ok(cache) => cache,
        Err(code) => return code,
    };

    match action {
        CacheAction::Stats => {
            let stats = cache.stats();
            println!("Entries: {}", stats.entries);
            match stats.oldest {
                Some(oldest) => println!("Oldest write: {}", oldest.to_rfc3339()),
                None => println!("Oldest write: n/a"),
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        CacheAction::Cleanup => {
            let removed = cache.cleanup_old_entries();
            if let Err(e) = cache.persist() {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
            println!("Removed {} expired entries", removed);
            ExitCode::from(EXIT_SUCCESS)
        }
        CacheAction::Clear => {
            cache.clear();
            if let Err(e) = cache.persist() {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
            println!("Cache cleared");
            ExitCode::from(EXIT_SUCCESS)
        }
    }
}

fn load_stores(config: &ProjectConfig) -> Result<(PlacementStore, ItemCatalog), ExitCode> {
    let placements = PlacementStore::load(&config.placements).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_ERROR)
    })?;
    let catalog = ItemCatalog::load(&config.catalog).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_ERROR)
    })?;
    Ok((placements, catalog))
}

fn open_cache(config: &ProjectConfig) -> Result<ThumbnailCache, ExitCode> {
    ThumbnailCache::open(&config.cache.file)
        .map(|cache| cache.with_limits(config.cache.capacity, config.cache.max_age_days))
        .map_err(|e| {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        })
}
