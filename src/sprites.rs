//! Sprite Catalog - Named Regions and the Draw Primitive
//!
//! Regions are loaded once per process. The draw primitive maps grid-space
//! requests (y up) onto a canvas (y down) through a scale, a rotation about an
//! origin and an optional tint.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use image::{Rgba, RgbaImage};
use log::{debug, info};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::canvas::{multiply, Canvas, WHITE};
use crate::CELL_PX;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static ASSET_READ_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_asset_read_count() -> u32 {
    ASSET_READ_COUNT.load(Ordering::SeqCst)
}

/// Name of the region substituted for unknown names.
pub const ERROR_REGION: &str = "error";

/// Shift applied to every draw so that cell (0, 0) starts at the canvas corner.
pub const SPRITE_MARGIN: f32 = CELL_PX as f32 / 2.0;

/// Startup failures. None of these are recoverable per render.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Sprite directory not found: {0}")]
    MissingDirectory(String),

    #[error("Failed to decode sprite {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Invalid content catalog: {0}")]
    InvalidCatalog(String),

    #[error("Catalog requires engine >= {0}, current is {1}")]
    EngineVersionMismatch(String, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One sprite draw, in unscaled grid-space units.
#[derive(Debug, Clone, Copy)]
pub struct DrawRequest<'a> {
    pub region: &'a str,
    /// Bottom-left corner
    pub x: f32,
    pub y: f32,
    /// Rotation pivot, relative to the bottom-left corner
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
    /// Counter-clockwise, radians
    pub rotation: f32,
    pub tint: Rgba<u8>,
    pub alpha: f32,
}

impl<'a> DrawRequest<'a> {
    /// A request centered on `(cx, cy)` that pivots about its center.
    pub fn centered(region: &'a str, cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            region,
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            origin_x: width / 2.0,
            origin_y: height / 2.0,
            width,
            height,
            rotation: 0.0,
            tint: WHITE,
            alpha: 1.0,
        }
    }

    pub fn with_origin(mut self, origin_x: f32, origin_y: f32) -> Self {
        self.origin_x = origin_x;
        self.origin_y = origin_y;
        self
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    pub fn with_tint(mut self, tint: Rgba<u8>) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }
}

/// Named bitmap regions.
pub struct SpriteCatalog {
    regions: HashMap<String, RgbaImage>,
}

impl SpriteCatalog {
    /// Build a catalog from bitmaps already in memory.
    pub fn from_regions(regions: HashMap<String, RgbaImage>) -> Self {
        let mut catalog = Self { regions };
        catalog
            .regions
            .entry(ERROR_REGION.to_string())
            .or_insert_with(error_placeholder);
        catalog
    }

    /// Load every `*.png` under `dir` (recursively) as a region named after
    /// its file stem.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        if !dir.is_dir() {
            return Err(CatalogError::MissingDirectory(dir.display().to_string()));
        }

        let start = Instant::now();
        let mut regions = HashMap::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            for entry in fs::read_dir(&current)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().map_or(true, |e| e != "png") {
                    continue;
                }
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };

                #[cfg(feature = "test-hooks")]
                ASSET_READ_COUNT.fetch_add(1, Ordering::SeqCst);

                let image = image::open(&path)
                    .map_err(|e| CatalogError::Decode {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?
                    .to_rgba8();

                if regions.insert(name.to_string(), image).is_some() {
                    debug!("Sprite {} defined more than once, keeping {}", name, path.display());
                }
            }
        }

        info!(
            "Loaded {} sprite regions from {} in {}ms",
            regions.len(),
            dir.display(),
            start.elapsed().as_millis()
        );
        Ok(Self::from_regions(regions))
    }

    /// Region by name, or the error placeholder.
    pub fn region(&self, name: &str) -> &RgbaImage {
        match self.regions.get(name) {
            Some(image) => image,
            None => {
                debug!("Missing sprite region {}, using placeholder", name);
                &self.regions[ERROR_REGION]
            }
        }
    }

    pub fn has_region(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Draw a region onto `canvas` at the given scale.
    pub fn draw(&self, canvas: &mut Canvas, request: &DrawRequest<'_>, scale: u32) {
        let sprite = self.region(request.region);
        let (sw, sh) = sprite.dimensions();
        let s = scale as f32;

        let width = request.width * s;
        let height = request.height * s;
        if width <= 0.0 || height <= 0.0 || sw == 0 || sh == 0 || request.alpha <= 0.0 {
            return;
        }

        let left = (request.x + SPRITE_MARGIN) * s;
        let top = canvas.height() as f32 - (request.y + SPRITE_MARGIN) * s - height;
        let ox = request.origin_x * s;
        let oy = request.origin_y * s;

        // y points down on the canvas, so a counter-clockwise turn in grid
        // space is a negative angle here
        let (sin, cos) = (-request.rotation).sin_cos();
        let forward = |u: f32, v: f32| {
            let (du, dv) = (u - ox, v - oy);
            (left + ox + du * cos - dv * sin, top + oy + du * sin + dv * cos)
        };

        let corners = [
            forward(0.0, 0.0),
            forward(width, 0.0),
            forward(0.0, height),
            forward(width, height),
        ];
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min).floor().max(0.0) as i64;
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).floor().max(0.0) as i64;
        let max_x = (corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max).ceil() as i64)
            .min(canvas.width() as i64);
        let max_y = (corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max).ceil() as i64)
            .min(canvas.height() as i64);

        let tinted = request.tint != WHITE;

        for py in min_y..max_y {
            for px in min_x..max_x {
                let dx = px as f32 + 0.5 - left - ox;
                let dy = py as f32 + 0.5 - top - oy;
                let u = dx * cos + dy * sin + ox;
                let v = -dx * sin + dy * cos + oy;

                if u < 0.0 || v < 0.0 || u >= width || v >= height {
                    continue;
                }

                let sx = ((u / width * sw as f32) as u32).min(sw - 1);
                let sy = ((v / height * sh as f32) as u32).min(sh - 1);
                let mut pixel = sprite.get_pixel(sx, sy).0;

                if tinted {
                    pixel = multiply(pixel, request.tint);
                }
                if request.alpha < 1.0 {
                    pixel[3] = (pixel[3] as f32 * request.alpha).round() as u8;
                }

                canvas.blend_pixel(px, py, pixel);
            }
        }
    }
}

/// Magenta cross on a transparent square.
fn error_placeholder() -> RgbaImage {
    let size = 32u32;
    let half = (size / 2) as i32;

    let mut image = RgbaImage::new(size, size);
    for dy in 0..size {
        for dx in 0..size {
            let on_x = (dx as i32 - half).abs() == (dy as i32 - half).abs();
            let on_edge = dx == 0 || dy == 0 || dx == size - 1 || dy == size - 1;
            if on_x || on_edge {
                image.put_pixel(dx, dy, Rgba([255, 0, 255, 255]));
            }
        }
    }
    image
}

/// Lazily initialised, process-wide catalog slot.
pub struct CatalogCell {
    cell: OnceCell<SpriteCatalog>,
}

impl CatalogCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Run `load` on the first call only; later calls return the stored catalog.
    pub fn get_or_load<F>(&self, load: F) -> Result<&SpriteCatalog, CatalogError>
    where
        F: FnOnce() -> Result<SpriteCatalog, CatalogError>,
    {
        if let Some(catalog) = self.cell.get() {
            debug!("Sprite catalog already initialised");
            return Ok(catalog);
        }
        self.cell.get_or_try_init(load)
    }

    pub fn get(&self) -> Option<&SpriteCatalog> {
        self.cell.get()
    }
}

impl Default for CatalogCell {
    fn default() -> Self {
        Self::new()
    }
}

static SPRITES: CatalogCell = CatalogCell::new();

/// Load the process-wide sprite catalog from `dir`.
///
/// Only the first call touches the filesystem.
pub fn bootstrap(dir: &Path) -> Result<&'static SpriteCatalog, CatalogError> {
    SPRITES.get_or_load(|| SpriteCatalog::load_dir(dir))
}

pub fn bootstrapped() -> Option<&'static SpriteCatalog> {
    SPRITES.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    fn catalog_with(name: &str, image: RgbaImage) -> SpriteCatalog {
        let mut regions = HashMap::new();
        regions.insert(name.to_string(), image);
        SpriteCatalog::from_regions(regions)
    }

    #[test]
    fn test_unknown_region_falls_back_to_error() {
        let catalog = catalog_with("wall", solid(8, 8, [1, 2, 3, 255]));

        assert!(catalog.has_region(ERROR_REGION));
        assert_eq!(catalog.region("nope"), catalog.region(ERROR_REGION));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_draw_lands_on_flipped_cell() {
        let catalog = catalog_with("wall", solid(8, 8, [200, 10, 10, 255]));
        let mut canvas = Canvas::new(16, 16).unwrap();

        // Cell (1, 0): bottom-right quarter of a 2x2 grid at scale 1
        let request = DrawRequest::centered("wall", 8.0, 0.0, 8.0, 8.0);
        catalog.draw(&mut canvas, &request, 1);

        assert_eq!(canvas.get_pixel(8, 8), Some([200, 10, 10, 255]));
        assert_eq!(canvas.get_pixel(15, 15), Some([200, 10, 10, 255]));
        assert_eq!(canvas.get_pixel(7, 15), Some([0, 0, 0, 0]));
        assert_eq!(canvas.get_pixel(8, 7), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_draw_scales_position_and_size() {
        let catalog = catalog_with("wall", solid(4, 4, [0, 200, 0, 255]));
        let mut canvas = Canvas::new(32, 32).unwrap();

        let request = DrawRequest::centered("wall", 0.0, 0.0, 8.0, 8.0);
        catalog.draw(&mut canvas, &request, 2);

        assert_eq!(canvas.get_pixel(0, 31), Some([0, 200, 0, 255]));
        assert_eq!(canvas.get_pixel(15, 16), Some([0, 200, 0, 255]));
        assert_eq!(canvas.get_pixel(16, 16), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_draw_rotates_about_origin() {
        // Left half red, right half blue
        let mut sprite = solid(2, 1, [255, 0, 0, 255]);
        sprite.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let catalog = catalog_with("arrow", sprite);
        let mut canvas = Canvas::new(8, 8).unwrap();

        let request = DrawRequest::centered("arrow", 0.0, 0.0, 8.0, 8.0)
            .with_rotation(std::f32::consts::FRAC_PI_2);
        catalog.draw(&mut canvas, &request, 1);

        // After a quarter turn counter-clockwise the blue half points up
        assert_eq!(canvas.get_pixel(4, 1), Some([0, 0, 255, 255]));
        assert_eq!(canvas.get_pixel(4, 6), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_draw_tint_and_alpha() {
        let catalog = catalog_with("center", solid(8, 8, [255, 255, 255, 255]));
        let mut canvas = Canvas::new(8, 8).unwrap();

        let request = DrawRequest::centered("center", 0.0, 0.0, 8.0, 8.0)
            .with_tint(Rgba([0xd9, 0x9d, 0x73, 255]))
            .with_alpha(0.75);
        catalog.draw(&mut canvas, &request, 1);

        assert_eq!(canvas.get_pixel(3, 3), Some([0xd9, 0x9d, 0x73, 191]));
    }

    #[test]
    fn test_catalog_cell_loads_once() {
        let cell = CatalogCell::new();
        let loads = Cell::new(0);

        let load = || {
            loads.set(loads.get() + 1);
            Ok(SpriteCatalog::from_regions(HashMap::new()))
        };

        cell.get_or_load(load).unwrap();
        cell.get_or_load(|| {
            loads.set(loads.get() + 1);
            Ok(SpriteCatalog::from_regions(HashMap::new()))
        })
        .unwrap();

        assert_eq!(loads.get(), 1);
        assert!(cell.get().is_some());
    }

    #[test]
    fn test_load_dir_missing() {
        let result = SpriteCatalog::load_dir(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(CatalogError::MissingDirectory(_))));
    }

    #[test]
    fn test_load_dir_walks_nested_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("blocks").join("distribution");
        fs::create_dir_all(&nested).unwrap();

        solid(4, 4, [9, 9, 9, 255]).save(nested.join("sorter.png")).unwrap();
        solid(4, 4, [1, 1, 1, 255]).save(dir.path().join("center.png")).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = SpriteCatalog::load_dir(dir.path()).unwrap();
        assert!(catalog.has_region("sorter"));
        assert!(catalog.has_region("center"));
        assert!(!catalog.has_region("notes"));
        assert_eq!(catalog.region("sorter").get_pixel(0, 0).0, [9, 9, 9, 255]);
    }
}
