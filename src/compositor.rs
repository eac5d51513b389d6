//! Compositor - Background, Shadow, Border and Summary Panel
//!
//! Geometry lives in pure functions so the planner can size the same buffers
//! the compositor later allocates.

use image::{Rgba, RgbaImage};

use crate::canvas::Canvas;
use crate::options::RenderOptions;
use crate::pipeline::RenderError;
use crate::sprites::SpriteCatalog;

/// Region tiled behind the schematic.
pub const BACKGROUND_REGION: &str = "schematic-background";

/// Drop shadow reach in pixels; also its offset from the schematic.
pub const SHADOW_SIZE: u32 = 24;
pub const SHADOW_OPACITY: f32 = 0.75;
const BLUR_PASSES: u32 = 3;

/// Shadow canvas plus its blur scratch buffer.
pub const SHADOW_BUFFERS: u64 = 2;

pub const BORDER_STROKE: u32 = 4;
const BORDER_INSET: i64 = 2;
pub const PANEL_STROKE: u32 = 2;
const PANEL_MARGIN: i64 = 4;

// Outer canvas adjustments when a summary panel is present
const WIDE_PANEL_GAP: i64 = 5;
const WIDE_PANEL_DROP: i64 = 20;
const TALL_PANEL_GAP: i64 = 20;
const TALL_PANEL_TRIM: i64 = 10;
const TALL_PANEL_OFFSET: i64 = 25;

/// Size of the background canvas and where the schematic goes on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OuterGeometry {
    pub width: u32,
    pub height: u32,
    pub offset_x: i64,
    pub offset_y: i64,
}

pub fn outer_geometry(base_width: u32, base_height: u32, panel: Option<(u32, u32)>, padding: u32) -> OuterGeometry {
    let p = padding as i64;
    let mut width = base_width as i64 + 2 * p;
    let mut height = base_height as i64 + 2 * p;

    let (offset_x, offset_y) = match panel {
        None => (p, p),
        Some((pw, ph)) if ph <= pw => {
            let (pw, ph) = (pw as i64, ph as i64);
            width -= 2 * p;
            height -= WIDE_PANEL_DROP;
            width += pw + WIDE_PANEL_GAP;
            height += ph;
            (pw / 3, ph + WIDE_PANEL_DROP)
        }
        Some((pw, _)) => {
            width -= p;
            height -= TALL_PANEL_TRIM;
            width += pw as i64 + TALL_PANEL_GAP;
            (TALL_PANEL_OFFSET, TALL_PANEL_OFFSET)
        }
    };

    OuterGeometry {
        width: width.clamp(1, u32::MAX as i64) as u32,
        height: height.clamp(1, u32::MAX as i64) as u32,
        offset_x,
        offset_y,
    }
}

/// Dimensions of the shadow canvas for a base of the given size.
pub fn shadow_size(base_width: u32, base_height: u32) -> (u32, u32) {
    (
        base_width.saturating_add(2 * SHADOW_SIZE),
        base_height.saturating_add(2 * SHADOW_SIZE),
    )
}

/// Blurred black silhouette of `base`, padded by [`SHADOW_SIZE`] on every side.
pub fn drop_shadow(base: &Canvas) -> Result<Canvas, RenderError> {
    let (width, height) = shadow_size(base.width(), base.height());
    let mut shadow = Canvas::new(width, height)?.into_image();
    let mut scratch = Canvas::new(width, height)?.into_image();

    for (x, y, pixel) in base.as_image().enumerate_pixels() {
        let alpha = (pixel.0[3] as f32 * SHADOW_OPACITY).round() as u8;
        shadow.put_pixel(x + SHADOW_SIZE, y + SHADOW_SIZE, Rgba([0, 0, 0, alpha]));
    }

    let radius = SHADOW_SIZE / BLUR_PASSES;
    for _ in 0..BLUR_PASSES {
        blur_alpha(&shadow, &mut scratch, radius, true);
        blur_alpha(&scratch, &mut shadow, radius, false);
    }

    Ok(Canvas::from_image(shadow))
}

/// One box-blur pass over the alpha channel; pixels outside count as transparent.
fn blur_alpha(src: &RgbaImage, dst: &mut RgbaImage, radius: u32, horizontal: bool) {
    let (width, height) = src.dimensions();
    let (lines, len) = if horizontal { (height, width) } else { (width, height) };
    let window = 2 * radius + 1;
    let r = radius as i64;

    for line in 0..lines {
        let coords = |i: u32| if horizontal { (i, line) } else { (line, i) };
        let alpha_at = |i: i64| -> u32 {
            if i < 0 || i >= len as i64 {
                0
            } else {
                let (x, y) = coords(i as u32);
                src.get_pixel(x, y).0[3] as u32
            }
        };

        let mut sum: u32 = (-r..=r).map(&alpha_at).sum();
        for i in 0..len {
            let (x, y) = coords(i);
            let alpha = ((sum + window / 2) / window) as u8;
            dst.put_pixel(x, y, Rgba([0, 0, 0, alpha]));

            sum += alpha_at(i as i64 + r + 1);
            sum -= alpha_at(i as i64 - r);
        }
    }
}

/// Horizontal concatenation at the base height.
pub fn concat_horizontal(base: &Canvas, panel: &Canvas) -> Result<Canvas, RenderError> {
    let mut joined = Canvas::new(base.width().saturating_add(panel.width()), base.height())?;
    joined.draw_canvas(base, 0, 0);
    joined.draw_canvas(panel, base.width() as i64, 0);
    Ok(joined)
}

pub struct Compositor<'a> {
    sprites: &'a SpriteCatalog,
}

impl<'a> Compositor<'a> {
    pub fn new(sprites: &'a SpriteCatalog) -> Self {
        Self { sprites }
    }

    /// Merge the rasterized schematic and the optional panel into the final image.
    pub fn compose(&self, base: Canvas, panel: Option<Canvas>, options: &RenderOptions) -> Result<Canvas, RenderError> {
        if !options.draw_background {
            return match panel {
                Some(panel) => concat_horizontal(&base, &panel),
                None => Ok(base),
            };
        }
        self.with_background(&base, panel.as_ref(), options)
    }

    fn with_background(&self, base: &Canvas, panel: Option<&Canvas>, options: &RenderOptions) -> Result<Canvas, RenderError> {
        let geometry = outer_geometry(
            base.width(),
            base.height(),
            panel.map(|p| (p.width(), p.height())),
            options.background_padding,
        );
        let border = options.border_color.0;

        let shadow = drop_shadow(base)?;
        let mut outer = Canvas::new(geometry.width, geometry.height)?;

        outer.tile(self.sprites.region(BACKGROUND_REGION));
        outer.draw_canvas(
            &shadow,
            geometry.offset_x - SHADOW_SIZE as i64,
            geometry.offset_y - SHADOW_SIZE as i64,
        );
        drop(shadow);
        outer.draw_canvas(base, geometry.offset_x, geometry.offset_y);

        outer.stroke_rect(
            BORDER_INSET,
            BORDER_INSET,
            geometry.width.saturating_sub(2 * BORDER_INSET as u32),
            geometry.height.saturating_sub(2 * BORDER_INSET as u32),
            BORDER_STROKE,
            border,
        );

        if let Some(panel) = panel {
            let x = geometry.width as i64 - panel.width() as i64 - PANEL_MARGIN;
            outer.draw_canvas(panel, x, PANEL_MARGIN);
            outer.stroke_rect(
                x - 1,
                PANEL_MARGIN - 1,
                panel.width() + 2,
                panel.height() + 2,
                PANEL_STROKE,
                border,
            );
        }

        Ok(outer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sprites() -> SpriteCatalog {
        let mut regions = HashMap::new();
        regions.insert(
            BACKGROUND_REGION.to_string(),
            RgbaImage::from_pixel(4, 4, Rgba([30, 30, 30, 255])),
        );
        SpriteCatalog::from_regions(regions)
    }

    fn solid(width: u32, height: u32, color: [u8; 4]) -> Canvas {
        Canvas::from_image(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    #[test]
    fn test_geometry_without_panel() {
        let g = outer_geometry(256, 128, None, 32);
        assert_eq!(g, OuterGeometry { width: 320, height: 192, offset_x: 32, offset_y: 32 });
    }

    #[test]
    fn test_geometry_wide_panel() {
        let g = outer_geometry(256, 256, Some((80, 60)), 32);
        assert_eq!(g.width, 256 + 64 - 64 + 80 + 5);
        assert_eq!(g.height, 256 + 64 - 20 + 60);
        assert_eq!((g.offset_x, g.offset_y), (80 / 3, 60 + 20));
    }

    #[test]
    fn test_geometry_square_panel_uses_wide_branch() {
        let g = outer_geometry(100, 100, Some((40, 40)), 10);
        assert_eq!((g.width, g.height), (145, 140));
        assert_eq!((g.offset_x, g.offset_y), (13, 60));
    }

    #[test]
    fn test_geometry_tall_panel() {
        let g = outer_geometry(256, 256, Some((60, 80)), 32);
        assert_eq!(g.width, 256 + 64 - 32 + 60 + 20);
        assert_eq!(g.height, 256 + 64 - 10);
        assert_eq!((g.offset_x, g.offset_y), (25, 25));
    }

    #[test]
    fn test_no_background_passthrough() {
        let sprites = sprites();
        let compositor = Compositor::new(&sprites);
        let base = solid(16, 8, [1, 2, 3, 255]);

        let out = compositor.compose(base, None, &RenderOptions::default()).unwrap();
        assert_eq!((out.width(), out.height()), (16, 8));
        assert_eq!(out.get_pixel(0, 0), Some([1, 2, 3, 255]));
    }

    #[test]
    fn test_no_background_panel_to_the_right() {
        let sprites = sprites();
        let compositor = Compositor::new(&sprites);
        let base = solid(16, 8, [1, 2, 3, 255]);
        let panel = solid(4, 8, [9, 9, 9, 255]);

        let out = compositor.compose(base, Some(panel), &RenderOptions::default()).unwrap();
        assert_eq!((out.width(), out.height()), (20, 8));
        assert_eq!(out.get_pixel(15, 7), Some([1, 2, 3, 255]));
        assert_eq!(out.get_pixel(16, 0), Some([9, 9, 9, 255]));
    }

    #[test]
    fn test_background_layers() {
        let sprites = sprites();
        let compositor = Compositor::new(&sprites);
        let base = solid(64, 64, [200, 0, 0, 255]);
        let options = RenderOptions { draw_background: true, ..Default::default() };

        let out = compositor.compose(base, None, &options).unwrap();
        assert_eq!((out.width(), out.height()), (128, 128));

        // Border in the default color hugs the outer edge
        assert_eq!(out.get_pixel(0, 50), Some([0x45, 0x45, 0x45, 255]));
        assert_eq!(out.get_pixel(3, 50), Some([0x45, 0x45, 0x45, 255]));
        // Schematic at the padding offset
        assert_eq!(out.get_pixel(32, 32), Some([200, 0, 0, 255]));
        assert_eq!(out.get_pixel(95, 95), Some([200, 0, 0, 255]));
        // Shadow darkens the tiled background up-left of the schematic
        let shaded = out.get_pixel(30, 30).unwrap();
        assert!(shaded[0] < 30);
        // Far corner keeps the plain background
        assert_eq!(out.get_pixel(120, 8), Some([30, 30, 30, 255]));
    }

    #[test]
    fn test_background_panel_top_right() {
        let sprites = sprites();
        let compositor = Compositor::new(&sprites);
        let base = solid(64, 64, [200, 0, 0, 255]);
        let panel = solid(40, 20, [0, 0, 250, 255]);
        let options = RenderOptions {
            draw_background: true,
            border_color: crate::canvas::HexColor::rgb(0, 255, 0),
            ..Default::default()
        };

        let out = compositor.compose(base, Some(panel), &options).unwrap();
        let g = outer_geometry(64, 64, Some((40, 20)), 32);
        assert_eq!((out.width(), out.height()), (g.width, g.height));

        let panel_x = g.width - 40 - 4;
        assert_eq!(out.get_pixel(panel_x, 4), Some([0, 0, 250, 255]));
        assert_eq!(out.get_pixel(panel_x + 39, 23), Some([0, 0, 250, 255]));
        // Thin frame right outside the panel
        assert_eq!(out.get_pixel(panel_x - 1, 10), Some([0, 255, 0, 255]));
        assert_eq!(out.get_pixel(panel_x + 10, 24), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_drop_shadow_is_padded_and_soft() {
        let base = solid(10, 10, [255, 255, 255, 255]);
        let shadow = drop_shadow(&base).unwrap();

        assert_eq!((shadow.width(), shadow.height()), (58, 58));
        let center = shadow.get_pixel(29, 29).unwrap();
        assert_eq!(&center[..3], &[0, 0, 0]);
        assert!(center[3] > 0);
        assert_eq!(shadow.get_pixel(0, 0), Some([0, 0, 0, 0]));
    }
}
