//! Render Pipeline - Single Entry Point
//!
//! plan -> rasterize -> summary -> compose. A render yields a complete image
//! plus metadata, or an error; nothing in between.

use std::fs;
use std::path::Path;
use std::time::Instant;

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use log::info;
use thiserror::Error;

use crate::compositor::Compositor;
use crate::content::ContentCatalog;
use crate::layout::LayoutModel;
use crate::options::RenderOptions;
use crate::planner::{choose_scale, summary_panel};
use crate::raster::Rasterizer;
use crate::report::Metadata;
use crate::sprites::SpriteCatalog;
use crate::summary::render_summary;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static RASTER_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_raster_call_count() -> u32 {
    RASTER_CALL_COUNT.load(Ordering::SeqCst)
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid schematic: {0}")]
    InvalidSchematic(String),

    #[error("Schematic too big to render: needs {required} bytes, limit is {ceiling}. Try to reduce its size")]
    TooBig { required: u64, ceiling: u64 },

    #[error("Render failed: {0}")]
    Other(String),
}

impl From<image::ImageError> for RenderError {
    fn from(e: image::ImageError) -> Self {
        RenderError::Other(e.to_string())
    }
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        RenderError::Other(e.to_string())
    }
}

/// Composited image; opaque when a background was drawn.
#[derive(Debug, Clone)]
pub struct FinalImage {
    pixels: RgbaImage,
    opaque: bool,
}

impl FinalImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// PNG bytes, RGB when opaque and RGBA otherwise.
    ///
    /// RGBA encodes straight from the pixel buffer; the opaque path makes one
    /// RGB copy, counted by the planner.
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let (width, height) = self.pixels.dimensions();
        let mut out = Vec::new();
        let encoder = PngEncoder::new(&mut out);

        if self.opaque {
            let rgb = strip_alpha(&self.pixels)?;
            encoder.write_image(&rgb, width, height, ColorType::Rgb8)?;
        } else {
            encoder.write_image(self.pixels.as_raw(), width, height, ColorType::Rgba8)?;
        }
        Ok(out)
    }

    pub fn save_png(&self, path: &Path) -> Result<Vec<u8>, RenderError> {
        let bytes = self.encode_png()?;
        fs::write(path, &bytes)?;
        Ok(bytes)
    }
}

fn strip_alpha(pixels: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let raw = pixels.as_raw();
    let mut rgb = Vec::new();
    rgb.try_reserve_exact(raw.len() / 4 * 3)
        .map_err(|e| RenderError::Other(format!("failed to allocate RGB buffer: {}", e)))?;
    for pixel in raw.chunks_exact(4) {
        rgb.extend_from_slice(&pixel[..3]);
    }
    Ok(rgb)
}

#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// `None` when image creation was turned off
    pub image: Option<FinalImage>,
    pub metadata: Metadata,
}

/// The render pipeline - one call per schematic, nothing shared between calls
pub struct RenderPipeline<'a> {
    sprites: &'a SpriteCatalog,
    content: &'a ContentCatalog,
}

impl<'a> RenderPipeline<'a> {
    pub fn new(sprites: &'a SpriteCatalog, content: &'a ContentCatalog) -> Self {
        Self { sprites, content }
    }

    pub fn content(&self) -> &ContentCatalog {
        self.content
    }

    pub fn render(&self, layout: &LayoutModel, options: &RenderOptions) -> Result<RenderOutput, RenderError> {
        options.validate().map_err(RenderError::Other)?;

        if !options.create_image {
            return Ok(RenderOutput { image: None, metadata: Metadata::from_layout(layout, None) });
        }

        let start = Instant::now();
        let decision = choose_scale(layout, options)?;

        #[cfg(feature = "test-hooks")]
        RASTER_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let base = Rasterizer::new(self.sprites, self.content).rasterize(layout, decision.scale)?;

        let panel = match summary_panel(layout, options)? {
            Some(_) => Some(render_summary(
                layout,
                options.summary_cell_size,
                options.summary_border_cells,
                !options.draw_background,
            )?),
            None => None,
        };

        let composed = Compositor::new(self.sprites).compose(base, panel, options)?;
        let image = FinalImage {
            pixels: composed.into_image(),
            opaque: options.draw_background,
        };

        info!(
            "Rendered {} ({}x{} px) in {} ms",
            if layout.name().is_empty() { "schematic" } else { layout.name() },
            image.width(),
            image.height(),
            start.elapsed().as_millis()
        );

        Ok(RenderOutput {
            image: Some(image),
            metadata: Metadata::from_layout(layout, Some(decision.scale)),
        })
    }
}
