//! Rasterizer - Three-Pass Placement Drawing
//!
//! Pass order is fixed: base regions, then connector overlays at reduced
//! alpha, then every other overlay at full opacity. Overlays from plain
//! components therefore always sit above link lines, whatever the placement
//! order.

use std::f32::consts::FRAC_PI_2;

use log::debug;

use crate::canvas::{Canvas, WHITE};
use crate::content::{ContentCatalog, ComponentType, Overlay};
use crate::layout::{Configuration, LayoutModel, PlacedComponent};
use crate::pipeline::RenderError;
use crate::sprites::{DrawRequest, SpriteCatalog};
use crate::CELL_PX;

/// Alpha applied to connector overlays.
pub const CONNECTOR_ALPHA: f32 = 0.75;

/// Pixel size of the base canvas, or `None` if it does not fit in `u32`.
pub fn canvas_size(layout: &LayoutModel, scale: u32) -> Option<(u32, u32)> {
    let width = layout.width().checked_mul(CELL_PX)?.checked_mul(scale)?;
    let height = layout.height().checked_mul(CELL_PX)?.checked_mul(scale)?;
    Some((width, height))
}

pub struct Rasterizer<'a> {
    sprites: &'a SpriteCatalog,
    content: &'a ContentCatalog,
}

impl<'a> Rasterizer<'a> {
    pub fn new(sprites: &'a SpriteCatalog, content: &'a ContentCatalog) -> Self {
        Self { sprites, content }
    }

    pub fn rasterize(&self, layout: &LayoutModel, scale: u32) -> Result<Canvas, RenderError> {
        let (width, height) = canvas_size(layout, scale).ok_or_else(|| {
            RenderError::Other(format!(
                "{}x{} schematic overflows at scale {}",
                layout.width(),
                layout.height(),
                scale
            ))
        })?;
        let mut canvas = Canvas::new(width, height)?;

        for placement in layout.placements() {
            self.draw_regions(&mut canvas, placement, scale);
        }

        let (connectors, plain): (Vec<_>, Vec<_>) = layout
            .placements()
            .iter()
            .partition(|p| self.component(p).capabilities.connector);
        debug!(
            "Drawing overlays for {} connectors and {} other placements",
            connectors.len(),
            plain.len()
        );

        for placement in connectors {
            self.draw_overlay(&mut canvas, placement, scale, CONNECTOR_ALPHA);
        }
        for placement in plain {
            self.draw_overlay(&mut canvas, placement, scale, 1.0);
        }

        Ok(canvas)
    }

    fn component(&self, placement: &PlacedComponent) -> &'a ComponentType {
        self.content.component(placement.component)
    }

    fn draw_regions(&self, canvas: &mut Canvas, placement: &PlacedComponent, scale: u32) {
        let ty = self.component(placement);
        let (cx, cy) = placement.world_center();
        let size = placement.world_size();
        let rotation = if ty.rotate { placement.rotation as f32 * FRAC_PI_2 } else { 0.0 };

        for region in &ty.regions {
            let request = DrawRequest::centered(region, cx, cy, size, size).with_rotation(rotation);
            self.sprites.draw(canvas, &request, scale);
        }
    }

    fn draw_overlay(&self, canvas: &mut Canvas, placement: &PlacedComponent, scale: u32, alpha: f32) {
        let ty = self.component(placement);
        let (cx, cy) = placement.world_center();

        match (&ty.overlay, &placement.config) {
            (Overlay::ResourceTint { region }, Some(Configuration::Resource { color, .. })) => {
                let size = placement.world_size();
                let request = DrawRequest::centered(region, cx, cy, size, size)
                    .with_tint(*color)
                    .with_alpha(alpha);
                self.sprites.draw(canvas, &request, scale);
            }
            (Overlay::Link { region, end_region, thickness }, Some(Configuration::Links(targets))) => {
                for offset in targets {
                    if offset.x == 0 && offset.y == 0 {
                        continue;
                    }
                    let dx = (offset.x as i64 * CELL_PX as i64) as f32;
                    let dy = (offset.y as i64 * CELL_PX as i64) as f32;
                    let half = thickness / 2.0;

                    let line = DrawRequest {
                        region,
                        x: cx,
                        y: cy - half,
                        origin_x: 0.0,
                        origin_y: half,
                        width: dx.hypot(dy),
                        height: *thickness,
                        rotation: dy.atan2(dx),
                        tint: WHITE,
                        alpha,
                    };
                    self.sprites.draw(canvas, &line, scale);

                    if let Some(end) = end_region {
                        let size = placement.world_size();
                        let cap = DrawRequest::centered(end, cx + dx, cy + dy, size, size).with_alpha(alpha);
                        self.sprites.draw(canvas, &cap, scale);
                    }
                }
            }
            _ => {}
        }
    }
}
