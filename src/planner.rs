//! Memory Budget Planner
//!
//! Picks the render scale before any pixel buffer exists. The estimate mirrors
//! the buffers the rasterizer and compositor allocate, so a feasible decision
//! means the render will not run out of memory.

use log::{debug, info};

use crate::canvas::Canvas;
use crate::compositor::{outer_geometry, shadow_size, SHADOW_BUFFERS};
use crate::layout::LayoutModel;
use crate::options::RenderOptions;
use crate::pipeline::RenderError;
use crate::raster::canvas_size;
use crate::summary::panel_size;

/// Largest scale factor; sprites are authored for it.
pub const MAX_SCALE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleDecision {
    pub scale: u32,
    pub estimated_bytes: u64,
}

/// Summary panel dimensions if the panel will be drawn for this layout.
///
/// A panel too large to address is `TooBig` before any scale is tried.
pub fn summary_panel(layout: &LayoutModel, options: &RenderOptions) -> Result<Option<(u32, u32)>, RenderError> {
    if !(options.enable_content_summary && layout.summary_eligible()) {
        return Ok(None);
    }
    panel_size(layout, options.summary_cell_size, options.summary_border_cells)
        .map(Some)
        .ok_or(RenderError::TooBig { required: u64::MAX, ceiling: options.memory_limit })
}

/// Bytes of the RGB copy made when an opaque image is encoded.
pub fn opaque_encode_bytes(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * 3
}

/// Bytes allocated by a render at `scale`, encoding included.
pub fn estimate_memory(layout: &LayoutModel, options: &RenderOptions, scale: u32) -> u64 {
    let Some((width, height)) = canvas_size(layout, scale) else {
        return u64::MAX;
    };
    let Ok(panel) = summary_panel(layout, options) else {
        return u64::MAX;
    };

    let base = Canvas::bytes_for(width, height);
    let mut total = base;

    if options.draw_background {
        let outer = outer_geometry(width, height, panel, options.background_padding);
        let (sw, sh) = shadow_size(width, height);
        total = total
            .saturating_add(Canvas::bytes_for(sw, sh).saturating_mul(SHADOW_BUFFERS))
            .saturating_add(Canvas::bytes_for(outer.width, outer.height))
            .saturating_add(opaque_encode_bytes(outer.width, outer.height));
        if let Some((pw, ph)) = panel {
            total = total.saturating_add(Canvas::bytes_for(pw, ph));
        }
    } else if let Some((pw, ph)) = panel {
        let joined = Canvas::bytes_for(width.saturating_add(pw), height);
        total = total
            .saturating_add(Canvas::bytes_for(pw, ph))
            .saturating_add(joined);
    }

    total
}

/// Largest scale in `1..=MAX_SCALE` whose estimate fits the memory limit.
pub fn choose_scale(layout: &LayoutModel, options: &RenderOptions) -> Result<ScaleDecision, RenderError> {
    let ceiling = options.memory_limit;
    let mut scale = MAX_SCALE;
    let mut estimate = estimate_memory(layout, options, scale);

    while estimate > ceiling && scale > 1 {
        debug!("Scale {} needs {} bytes, limit is {}", scale, estimate, ceiling);
        scale -= 1;
        estimate = estimate_memory(layout, options, scale);
    }

    if estimate > ceiling {
        return Err(RenderError::TooBig { required: estimate, ceiling });
    }

    info!("Will be rendering at {}:{} the size", scale, MAX_SCALE);
    Ok(ScaleDecision { scale, estimated_bytes: estimate })
}
