//! Content Summary - Positional Resource Legend
//!
//! One colored square per cell that routes a resource. This is a legend of
//! where resources are configured, not a second rendering of the blocks.

use image::Rgba;

use crate::canvas::Canvas;
use crate::layout::LayoutModel;
use crate::pipeline::RenderError;

/// Neutral panel fill used when the panel is opaque.
pub const SUMMARY_BACKGROUND: Rgba<u8> = Rgba([0x56, 0x56, 0x66, 255]);

/// Pixel size of the panel for a layout, or `None` if it does not fit in `u32`.
pub fn panel_size(layout: &LayoutModel, cell_size: u32, border_cells: u32) -> Option<(u32, u32)> {
    let width = layout.width().checked_add(border_cells)?.checked_mul(cell_size)?;
    let height = layout.height().checked_add(border_cells)?.checked_mul(cell_size)?;
    Some((width, height))
}

/// Draw the legend panel.
///
/// Callers check [`LayoutModel::summary_eligible`] first; an ineligible
/// layout gets no panel at all.
pub fn render_summary(
    layout: &LayoutModel,
    cell_size: u32,
    border_cells: u32,
    transparent: bool,
) -> Result<Canvas, RenderError> {
    let (width, height) = panel_size(layout, cell_size, border_cells).ok_or_else(|| {
        RenderError::Other(format!(
            "summary panel for {}x{} overflows at {} px per cell",
            layout.width(),
            layout.height(),
            cell_size
        ))
    })?;
    let mut panel = Canvas::new(width, height)?;

    if !transparent {
        panel.fill(SUMMARY_BACKGROUND);
    }

    let grid_w = layout.width() as usize;
    let grid_h = layout.height() as usize;

    // Per cell: how many placements cover it, and the last one seen
    let mut occupancy: Vec<(u32, usize)> = vec![(0, 0); grid_w * grid_h];
    for (index, placement) in layout.placements().iter().enumerate() {
        for y in placement.rows() {
            for x in placement.columns() {
                if x < 0 || y < 0 || x >= grid_w as i64 || y >= grid_h as i64 {
                    continue;
                }
                let slot = &mut occupancy[y as usize * grid_w + x as usize];
                slot.0 += 1;
                slot.1 = index;
            }
        }
    }

    let margin = (border_cells / 2) as i64;
    let cell = cell_size as i64;

    for y in 0..grid_h {
        for x in 0..grid_w {
            let (count, index) = occupancy[y * grid_w + x];
            if count != 1 {
                continue;
            }
            let Some(color) = layout.placements()[index].resource_color() else {
                continue;
            };

            let px = (x as i64 + margin) * cell;
            let py = height as i64 - cell - (y as i64 + margin) * cell;
            panel.fill_rect(px, py, cell_size, cell_size, color);
        }
    }

    Ok(panel)
}
