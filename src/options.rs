//! Render Options
//!
//! Every field has a default so partial option sets deserialize cleanly.

use serde::{Deserialize, Serialize};

use crate::canvas::HexColor;

/// 1 GiB
pub const DEFAULT_MEMORY_LIMIT: u64 = 1 << 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    pub draw_background: bool,
    /// Pixels between the outer edge and the schematic
    pub background_padding: u32,
    pub border_color: HexColor,
    pub create_image: bool,
    pub enable_content_summary: bool,
    /// Pixels per summary cell
    pub summary_cell_size: u32,
    /// Empty cells around the summary, split evenly between both sides
    pub summary_border_cells: u32,
    /// Bytes the render may allocate
    pub memory_limit: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            draw_background: false,
            background_padding: 32,
            border_color: HexColor::rgb(0x45, 0x45, 0x45),
            create_image: true,
            enable_content_summary: false,
            summary_cell_size: 4,
            summary_border_cells: 4,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.summary_cell_size == 0 {
            return Err("Summary cell size must be at least one pixel".into());
        }
        if self.memory_limit == 0 {
            return Err("Memory limit must be greater than zero".into());
        }
        Ok(())
    }
}
