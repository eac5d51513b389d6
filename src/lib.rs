//! SchemView Core - Headless Schematic Preview Renderer
//!
//! # Render Rules
//! 1. The Canvas Is Explicit
//! 2. Plan Before Allocating
//! 3. Connectors Draw Beneath Overlays
//! 4. The Summary Is All Or Nothing
//! 5. A Render Completes Or Yields Nothing

pub mod canvas;
pub mod sprites;
pub mod content;
pub mod layout;
pub mod options;
pub mod planner;
pub mod raster;
pub mod summary;
pub mod compositor;
pub mod hashing;
pub mod report;
pub mod pipeline;

pub use canvas::{Canvas, HexColor};
pub use sprites::{bootstrap, CatalogError, DrawRequest, SpriteCatalog};
pub use content::{Capabilities, ComponentType, ContentCatalog, Overlay};
pub use layout::{LayoutModel, PlacedComponent, SchematicDocument};
pub use options::RenderOptions;
pub use planner::{choose_scale, estimate_memory, ScaleDecision, MAX_SCALE};
pub use raster::Rasterizer;
pub use summary::render_summary;
pub use compositor::{outer_geometry, Compositor, OuterGeometry};
pub use report::{Metadata, RenderReport};
pub use pipeline::{FinalImage, RenderError, RenderOutput, RenderPipeline};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Edge length of one grid cell in unscaled pixels.
pub const CELL_PX: u32 = 8;
