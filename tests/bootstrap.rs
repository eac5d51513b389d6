//! Load-Once and Call-Count Tests
//!
//! Run with `--features test-hooks`.

#![cfg(feature = "test-hooks")]

use std::collections::HashMap;

use image::{Rgba, RgbaImage};
use schemview_core::pipeline::get_raster_call_count;
use schemview_core::sprites::{bootstrap, bootstrapped, get_asset_read_count};
use schemview_core::{ContentCatalog, LayoutModel, RenderOptions, RenderPipeline, SpriteCatalog};

#[test]
fn invariant_bootstrap_loads_once() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("blocks");
    std::fs::create_dir(&nested).unwrap();

    RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]))
        .save(dir.path().join("router.png"))
        .unwrap();
    RgbaImage::from_pixel(8, 8, Rgba([4, 5, 6, 255]))
        .save(nested.join("sorter.png"))
        .unwrap();

    assert!(bootstrapped().is_none());

    let first = bootstrap(dir.path()).unwrap();
    let reads = get_asset_read_count();
    assert_eq!(reads, 2);
    assert!(first.has_region("router"));
    assert!(first.has_region("sorter"));

    // A second call, even with another directory, touches nothing
    let second = bootstrap(&dir.path().join("missing")).unwrap();
    assert_eq!(get_asset_read_count(), reads);
    assert!(std::ptr::eq(first, second));
    assert!(bootstrapped().is_some());
}

#[test]
fn invariant_metadata_only_skips_rasterizing() {
    let content = ContentCatalog::builtin().unwrap();
    let sprites = SpriteCatalog::from_regions(HashMap::new());
    let pipeline = RenderPipeline::new(&sprites, &content);
    let layout = LayoutModel::from_json(
        r#"{"width": 2, "height": 2, "placements": [{"block": "router", "x": 0, "y": 0}]}"#,
        &content,
    )
    .unwrap();

    let before = get_raster_call_count();
    let options = RenderOptions { create_image: false, ..Default::default() };
    pipeline.render(&layout, &options).unwrap();
    assert_eq!(get_raster_call_count(), before);

    pipeline.render(&layout, &RenderOptions::default()).unwrap();
    assert_eq!(get_raster_call_count(), before + 1);
}
