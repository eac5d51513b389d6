//! Render Reports - Metadata and Preview Records

use std::collections::BTreeMap;
use std::fmt::Write;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hashing::sha256_hex;
use crate::layout::LayoutModel;

/// What a render says about its schematic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub placement_count: usize,
    pub power_produced: f64,
    pub power_consumed: f64,
    pub stored_energy: f64,
    pub width: u32,
    pub height: u32,
    pub chosen_scale: Option<u32>,
    pub requirements: BTreeMap<String, u64>,
}

impl Metadata {
    pub fn from_layout(layout: &LayoutModel, chosen_scale: Option<u32>) -> Self {
        Self {
            name: layout.name().to_string(),
            description: layout.description().to_string(),
            placement_count: layout.placements().len(),
            power_produced: layout.power_produced(),
            power_consumed: layout.power_consumed(),
            stored_energy: layout.stored_energy(),
            width: layout.width(),
            height: layout.height(),
            chosen_scale,
            requirements: layout.requirements().clone(),
        }
    }

    /// Human readable listing, every line starting with `prefix`.
    pub fn to_text(&self, prefix: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}name: {}", prefix, self.name);
        let _ = writeln!(out, "{}description: {}", prefix, self.description);
        let _ = writeln!(out, "{}size: {}x{}", prefix, self.width, self.height);
        let _ = writeln!(out, "{}blocks: {}", prefix, self.placement_count);
        let _ = writeln!(out, "{}power produced: {}", prefix, self.power_produced);
        let _ = writeln!(out, "{}power consumed: {}", prefix, self.power_consumed);
        let _ = writeln!(out, "{}stored energy: {}", prefix, self.stored_energy);
        if let Some(scale) = self.chosen_scale {
            let _ = writeln!(out, "{}scale: {}", prefix, scale);
        }
        let _ = writeln!(out, "{}requirements:", prefix);
        for (resource, amount) in &self.requirements {
            let _ = writeln!(out, "{}  {}: {}", prefix, resource, amount);
        }
        out
    }
}

/// One entry of the JSON data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    #[serde(flatten)]
    pub metadata: Metadata,
    pub layout_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_base64: Option<String>,
    pub rendered_at: DateTime<Utc>,
}

impl RenderReport {
    pub fn new(layout: &LayoutModel, metadata: Metadata) -> Self {
        Self {
            metadata,
            layout_hash: layout.fingerprint().to_string(),
            preview_path: None,
            preview_sha256: None,
            preview_base64: None,
            rendered_at: Utc::now(),
        }
    }

    /// Record a written preview; `embed` also inlines the PNG bytes.
    pub fn with_preview(mut self, path: &str, png: &[u8], embed: bool) -> Self {
        self.preview_path = Some(path.to_string());
        self.preview_sha256 = Some(sha256_hex(png));
        if embed {
            self.preview_base64 = Some(base64::engine::general_purpose::STANDARD.encode(png));
        }
        self
    }
}
