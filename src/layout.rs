//! Layout Model - Immutable View of a Decoded Schematic
//!
//! Built once from a decoded schematic document; aggregates are derived at
//! construction and never recomputed.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::Path;

use image::Rgba;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::content::{ComponentId, ContentCatalog};
use crate::hashing::content_hash;
use crate::pipeline::RenderError;
use crate::CELL_PX;

/// Decoded schematic as handed over by the decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchematicDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub placements: Vec<PlacementDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementDocument {
    pub block: String,
    pub x: u32,
    pub y: u32,
    #[serde(default)]
    pub rotation: u8,
    #[serde(default)]
    pub config: Option<PlacementConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlacementConfig {
    Resource(String),
    Link(GridOffset),
    /// Nodes that connect to several targets at once.
    Links(Vec<GridOffset>),
}

/// Offset in cells, relative to the configured placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridOffset {
    pub x: i32,
    pub y: i32,
}

/// Configuration after resolution against the content catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Configuration {
    Resource { name: String, color: Rgba<u8> },
    Links(Vec<GridOffset>),
}

#[derive(Debug, Clone)]
pub struct PlacedComponent {
    pub x: u32,
    pub y: u32,
    /// Quarter turns, 0-3
    pub rotation: u8,
    pub component: ComponentId,
    /// Edge length in cells
    pub size: u32,
    pub config: Option<Configuration>,
}

impl PlacedComponent {
    /// Columns covered by this placement (may extend past the grid).
    pub fn columns(&self) -> Range<i64> {
        footprint(self.x, self.size)
    }

    /// Rows covered by this placement (may extend past the grid).
    pub fn rows(&self) -> Range<i64> {
        footprint(self.y, self.size)
    }

    /// Center in unscaled grid-space units.
    pub fn world_center(&self) -> (f32, f32) {
        let offset = if self.size % 2 == 0 { CELL_PX as f32 / 2.0 } else { 0.0 };
        (
            (self.x * CELL_PX) as f32 + offset,
            (self.y * CELL_PX) as f32 + offset,
        )
    }

    pub fn world_size(&self) -> f32 {
        (self.size * CELL_PX) as f32
    }

    pub fn resource_color(&self) -> Option<Rgba<u8>> {
        match &self.config {
            Some(Configuration::Resource { color, .. }) => Some(*color),
            _ => None,
        }
    }

    /// Link offsets in configuration order, empty when not linked.
    pub fn link_targets(&self) -> &[GridOffset] {
        match &self.config {
            Some(Configuration::Links(targets)) => targets.as_slice(),
            _ => &[],
        }
    }
}

/// Odd sizes center on the placement cell, even sizes extend toward +x/+y.
fn footprint(origin: u32, size: u32) -> Range<i64> {
    let low = origin as i64 - (size as i64 - 1) / 2;
    low..low + size as i64
}

#[derive(Debug, Clone)]
pub struct LayoutModel {
    name: String,
    description: String,
    tags: BTreeMap<String, String>,
    width: u32,
    height: u32,
    placements: Vec<PlacedComponent>,
    stored_energy: f64,
    power_produced: f64,
    power_consumed: f64,
    requirements: BTreeMap<String, u64>,
    summary_eligible: bool,
    fingerprint: String,
}

impl LayoutModel {
    pub fn load(path: &Path, content: &ContentCatalog) -> Result<Self, RenderError> {
        let json = fs::read_to_string(path).map_err(|e| {
            RenderError::InvalidSchematic(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json, content)
    }

    pub fn from_json(json: &str, content: &ContentCatalog) -> Result<Self, RenderError> {
        let document: SchematicDocument = serde_json::from_str(json)
            .map_err(|e| RenderError::InvalidSchematic(format!("malformed schematic: {}", e)))?;
        Self::build(document, content)
    }

    pub fn build(document: SchematicDocument, content: &ContentCatalog) -> Result<Self, RenderError> {
        if document.placements.is_empty() {
            return Err(RenderError::InvalidSchematic("Schematic has no blocks".into()));
        }
        if document.width == 0 || document.height == 0 {
            return Err(RenderError::InvalidSchematic(format!(
                "schematic has empty dimensions {}x{}",
                document.width, document.height
            )));
        }

        let fingerprint = content_hash(&document)
            .map_err(|e| RenderError::InvalidSchematic(e.to_string()))?;

        let mut placements = Vec::with_capacity(document.placements.len());
        let mut stored_energy = 0.0;
        let mut power_produced = 0.0;
        let mut power_consumed = 0.0;
        let mut requirements: BTreeMap<String, u64> = BTreeMap::new();
        let mut summary_eligible = true;

        for (index, placement) in document.placements.iter().enumerate() {
            let id = content.lookup(&placement.block).ok_or_else(|| {
                RenderError::InvalidSchematic(format!(
                    "placement {} uses unknown block {}",
                    index, placement.block
                ))
            })?;
            if placement.x >= document.width || placement.y >= document.height {
                return Err(RenderError::InvalidSchematic(format!(
                    "placement {} at ({}, {}) lies outside {}x{}",
                    index, placement.x, placement.y, document.width, document.height
                )));
            }
            if placement.rotation > 3 {
                return Err(RenderError::InvalidSchematic(format!(
                    "placement {} has rotation {}",
                    index, placement.rotation
                )));
            }

            let ty = content.component(id);
            if let Some(capacity) = ty.capabilities.energy_capacity {
                stored_energy += capacity;
            }
            power_produced += ty.power_production;
            power_consumed += ty.power_consumption;
            summary_eligible &= ty.capabilities.summary_eligible;
            for (resource, amount) in &ty.requirements {
                *requirements.entry(resource.clone()).or_insert(0) += *amount as u64;
            }

            let config = match &placement.config {
                None => None,
                Some(PlacementConfig::Link(offset)) => Some(Configuration::Links(vec![*offset])),
                Some(PlacementConfig::Links(targets)) => Some(Configuration::Links(targets.clone())),
                Some(PlacementConfig::Resource(name)) => match content.resource(name) {
                    Some(resource) => Some(Configuration::Resource {
                        name: resource.name.clone(),
                        color: resource.color,
                    }),
                    None => {
                        warn!("Placement {} references unknown resource {}, ignoring", index, name);
                        None
                    }
                },
            };

            placements.push(PlacedComponent {
                x: placement.x,
                y: placement.y,
                rotation: placement.rotation,
                component: id,
                size: ty.size,
                config,
            });
        }

        Ok(Self {
            name: document.name,
            description: document.description,
            tags: document.tags,
            width: document.width,
            height: document.height,
            placements,
            stored_energy,
            power_produced,
            power_consumed,
            requirements,
            summary_eligible,
            fingerprint,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn placements(&self) -> &[PlacedComponent] {
        &self.placements
    }

    pub fn stored_energy(&self) -> f64 {
        self.stored_energy
    }

    pub fn power_produced(&self) -> f64 {
        self.power_produced
    }

    pub fn power_consumed(&self) -> f64 {
        self.power_consumed
    }

    pub fn requirements(&self) -> &BTreeMap<String, u64> {
        &self.requirements
    }

    /// True only when every placement's type may appear in the summary panel.
    pub fn summary_eligible(&self) -> bool {
        self.summary_eligible
    }

    /// SHA-256 of the canonical JSON of the source document.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}
