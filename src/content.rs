//! Content Catalog - Component Capabilities and Resource Colors
//!
//! Component definitions are resolved once into capability records so that
//! the render stages never inspect type names at draw time.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::canvas::HexColor;
use crate::sprites::CatalogError;
use crate::ENGINE_VERSION;

const BUILTIN_CATALOG: &str = include_str!("../assets/content.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDocument {
    #[serde(default = "default_min_version")]
    pub engine_min_version: String,
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    #[serde(default)]
    pub components: Vec<ComponentDef>,
}

fn default_min_version() -> String { "1.0.0".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDef {
    pub name: String,
    pub color: HexColor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDef {
    pub name: String,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default)]
    pub rotate: bool,
    /// Base sprite layers, bottom first. Defaults to the component name.
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub overlay: Overlay,
    #[serde(default)]
    pub connector: bool,
    #[serde(default)]
    pub energy_capacity: Option<f64>,
    #[serde(default)]
    pub power_production: f64,
    #[serde(default)]
    pub power_consumption: f64,
    #[serde(default)]
    pub summary_eligible: bool,
    #[serde(default)]
    pub requirements: BTreeMap<String, u32>,
}

fn default_size() -> u32 { 1 }

/// What a component draws on top of its base layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Overlay {
    #[default]
    None,
    /// Region tinted with the configured resource's color
    #[serde(rename_all = "camelCase")]
    ResourceTint { region: String },
    /// Line from the component to its configured link target
    #[serde(rename_all = "camelCase")]
    Link {
        region: String,
        #[serde(default)]
        end_region: Option<String>,
        #[serde(default = "default_link_thickness")]
        thickness: f32,
    },
}

fn default_link_thickness() -> f32 { crate::CELL_PX as f32 }

/// Index of a component type inside its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(usize);

/// Flags resolved when the catalog loads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capabilities {
    pub connector: bool,
    pub energy_capacity: Option<f64>,
    pub summary_eligible: bool,
}

#[derive(Debug, Clone)]
pub struct ComponentType {
    pub name: String,
    pub size: u32,
    pub rotate: bool,
    pub regions: Vec<String>,
    pub overlay: Overlay,
    pub capabilities: Capabilities,
    pub power_production: f64,
    pub power_consumption: f64,
    pub requirements: BTreeMap<String, u32>,
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub color: Rgba<u8>,
}

/// Component types and resources known to the renderer.
#[derive(Debug, Clone)]
pub struct ContentCatalog {
    components: Vec<ComponentType>,
    by_name: HashMap<String, ComponentId>,
    resources: HashMap<String, Resource>,
}

impl ContentCatalog {
    /// The catalog compiled into the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let document: ContentDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    pub fn from_document(document: ContentDocument) -> Result<Self, CatalogError> {
        check_engine_version(&document.engine_min_version)?;

        let mut resources = HashMap::new();
        for def in document.resources {
            let resource = Resource { name: def.name.clone(), color: def.color.0 };
            if resources.insert(def.name.clone(), resource).is_some() {
                return Err(CatalogError::InvalidCatalog(format!("duplicate resource {}", def.name)));
            }
        }

        let mut components = Vec::with_capacity(document.components.len());
        let mut by_name = HashMap::new();

        for def in document.components {
            if def.size == 0 {
                return Err(CatalogError::InvalidCatalog(format!("component {} has size 0", def.name)));
            }
            if def.energy_capacity.map_or(false, |c| c < 0.0) {
                return Err(CatalogError::InvalidCatalog(format!(
                    "component {} has negative energy capacity",
                    def.name
                )));
            }
            if let Some(unknown) = def.requirements.keys().find(|r| !resources.contains_key(*r)) {
                return Err(CatalogError::InvalidCatalog(format!(
                    "component {} requires unknown resource {}",
                    def.name, unknown
                )));
            }

            let id = ComponentId(components.len());
            if by_name.insert(def.name.clone(), id).is_some() {
                return Err(CatalogError::InvalidCatalog(format!("duplicate component {}", def.name)));
            }

            let regions = if def.regions.is_empty() {
                vec![def.name.clone()]
            } else {
                def.regions
            };

            components.push(ComponentType {
                capabilities: Capabilities {
                    connector: def.connector,
                    energy_capacity: def.energy_capacity,
                    summary_eligible: def.summary_eligible,
                },
                name: def.name,
                size: def.size,
                rotate: def.rotate,
                regions,
                overlay: def.overlay,
                power_production: def.power_production,
                power_consumption: def.power_consumption,
                requirements: def.requirements,
            });
        }

        Ok(Self { components, by_name, resources })
    }

    pub fn lookup(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    pub fn component(&self, id: ComponentId) -> &ComponentType {
        &self.components[id.0]
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn components(&self) -> impl Iterator<Item = &ComponentType> {
        self.components.iter()
    }
}

fn check_engine_version(min_version: &str) -> Result<(), CatalogError> {
    let engine_ver = semver::Version::parse(ENGINE_VERSION)
        .map_err(|_| CatalogError::InvalidCatalog("Invalid engine version".into()))?;
    let min_ver = semver::Version::parse(min_version)
        .map_err(|_| CatalogError::InvalidCatalog(format!("Invalid engineMinVersion {}", min_version)))?;

    if engine_ver < min_ver {
        return Err(CatalogError::EngineVersionMismatch(
            min_version.to_string(),
            ENGINE_VERSION.to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ContentCatalog::builtin().unwrap();

        let sorter = catalog.component(catalog.lookup("sorter").unwrap());
        assert!(sorter.capabilities.summary_eligible);
        assert!(!sorter.capabilities.connector);
        assert_eq!(sorter.regions, vec!["sorter".to_string()]);

        let bridge = catalog.component(catalog.lookup("bridge-conveyor").unwrap());
        assert!(bridge.capabilities.connector);
        assert!(matches!(bridge.overlay, Overlay::Link { .. }));

        let battery = catalog.component(catalog.lookup("battery").unwrap());
        assert_eq!(battery.capabilities.energy_capacity, Some(1000.0));

        let copper = catalog.resource("copper").unwrap();
        assert_eq!(copper.color, Rgba([0xd9, 0x9d, 0x73, 255]));
    }

    #[test]
    fn test_overlay_defaults() {
        let catalog = ContentCatalog::from_json(
            r#"{"components": [
                {"name": "bridge", "connector": true,
                 "overlay": {"kind": "link", "region": "bridge-line"}},
                {"name": "wall"}
            ]}"#,
        )
        .unwrap();

        let bridge = catalog.component(catalog.lookup("bridge").unwrap());
        assert_eq!(
            bridge.overlay,
            Overlay::Link { region: "bridge-line".into(), end_region: None, thickness: 8.0 }
        );
        let wall = catalog.component(catalog.lookup("wall").unwrap());
        assert_eq!(wall.overlay, Overlay::None);
        assert_eq!(wall.size, 1);
    }

    #[test]
    fn test_unknown_requirement_rejected() {
        let result = ContentCatalog::from_json(
            r#"{"components": [{"name": "wall", "requirements": {"unobtainium": 3}}]}"#,
        );
        assert!(matches!(result, Err(CatalogError::InvalidCatalog(_))));
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let result = ContentCatalog::from_json(
            r#"{"components": [{"name": "wall"}, {"name": "wall"}]}"#,
        );
        assert!(matches!(result, Err(CatalogError::InvalidCatalog(_))));
    }

    #[test]
    fn test_engine_version_mismatch() {
        let result = ContentCatalog::from_json(r#"{"engineMinVersion": "99.0.0"}"#);
        assert!(matches!(result, Err(CatalogError::EngineVersionMismatch(_, _))));
    }
}
