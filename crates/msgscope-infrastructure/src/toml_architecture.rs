//! Architecture lookup backed by a TOML description of the instrumented system.
//!
//! ```toml
//! [[component]]
//! id = 0
//! name = "temp_sensor"
//! ports = [{ id = 0, name = "current_temp" }]
//!
//! [[component]]
//! id = 1
//! name = "thermostat"
//! ports = [{ id = 1, name = "current_temp" }, { id = 2, name = "set_point" }]
//! ```

use msgscope_core::architecture::{ArchitectureLookup, Component, Port};
use msgscope_core::error::{Result, ScopeError};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
struct ArchitectureFile {
    #[serde(rename = "component", default)]
    components: Vec<ComponentEntry>,
}

#[derive(Debug, Deserialize)]
struct ComponentEntry {
    id: u32,
    name: String,
    #[serde(default)]
    ports: Vec<PortEntry>,
}

#[derive(Debug, Deserialize)]
struct PortEntry {
    id: u32,
    name: String,
}

/// A fixed, in-memory architecture.
#[derive(Debug, Clone, Default)]
pub struct StaticArchitecture {
    ports: HashMap<u32, Port>,
    components: HashMap<u32, Component>,
}

impl StaticArchitecture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an architecture description from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScopeError::config(format!(
                "Failed to read architecture file at {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ArchitectureFile = toml::from_str(content)?;

        let mut architecture = Self::new();
        for component in file.components {
            let ports: Vec<(u32, &str)> = component
                .ports
                .iter()
                .map(|p| (p.id, p.name.as_str()))
                .collect();
            architecture.add_component(component.id, &component.name, &ports)?;
        }
        Ok(architecture)
    }

    /// Registers a component and its ports.
    ///
    /// # Errors
    ///
    /// Returns a config error if the component id or any port id is already
    /// registered.
    pub fn add_component(&mut self, id: u32, name: &str, ports: &[(u32, &str)]) -> Result<()> {
        if self.components.contains_key(&id) {
            return Err(ScopeError::config(format!("duplicate component id {}", id)));
        }
        for (port_id, _) in ports {
            if self.ports.contains_key(port_id) {
                return Err(ScopeError::config(format!("duplicate port id {}", port_id)));
            }
        }

        self.components.insert(
            id,
            Component {
                id,
                name: name.to_string(),
            },
        );
        for (port_id, port_name) in ports {
            self.ports.insert(
                *port_id,
                Port {
                    id: *port_id,
                    name: port_name.to_string(),
                    component: id,
                },
            );
        }
        Ok(())
    }

    /// Builder-style [`add_component`](Self::add_component).
    pub fn with_component(mut self, id: u32, name: &str, ports: &[(u32, &str)]) -> Result<Self> {
        self.add_component(id, name, ports)?;
        Ok(self)
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

impl ArchitectureLookup for StaticArchitecture {
    fn port(&self, id: u32) -> Option<Port> {
        self.ports.get(&id).cloned()
    }

    fn bridge(&self, port: &Port) -> Option<Component> {
        self.components.get(&port.component).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [[component]]
        id = 0
        name = "temp_sensor"
        ports = [{ id = 0, name = "current_temp" }]

        [[component]]
        id = 1
        name = "thermostat"
        ports = [{ id = 1, name = "current_temp" }, { id = 2, name = "set_point" }]
    "#;

    #[test]
    fn test_parse_and_resolve() {
        let architecture = StaticArchitecture::from_toml_str(SAMPLE).unwrap();
        assert_eq!(architecture.component_count(), 2);
        assert_eq!(architecture.port_count(), 3);

        let port = architecture.port(2).unwrap();
        assert_eq!(port.name, "set_point");
        let bridge = architecture.bridge(&port).unwrap();
        assert_eq!(bridge.name, "thermostat");

        assert!(architecture.port(99).is_none());
    }

    #[test]
    fn test_duplicate_port_ids_are_rejected() {
        let err = StaticArchitecture::new()
            .with_component(0, "a", &[(0, "out")])
            .unwrap()
            .with_component(1, "b", &[(0, "in")])
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_empty_description_is_valid() {
        let architecture = StaticArchitecture::from_toml_str("").unwrap();
        assert_eq!(architecture.port_count(), 0);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let architecture = StaticArchitecture::load(file.path()).unwrap();
        assert_eq!(architecture.port(0).unwrap().component, 0);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = StaticArchitecture::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.is_config());
    }
}
