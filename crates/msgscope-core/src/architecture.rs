//! Architecture-level endpoints messages flow between.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A port of the instrumented system, as resolved from a numeric port id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub id: u32,
    pub name: String,
    /// Id of the component (bridge) owning this port.
    pub component: u32,
}

/// A component (bridge) of the instrumented system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    pub id: u32,
    pub name: String,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// Maps raw port ids found in log records to architecture descriptors.
///
/// Lookups are pure. Implementations are expected to know every id a correct
/// instrumented system emits, so `None` means the record is bad rather than
/// the architecture being incomplete.
pub trait ArchitectureLookup: Send + Sync {
    /// Resolves a numeric port id.
    fn port(&self, id: u32) -> Option<Port>;

    /// Resolves the component owning `port`.
    fn bridge(&self, port: &Port) -> Option<Component>;
}
