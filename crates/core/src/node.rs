use anyhow::Result;

use crate::ports::PortSet;
use crate::types::PortType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDefinition {
    pub name: String,
    pub port_type: PortType,
}

impl PortDefinition {
    pub fn new(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
        }
    }
}

/// Core node trait that all nodes implement.
///
/// The port layout is fixed at construction. `run` performs at most one unit
/// of work and reports whether anything happened; a node blocked on missing
/// input returns `Ok(false)` without touching its ports or state.
pub trait Node: Send {
    fn node_type(&self) -> &str;
    fn input_ports(&self) -> Vec<PortDefinition>;
    fn output_ports(&self) -> Vec<PortDefinition>;
    fn run(&mut self, ports: &mut PortSet) -> Result<bool>;
}
