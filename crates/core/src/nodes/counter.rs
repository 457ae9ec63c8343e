use anyhow::Result;

use crate::node::{Node, PortDefinition};
use crate::nodes::take_int;
use crate::ports::PortSet;
use crate::types::{PortData, PortType};

/// One-shot range source: once `min` and `max` are both available, sends
/// every integer in `min..max` on `index` and never runs again.
pub struct CounterNode {
    done: bool,
}

impl CounterNode {
    pub fn new() -> Self {
        Self { done: false }
    }
}

impl Default for CounterNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for CounterNode {
    fn node_type(&self) -> &str {
        "counter"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition::new("min", PortType::Int),
            PortDefinition::new("max", PortType::Int),
        ]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition::new("index", PortType::Int)]
    }

    fn run(&mut self, ports: &mut PortSet) -> Result<bool> {
        if self.done || !ports.has_pending("min") || !ports.has_pending("max") {
            return Ok(false);
        }

        let min = take_int(ports, "min")?;
        let max = take_int(ports, "max")?;
        for index in min..max {
            ports.send_output("index", PortData::Int(index))?;
        }

        self.done = true;
        Ok(true)
    }
}
