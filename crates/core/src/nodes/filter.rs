use anyhow::{bail, Result};

use crate::descriptor::parse_template;
use crate::node::{Node, PortDefinition};
use crate::nodes::take_bool;
use crate::ports::PortSet;
use crate::types::PortType;

/// Routes `input` to `output_true` or `output_false` by `condition`.
/// The routed type comes from the template, e.g. `filter<IMAGE input>`.
pub struct FilterNode {
    value_type: PortType,
}

impl FilterNode {
    pub fn new(value_type: PortType) -> Self {
        Self { value_type }
    }

    pub fn from_template(template: &str) -> Result<Self> {
        let params = parse_template(template)?;
        match params.as_slice() {
            [param] if param.name == "input" => Ok(Self::new(param.port_type)),
            _ => bail!("filter: pass exactly one template parameter named 'input'"),
        }
    }
}

impl Node for FilterNode {
    fn node_type(&self) -> &str {
        "filter"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition::new("input", self.value_type),
            PortDefinition::new("condition", PortType::Bool),
        ]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition::new("output_true", self.value_type),
            PortDefinition::new("output_false", self.value_type),
        ]
    }

    fn run(&mut self, ports: &mut PortSet) -> Result<bool> {
        if !ports.has_pending("input") || !ports.has_pending("condition") {
            return Ok(false);
        }

        let value = ports.take_input("input")?;
        let output = if take_bool(ports, "condition")? {
            "output_true"
        } else {
            "output_false"
        };
        ports.send_output(output, value)?;
        Ok(true)
    }
}
