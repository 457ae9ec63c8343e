use anyhow::Result;

use crate::node::{Node, PortDefinition};
use crate::nodes::take_str;
use crate::ports::PortSet;
use crate::types::PortType;

/// Prints every string it receives.
pub struct PrintNode;

impl PrintNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PrintNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for PrintNode {
    fn node_type(&self) -> &str {
        "print"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition::new("input", PortType::String)]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![]
    }

    fn run(&mut self, ports: &mut PortSet) -> Result<bool> {
        if !ports.has_pending("input") {
            return Ok(false);
        }

        let text = take_str(ports, "input")?;
        ports.emit(format!("[Printer says] {text}"));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortData;

    fn ports_for(node: &PrintNode) -> PortSet {
        PortSet::from_definitions(&node.input_ports(), &node.output_ports()).unwrap()
    }

    #[test]
    fn test_print_node_contract() {
        let node = PrintNode::new();
        assert_eq!(node.node_type(), "print");
        assert_eq!(
            node.input_ports(),
            vec![PortDefinition::new("input", PortType::String)]
        );
        assert!(node.output_ports().is_empty());
    }

    #[test]
    fn test_prints_each_queued_string_once() {
        let mut node = PrintNode::new();
        let mut ports = ports_for(&node);
        ports.deliver("input", PortData::Str("a".to_string())).unwrap();
        ports.deliver("input", PortData::Str("b".to_string())).unwrap();

        assert!(node.run(&mut ports).unwrap());
        assert!(node.run(&mut ports).unwrap());
        assert!(!node.run(&mut ports).unwrap());
        assert_eq!(
            ports.take_emissions(),
            vec!["[Printer says] a".to_string(), "[Printer says] b".to_string()]
        );
    }

    #[test]
    fn test_blocked_print_has_no_side_effects() {
        let mut node = PrintNode::new();
        let mut ports = ports_for(&node);

        for _ in 0..3 {
            assert!(!node.run(&mut ports).unwrap());
        }
        assert!(ports.take_emissions().is_empty());
    }
}
