use anyhow::Result;

use crate::node::{Node, PortDefinition};
use crate::nodes::take_image;
use crate::ports::PortSet;
use crate::types::{PortData, PortType};

pub const ENHANCED_MARKER: &str = "enhanced";
pub const MAX_ENHANCEMENTS: usize = 5;

/// Marks an image as enhanced, up to `MAX_ENHANCEMENTS` times, and says on
/// `can_enhance` whether another round would still change it. Pair it with a
/// `filter<IMAGE input>` whose true branch loops back here.
pub struct EnhancerNode;

impl EnhancerNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnhancerNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for EnhancerNode {
    fn node_type(&self) -> &str {
        "enhancer"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition::new("input", PortType::Image)]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition::new("output", PortType::Image),
            PortDefinition::new("can_enhance", PortType::Bool),
        ]
    }

    fn run(&mut self, ports: &mut PortSet) -> Result<bool> {
        if !ports.has_pending("input") {
            return Ok(false);
        }

        let mut image = take_image(ports, "input")?;
        let mut enhancements = image
            .operations()
            .iter()
            .filter(|op| op.as_str() == ENHANCED_MARKER)
            .count();
        if enhancements < MAX_ENHANCEMENTS {
            image.record_operation(ENHANCED_MARKER);
            enhancements += 1;
        }

        ports.send_output("output", PortData::Image(image))?;
        ports.send_output(
            "can_enhance",
            PortData::Bool(enhancements < MAX_ENHANCEMENTS),
        )?;
        Ok(true)
    }
}
