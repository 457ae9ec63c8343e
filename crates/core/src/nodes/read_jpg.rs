use anyhow::Result;

use crate::node::{Node, PortDefinition};
use crate::nodes::take_str;
use crate::ports::PortSet;
use crate::types::{Image, PortData, PortType};

pub const PLACEHOLDER_WIDTH: u32 = 800;
pub const PLACEHOLDER_HEIGHT: u32 = 600;

/// Inert reader: every filename yields an 800x600 image titled with it.
pub struct ReadJpgNode;

impl ReadJpgNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReadJpgNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for ReadJpgNode {
    fn node_type(&self) -> &str {
        "read_jpg"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition::new("filename", PortType::String)]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition::new("image", PortType::Image),
            PortDefinition::new("error", PortType::String),
        ]
    }

    fn run(&mut self, ports: &mut PortSet) -> Result<bool> {
        if !ports.has_pending("filename") {
            return Ok(false);
        }

        let filename = take_str(ports, "filename")?;
        if filename.trim().is_empty() {
            ports.send_output("error", PortData::Str("Empty filename".to_string()))?;
            return Ok(true);
        }

        let image = Image::new(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT).with_title(filename);
        ports.send_output("image", PortData::Image(image))?;
        Ok(true)
    }
}
