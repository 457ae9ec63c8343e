use anyhow::Result;

use crate::node::{Node, PortDefinition};
use crate::nodes::{take_image, take_str};
use crate::ports::PortSet;
use crate::types::{Image, PortData, PortType};

/// Inert writer: reports what would be saved instead of touching the disk.
pub struct SaveJpgNode;

impl SaveJpgNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SaveJpgNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for SaveJpgNode {
    fn node_type(&self) -> &str {
        "save_jpg"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition::new("filename", PortType::String),
            PortDefinition::new("image", PortType::Image),
        ]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition::new("error", PortType::String)]
    }

    fn run(&mut self, ports: &mut PortSet) -> Result<bool> {
        if !ports.has_pending("filename") || !ports.has_pending("image") {
            return Ok(false);
        }

        let filename = take_str(ports, "filename")?;
        let image = take_image(ports, "image")?;
        if filename.trim().is_empty() {
            ports.send_output("error", PortData::Str("Empty filename".to_string()))?;
            return Ok(true);
        }

        ports.emit(describe_save(&image));
        Ok(true)
    }
}

fn describe_save(image: &Image) -> String {
    format!(
        "saving image: w {}, h {}, title {}, operations {{{}}}",
        image.width,
        image.height,
        image.title.as_deref().unwrap_or("untitled"),
        image.operations().join(" AND ")
    )
}
