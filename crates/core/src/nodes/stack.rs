use anyhow::Result;
use tracing::debug;

use crate::node::{Node, PortDefinition};
use crate::nodes::{take_image, take_int, take_str};
use crate::ports::PortSet;
use crate::types::{Image, PortData, PortType};

pub const MEDIAN: &str = "median";

enum StackState {
    Idle,
    Accumulating {
        count: usize,
        method: String,
        images: Vec<Image>,
    },
}

/// Collects `count` images and combines them into one.
///
/// `count` and `method` are read once per batch, when the first image of the
/// batch arrives. Every finished batch, successful or not, resets the node so
/// the next image starts a fresh one.
pub struct StackNode {
    state: StackState,
}

impl StackNode {
    pub fn new() -> Self {
        Self {
            state: StackState::Idle,
        }
    }

    fn finish(ports: &mut PortSet, method: &str, images: Vec<Image>) -> Result<()> {
        let (width, height) = match images.first() {
            Some(first) => (first.width, first.height),
            None => return Ok(()),
        };

        if images
            .iter()
            .any(|image| image.width != width || image.height != height)
        {
            ports.send_output("error", PortData::Str("Image size mismatch".to_string()))?;
            return Ok(());
        }

        if method != MEDIAN {
            ports.send_output(
                "error",
                PortData::Str(format!("Unsupported method: {method}")),
            )?;
            return Ok(());
        }

        let titles: Vec<&str> = images
            .iter()
            .map(|image| image.title.as_deref().unwrap_or("untitled"))
            .collect();
        let mut combined = Image::new(width, height);
        combined.record_operation(format!("{MEDIAN} [{}]", titles.join(", ")));

        ports.send_output("output", PortData::Image(combined))?;
        Ok(())
    }
}

impl Default for StackNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for StackNode {
    fn node_type(&self) -> &str {
        "stack"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition::new("input", PortType::Image),
            PortDefinition::new("count", PortType::Int),
            PortDefinition::new("method", PortType::String),
        ]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition::new("output", PortType::Image),
            PortDefinition::new("error", PortType::String),
        ]
    }

    fn run(&mut self, ports: &mut PortSet) -> Result<bool> {
        if !ports.has_pending("input") {
            return Ok(false);
        }

        if let StackState::Idle = self.state {
            if !ports.has_pending("count") || !ports.has_pending("method") {
                return Ok(false);
            }

            let count = take_int(ports, "count")?;
            let method = take_str(ports, "method")?;
            if count < 1 {
                take_image(ports, "input")?;
                ports.send_output("error", PortData::Str(format!("Invalid count: {count}")))?;
                return Ok(true);
            }

            debug!(count, method = %method, "stack batch started");
            self.state = StackState::Accumulating {
                count: count as usize,
                method,
                images: Vec::new(),
            };
        }

        let image = take_image(ports, "input")?;
        let ready = match &mut self.state {
            StackState::Accumulating { count, images, .. } => {
                images.push(image);
                images.len() >= *count
            }
            StackState::Idle => false,
        };

        if ready {
            if let StackState::Accumulating { method, images, .. } =
                std::mem::replace(&mut self.state, StackState::Idle)
            {
                Self::finish(ports, &method, images)?;
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_ports(node: &StackNode, count: i64, method: &str) -> PortSet {
        let mut ports = PortSet::from_definitions(&node.input_ports(), &node.output_ports()).unwrap();
        ports.assign_constant("count", PortData::Int(count)).unwrap();
        ports
            .assign_constant("method", PortData::Str(method.to_string()))
            .unwrap();
        ports
    }

    fn titled(title: &str) -> PortData {
        PortData::Image(Image::new(800, 600).with_title(title))
    }

    fn run_until_idle(node: &mut StackNode, ports: &mut PortSet) -> usize {
        let mut runs = 0;
        while node.run(ports).unwrap() {
            runs += 1;
        }
        runs
    }

    #[test]
    fn test_median_of_three() {
        let mut node = StackNode::new();
        let mut ports = stack_ports(&node, 3, "median");
        for title in ["a", "b", "c"] {
            ports.deliver("input", titled(title)).unwrap();
        }

        assert_eq!(run_until_idle(&mut node, &mut ports), 3);
        let sent = ports.take_outbox();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].output, "output");

        let mut expected = Image::new(800, 600);
        expected.record_operation("median [a, b, c]");
        assert_eq!(sent[0].value, PortData::Image(expected));
        assert!(matches!(node.state, StackState::Idle));
    }

    #[test]
    fn test_partial_batch_waits() {
        let mut node = StackNode::new();
        let mut ports = stack_ports(&node, 3, "median");
        ports.deliver("input", titled("a")).unwrap();
        ports.deliver("input", titled("b")).unwrap();

        assert_eq!(run_until_idle(&mut node, &mut ports), 2);
        assert!(ports.take_outbox().is_empty());

        ports.deliver("input", titled("c")).unwrap();
        assert!(node.run(&mut ports).unwrap());
        assert_eq!(ports.take_outbox().len(), 1);
    }

    #[test]
    fn test_size_mismatch_aborts_batch() {
        let mut node = StackNode::new();
        let mut ports = stack_ports(&node, 2, "median");
        ports.deliver("input", titled("a")).unwrap();
        ports
            .deliver("input", PortData::Image(Image::new(640, 480)))
            .unwrap();

        run_until_idle(&mut node, &mut ports);
        let sent = ports.take_outbox();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].output, "error");
        assert_eq!(sent[0].value, PortData::Str("Image size mismatch".to_string()));
        assert!(matches!(node.state, StackState::Idle));
    }

    #[test]
    fn test_unsupported_method() {
        let mut node = StackNode::new();
        let mut ports = stack_ports(&node, 1, "mean");
        ports.deliver("input", titled("a")).unwrap();

        run_until_idle(&mut node, &mut ports);
        let sent = ports.take_outbox();
        assert_eq!(
            sent[0].value,
            PortData::Str("Unsupported method: mean".to_string())
        );
    }

    #[test]
    fn test_invalid_count_drops_image() {
        let mut node = StackNode::new();
        let mut ports = stack_ports(&node, 0, "median");
        ports.deliver("input", titled("a")).unwrap();

        assert!(node.run(&mut ports).unwrap());
        assert!(!ports.has_pending("input"));
        let sent = ports.take_outbox();
        assert_eq!(sent[0].value, PortData::Str("Invalid count: 0".to_string()));
        assert!(!node.run(&mut ports).unwrap());
    }

    #[test]
    fn test_blocked_without_count_consumes_nothing() {
        let mut node = StackNode::new();
        let mut ports = PortSet::from_definitions(&node.input_ports(), &node.output_ports()).unwrap();
        ports.deliver("input", titled("a")).unwrap();
        ports.deliver("count", PortData::Int(2)).unwrap();

        assert!(!node.run(&mut ports).unwrap());
        assert!(ports.has_pending("input"));
        assert!(ports.has_pending("count"));
    }

    #[test]
    fn test_untitled_images_are_listed() {
        let mut node = StackNode::new();
        let mut ports = stack_ports(&node, 2, "median");
        ports.deliver("input", titled("a")).unwrap();
        ports
            .deliver("input", PortData::Image(Image::new(800, 600)))
            .unwrap();

        run_until_idle(&mut node, &mut ports);
        match &ports.take_outbox()[0].value {
            PortData::Image(image) => assert_eq!(image.operations(), ["median [a, untitled]"]),
            other => panic!("unexpected output {other:?}"),
        }
    }
}
