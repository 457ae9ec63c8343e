use tracing::{debug, info, trace};

use crate::types::{PortData, PortType};

pub const PRINT_PREVIEW_MAX_CHARS: usize = 512;

/// A line of visible output produced by a node during `run`.
///
/// `value` is the full text; `value_preview` is the bounded copy used in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDebugValueEvent {
    pub node_id: String,
    pub node_type: String,
    pub value: String,
    pub value_preview: String,
    pub truncated: bool,
    pub preview_max_chars: usize,
}

impl NodeDebugValueEvent {
    pub fn new(node_id: &str, node_type: &str, text: &str) -> Self {
        let (value_preview, truncated) = truncate_preview(text, PRINT_PREVIEW_MAX_CHARS);
        Self {
            node_id: node_id.to_string(),
            node_type: node_type.to_string(),
            value: text.to_string(),
            value_preview,
            truncated,
            preview_max_chars: PRINT_PREVIEW_MAX_CHARS,
        }
    }
}

/// Trace points invoked by graph construction and the scheduler.
///
/// Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait PipelineObserver {
    fn node_created(&mut self, node_id: &str, node_type: &str) {}

    fn constant_assigned(&mut self, node_id: &str, input: &str, value: &PortData) {}

    fn output_connected(
        &mut self,
        source_id: &str,
        output: &str,
        target_id: &str,
        input: &str,
        port_type: PortType,
    ) {
    }

    fn value_delivered(&mut self, node_id: &str, input: &str, value: &PortData) {}

    fn value_sent(
        &mut self,
        source_id: &str,
        output: &str,
        target_id: &str,
        input: &str,
        value: &PortData,
    ) {
    }

    /// A value was sent on an output that has no destinations.
    fn value_dropped(&mut self, source_id: &str, output: &str, value: &PortData) {}

    fn node_ran(&mut self, node_id: &str, progressed: bool) {}

    fn node_emitted(&mut self, event: &NodeDebugValueEvent) {}

    fn pass_finished(&mut self, pass: u64, progressed: bool) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Forwards every trace point to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn node_created(&mut self, node_id: &str, node_type: &str) {
        debug!(node = node_id, kind = node_type, "node created");
    }

    fn constant_assigned(&mut self, node_id: &str, input: &str, value: &PortData) {
        debug!(
            node = node_id,
            input,
            value = %preview(value),
            "constant assigned"
        );
    }

    fn output_connected(
        &mut self,
        source_id: &str,
        output: &str,
        target_id: &str,
        input: &str,
        port_type: PortType,
    ) {
        debug!(
            source = source_id,
            output,
            target = target_id,
            input,
            port_type = %port_type,
            "output connected"
        );
    }

    fn value_delivered(&mut self, node_id: &str, input: &str, value: &PortData) {
        trace!(node = node_id, input, value = %preview(value), "value delivered");
    }

    fn value_sent(
        &mut self,
        source_id: &str,
        output: &str,
        target_id: &str,
        input: &str,
        value: &PortData,
    ) {
        trace!(
            source = source_id,
            output,
            target = target_id,
            input,
            value = %preview(value),
            "value sent"
        );
    }

    fn value_dropped(&mut self, source_id: &str, output: &str, value: &PortData) {
        debug!(
            source = source_id,
            output,
            value = %preview(value),
            "output is not connected, value dropped"
        );
    }

    fn node_ran(&mut self, node_id: &str, progressed: bool) {
        trace!(node = node_id, progressed, "node ran");
    }

    fn node_emitted(&mut self, event: &NodeDebugValueEvent) {
        info!(
            node = %event.node_id,
            kind = %event.node_type,
            truncated = event.truncated,
            "{}",
            event.value_preview
        );
    }

    fn pass_finished(&mut self, pass: u64, progressed: bool) {
        debug!(pass, progressed, "scheduler pass finished");
    }
}

pub fn format_port_data_preview(value: &PortData, max_chars: usize) -> (String, bool) {
    truncate_preview(&value.to_string(), max_chars)
}

fn preview(value: &PortData) -> String {
    format_port_data_preview(value, PRINT_PREVIEW_MAX_CHARS).0
}

fn truncate_preview(value: &str, max_chars: usize) -> (String, bool) {
    let char_count = value.chars().count();
    if char_count <= max_chars {
        return (value.to_string(), false);
    }

    (value.chars().take(max_chars).collect(), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Image;

    #[test]
    fn test_preview_formats_each_kind() {
        assert_eq!(
            format_port_data_preview(&PortData::Int(42), 16),
            ("42".to_string(), false)
        );
        assert_eq!(
            format_port_data_preview(&PortData::Bool(true), 16),
            ("true".to_string(), false)
        );

        let mut image = Image::new(800, 600).with_title("a.jpg");
        image.record_operation("enhanced");
        assert_eq!(
            format_port_data_preview(&PortData::Image(image), 128).0,
            "Image(800x600, title=a.jpg, operations=[enhanced])"
        );
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let value = PortData::Str("ééééé".to_string());
        let (preview, truncated) = format_port_data_preview(&value, 3);
        assert_eq!(preview, "ééé");
        assert!(truncated);
    }

    #[test]
    fn test_emission_event_carries_preview_limit() {
        let long = "x".repeat(PRINT_PREVIEW_MAX_CHARS + 10);
        let event = NodeDebugValueEvent::new("printer", "print", &long);
        assert!(event.truncated);
        assert_eq!(event.value_preview.len(), PRINT_PREVIEW_MAX_CHARS);
        assert_eq!(event.value, long);
        assert_eq!(event.preview_max_chars, PRINT_PREVIEW_MAX_CHARS);
    }
}
