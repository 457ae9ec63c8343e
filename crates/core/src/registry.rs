use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};

use crate::descriptor::NodeDescriptor;
use crate::node::Node;

type NodeFactory = dyn Fn(Option<&str>) -> Result<Box<dyn Node>> + Send + Sync;

/// Maps descriptor kind names to node constructors.
///
/// A factory receives the template text from `kind<...>`, or `None` when the
/// descriptor has no template.
pub struct NodeRegistry {
    factories: HashMap<String, Box<NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, node_type: &str, factory: F)
    where
        F: Fn(Option<&str>) -> Result<Box<dyn Node>> + Send + Sync + 'static,
    {
        self.factories
            .insert(node_type.to_string(), Box::new(factory));
    }

    /// Register a kind that takes no template.
    pub fn register_plain<F>(&mut self, node_type: &str, factory: F)
    where
        F: Fn() -> Box<dyn Node> + Send + Sync + 'static,
    {
        let name = node_type.to_string();
        self.register(node_type, move |template| {
            if template.is_some() {
                bail!("node kind '{name}' does not accept a template");
            }
            Ok(factory())
        });
    }

    /// Register a kind whose port set is described by a template.
    pub fn register_templated<F>(&mut self, node_type: &str, factory: F)
    where
        F: Fn(&str) -> Result<Box<dyn Node>> + Send + Sync + 'static,
    {
        let name = node_type.to_string();
        self.register(node_type, move |template| match template {
            Some(template) => factory(template),
            None => bail!("node kind '{name}' requires a template"),
        });
    }

    pub fn create(&self, descriptor: &NodeDescriptor) -> Result<Box<dyn Node>> {
        let factory = self
            .factories
            .get(&descriptor.kind)
            .ok_or_else(|| anyhow!("unknown node type: {}", descriptor.kind))?;

        factory(descriptor.template.as_deref())
    }

    pub fn list_node_types(&self) -> Vec<&str> {
        let mut node_types: Vec<&str> = self.factories.keys().map(|v| v.as_str()).collect();
        node_types.sort_unstable();
        node_types
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register every node kind shipped with `conveyor-core`.
pub fn register_all_nodes(registry: &mut NodeRegistry) {
    use crate::nodes::counter::CounterNode;
    use crate::nodes::enhancer::EnhancerNode;
    use crate::nodes::filter::FilterNode;
    use crate::nodes::format::FormatNode;
    use crate::nodes::print::PrintNode;
    use crate::nodes::read_jpg::ReadJpgNode;
    use crate::nodes::save_jpg::SaveJpgNode;
    use crate::nodes::stack::StackNode;

    registry.register_plain("print", || Box::new(PrintNode::new()));
    registry.register_plain("counter", || Box::new(CounterNode::new()));
    registry.register_templated("format", |template| {
        Ok(Box::new(FormatNode::from_template(template)?))
    });
    registry.register_plain("read_jpg", || Box::new(ReadJpgNode::new()));
    registry.register_plain("stack", || Box::new(StackNode::new()));
    registry.register_plain("save_jpg", || Box::new(SaveJpgNode::new()));
    registry.register_plain("enhancer", || Box::new(EnhancerNode::new()));
    registry.register_templated("filter", |template| {
        Ok(Box::new(FilterNode::from_template(template)?))
    });
}

pub fn build_default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_all_nodes(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PortDefinition;
    use crate::ports::PortSet;
    use crate::types::PortType;

    struct DummyNode;

    impl Node for DummyNode {
        fn node_type(&self) -> &str {
            "dummy"
        }

        fn input_ports(&self) -> Vec<PortDefinition> {
            vec![PortDefinition::new("in", PortType::String)]
        }

        fn output_ports(&self) -> Vec<PortDefinition> {
            vec![PortDefinition::new("out", PortType::String)]
        }

        fn run(&mut self, _ports: &mut PortSet) -> Result<bool> {
            Ok(false)
        }
    }

    fn descriptor(raw: &str) -> NodeDescriptor {
        NodeDescriptor::parse(raw).expect("descriptor should parse")
    }

    #[test]
    fn test_node_registry_register_and_create() {
        let mut registry = NodeRegistry::new();
        registry.register_plain("dummy", || Box::new(DummyNode));

        let node = registry
            .create(&descriptor("dummy"))
            .expect("dummy node should be created");

        assert_eq!(node.node_type(), "dummy");
        assert_eq!(node.input_ports().len(), 1);
        assert_eq!(node.output_ports().len(), 1);
        assert_eq!(registry.list_node_types(), vec!["dummy"]);
    }

    #[test]
    fn test_node_registry_unknown_type_errors() {
        let registry = build_default_registry();

        for node_type in ["unknown", "Print", "stacker"] {
            let err = match registry.create(&descriptor(node_type)) {
                Ok(_) => panic!("unknown node type should error"),
                Err(err) => err,
            };

            assert_eq!(err.to_string(), format!("unknown node type: {node_type}"));
        }
    }

    #[test]
    fn test_plain_kind_rejects_template() {
        let registry = build_default_registry();
        let err = match registry.create(&descriptor("counter<INT x>")) {
            Ok(_) => panic!("plain kinds take no template"),
            Err(err) => err,
        };
        assert_eq!(
            err.to_string(),
            "node kind 'counter' does not accept a template"
        );
    }

    #[test]
    fn test_templated_kind_requires_template() {
        let registry = build_default_registry();
        let err = match registry.create(&descriptor("filter")) {
            Ok(_) => panic!("filter needs a template"),
            Err(err) => err,
        };
        assert_eq!(
            err.to_string(),
            "node kind 'filter' requires a template"
        );
    }

    #[test]
    fn test_register_all_nodes_expected_set() {
        let registry = build_default_registry();

        assert_eq!(
            registry.list_node_types(),
            vec![
                "counter", "enhancer", "filter", "format", "print", "read_jpg", "save_jpg",
                "stack",
            ]
        );
    }

    #[test]
    fn test_templated_factory_drives_port_types() {
        let registry = build_default_registry();
        let node = registry
            .create(&descriptor("filter<FLOAT input>"))
            .expect("filter should be created");

        let outputs = node.output_ports();
        assert!(outputs.iter().all(|port| port.port_type == PortType::Float));
        assert_eq!(node.input_ports()[0].port_type, PortType::Float);
    }
}
