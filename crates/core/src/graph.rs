use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use petgraph::algo::is_cyclic_directed;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::info;

use crate::config::PipelineConfig;
use crate::debug_event::{NodeDebugValueEvent, PipelineObserver};
use crate::descriptor::NodeDescriptor;
use crate::node::Node;
use crate::ports::{PortSet, SentValue};
use crate::registry::NodeRegistry;
use crate::types::{PortData, PortType};

/// A node instance together with the ports it owns.
pub struct PipelineNode {
    pub id: String,
    pub node_type: String,
    node: Box<dyn Node>,
    ports: PortSet,
}

impl PipelineNode {
    pub fn ports(&self) -> &PortSet {
        &self.ports
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConnection {
    pub source_port: String,
    pub target_port: String,
    pub port_type: PortType,
}

/// Owns every node and the wiring between them.
///
/// Node iteration order is insertion order. Outgoing edges of one output are
/// visited in the order they were connected.
pub struct PipelineGraph {
    graph: StableDiGraph<PipelineNode, PortConnection>,
    node_ids: IndexMap<String, NodeIndex>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            node_ids: IndexMap::new(),
        }
    }

    /// Build a complete graph from a parsed pipeline description.
    ///
    /// Nodes are created first, then constants are assigned, then links are
    /// wired in declaration order. Any failure discards the whole graph.
    pub fn from_config(
        config: &PipelineConfig,
        registry: &NodeRegistry,
        observer: &mut dyn PipelineObserver,
    ) -> Result<Self> {
        let mut graph = Self::new();

        for (id, raw_descriptor) in &config.nodes {
            let descriptor = NodeDescriptor::parse(raw_descriptor)
                .with_context(|| format!("invalid descriptor for node '{id}'"))?;
            let node = registry.create(&descriptor).with_context(|| {
                format!("failed to build node '{id}' of kind '{descriptor}'")
            })?;
            graph.add_node(id, node, observer)?;
        }

        for (endpoint, literal) in &config.constants {
            let (node_id, input) = parse_endpoint(endpoint)?;

            let value = PortData::from_json_literal(literal)
                .with_context(|| format!("invalid constant for '{endpoint}'"))?;
            graph
                .assign_constant(node_id, input, value, observer)
                .with_context(|| format!("failed to assign constant to '{endpoint}'"))?;
        }

        for (source, targets) in &config.links {
            let (source_id, output) = parse_endpoint(source)?;
            for target in targets.iter() {
                let (target_id, input) = parse_endpoint(target)?;
                graph
                    .connect_output(source_id, output, target_id, input, observer)
                    .with_context(|| format!("failed to connect '{source}' -> '{target}'"))?;
            }
        }

        info!(
            nodes = graph.node_count(),
            connections = graph.graph.edge_count(),
            cyclic = graph.has_cycle(),
            "pipeline graph built"
        );

        Ok(graph)
    }

    pub fn add_node(
        &mut self,
        id: &str,
        node: Box<dyn Node>,
        observer: &mut dyn PipelineObserver,
    ) -> Result<NodeIndex> {
        if self.node_ids.contains_key(id) {
            bail!("duplicate node id: {id}");
        }

        let ports = PortSet::from_definitions(&node.input_ports(), &node.output_ports())
            .with_context(|| format!("node '{id}' declares an invalid port set"))?;
        let node_type = node.node_type().to_string();
        observer.node_created(id, &node_type);

        let index = self.graph.add_node(PipelineNode {
            id: id.to_string(),
            node_type,
            node,
            ports,
        });
        self.node_ids.insert(id.to_string(), index);
        Ok(index)
    }

    /// Push a value onto a queued input of the named node.
    pub fn deliver(
        &mut self,
        node_id: &str,
        input: &str,
        value: PortData,
        observer: &mut dyn PipelineObserver,
    ) -> Result<()> {
        let index = self.index_of(node_id)?;
        self.deliver_at(index, input, value, observer)
    }

    pub fn assign_constant(
        &mut self,
        node_id: &str,
        input: &str,
        value: PortData,
        observer: &mut dyn PipelineObserver,
    ) -> Result<()> {
        let index = self.index_of(node_id)?;
        let connected = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .any(|edge| edge.weight().target_port == input);
        if connected {
            bail!("input '{node_id}.{input}' is already a connection target");
        }

        let node = &mut self.graph[index];
        node.ports.assign_constant(input, value.clone())?;
        observer.constant_assigned(node_id, input, &value);
        Ok(())
    }

    /// Bind `source.output` to the queued input `target.input`.
    ///
    /// The declared output type must equal the declared input type.
    pub fn connect_output(
        &mut self,
        source_id: &str,
        output: &str,
        target_id: &str,
        input: &str,
        observer: &mut dyn PipelineObserver,
    ) -> Result<()> {
        let source_idx = self
            .node_ids
            .get(source_id)
            .copied()
            .ok_or_else(|| anyhow!("unknown source node id: {source_id}"))?;
        let target_idx = self
            .node_ids
            .get(target_id)
            .copied()
            .ok_or_else(|| anyhow!("unknown target node id: {target_id}"))?;

        let output_type = self.graph[source_idx]
            .ports
            .output_type(output)
            .ok_or_else(|| anyhow!("node '{source_id}' has no output port '{output}'"))?;
        let target_port = self.graph[target_idx]
            .ports
            .input(input)
            .ok_or_else(|| anyhow!("node '{target_id}' has no input port '{input}'"))?;

        if target_port.is_constant() {
            bail!("input '{target_id}.{input}' is a constant");
        }

        if !output_type.is_compatible(&target_port.port_type) {
            bail!(
                "type mismatch: '{source_id}.{output}' ({output_type}) -> '{target_id}.{input}' ({})",
                target_port.port_type
            );
        }

        self.graph.add_edge(
            source_idx,
            target_idx,
            PortConnection {
                source_port: output.to_string(),
                target_port: input.to_string(),
                port_type: output_type,
            },
        );
        observer.output_connected(source_id, output, target_id, input, output_type);
        Ok(())
    }

    /// Run one node once and fan out everything it sent.
    pub fn run_node(
        &mut self,
        index: NodeIndex,
        observer: &mut dyn PipelineObserver,
    ) -> Result<bool> {
        let entry = self
            .graph
            .node_weight_mut(index)
            .ok_or_else(|| anyhow!("node index {} is not in the graph", index.index()))?;
        let PipelineNode {
            id,
            node_type,
            node,
            ports,
        } = entry;

        let progressed = node
            .run(ports)
            .with_context(|| format!("failed to run node '{id}'"))?;
        let outbox = ports.take_outbox();
        let emissions = ports.take_emissions();
        let source_id = id.clone();

        for text in emissions {
            observer.node_emitted(&NodeDebugValueEvent::new(&source_id, node_type, &text));
        }
        observer.node_ran(&source_id, progressed);

        for sent in outbox {
            self.fan_out(index, &source_id, sent, observer)?;
        }

        Ok(progressed)
    }

    pub fn node_order(&self) -> Vec<NodeIndex> {
        self.node_ids.values().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub fn node(&self, id: &str) -> Option<&PipelineNode> {
        self.node_ids.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Destinations of one output in connection order.
    pub fn connections_from(&self, node_id: &str, output: &str) -> Vec<(String, String)> {
        let Some(index) = self.node_ids.get(node_id).copied() else {
            return Vec::new();
        };

        self.destinations(index, output)
            .into_iter()
            .map(|(target, input)| (self.graph[target].id.clone(), input))
            .collect()
    }

    fn destinations(&self, index: NodeIndex, output: &str) -> Vec<(NodeIndex, String)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .filter(|edge| edge.weight().source_port == output)
            .map(|edge| (edge.id(), edge.target(), edge.weight().target_port.clone()))
            .collect();
        edges.sort_by_key(|(edge_id, _, _)| *edge_id);
        edges
            .into_iter()
            .map(|(_, target, input)| (target, input))
            .collect()
    }

    fn fan_out(
        &mut self,
        source: NodeIndex,
        source_id: &str,
        sent: SentValue,
        observer: &mut dyn PipelineObserver,
    ) -> Result<()> {
        let destinations = self.destinations(source, &sent.output);
        if destinations.is_empty() {
            observer.value_dropped(source_id, &sent.output, &sent.value);
            return Ok(());
        }

        for (target, input) in destinations {
            let copy = sent.value.clone();
            observer.value_sent(source_id, &sent.output, &self.graph[target].id, &input, &copy);
            self.deliver_at(target, &input, copy, observer)
                .with_context(|| {
                    format!("failed to forward '{source_id}.{}'", sent.output)
                })?;
        }

        Ok(())
    }

    fn deliver_at(
        &mut self,
        index: NodeIndex,
        input: &str,
        value: PortData,
        observer: &mut dyn PipelineObserver,
    ) -> Result<()> {
        let node = &mut self.graph[index];
        let traced = value.clone();
        node.ports.deliver(input, value)?;
        observer.value_delivered(&node.id, input, &traced);
        Ok(())
    }

    fn index_of(&self, node_id: &str) -> Result<NodeIndex> {
        self.node_ids
            .get(node_id)
            .copied()
            .ok_or_else(|| anyhow!("unknown node id: {node_id}"))
    }
}

impl Default for PipelineGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `"node.port"` into its two halves.
pub fn parse_endpoint(raw: &str) -> Result<(&str, &str)> {
    let raw = raw.trim();
    match raw.split_once('.') {
        Some((node, port)) if !node.is_empty() && !port.is_empty() && !port.contains('.') => {
            Ok((node, port))
        }
        _ => bail!("malformed endpoint '{raw}', expected 'node.port'"),
    }
}
