//! Per-node port storage.
//!
//! Input ports are either queued (FIFO, each value consumed once) or bound to
//! a constant (always available, never consumed). Output ports only carry a
//! type here; their destinations are the outgoing edges of the owning graph.
//! Values sent during `run` are staged in an outbox that the graph drains and
//! fans out once the node returns.

use std::collections::VecDeque;

use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;

use crate::node::PortDefinition;
use crate::types::{PortData, PortType};

#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Queued(VecDeque<PortData>),
    Constant(PortData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputPort {
    pub port_type: PortType,
    pub mode: InputMode,
}

impl InputPort {
    pub fn is_constant(&self) -> bool {
        matches!(self.mode, InputMode::Constant(_))
    }
}

/// A value staged by `send_output`, waiting to be fanned out.
#[derive(Debug, Clone, PartialEq)]
pub struct SentValue {
    pub output: String,
    pub value: PortData,
}

#[derive(Debug, Default)]
pub struct PortSet {
    inputs: IndexMap<String, InputPort>,
    outputs: IndexMap<String, PortType>,
    outbox: Vec<SentValue>,
    emissions: Vec<String>,
}

impl PortSet {
    /// Build the ports declared by a node; every input starts out queued.
    pub fn from_definitions(inputs: &[PortDefinition], outputs: &[PortDefinition]) -> Result<Self> {
        let mut ports = Self::default();

        for def in inputs {
            let port = InputPort {
                port_type: def.port_type,
                mode: InputMode::Queued(VecDeque::new()),
            };
            if ports.inputs.insert(def.name.clone(), port).is_some() {
                bail!("duplicate input port '{}'", def.name);
            }
        }

        for def in outputs {
            if ports.outputs.insert(def.name.clone(), def.port_type).is_some() {
                bail!("duplicate output port '{}'", def.name);
            }
        }

        Ok(ports)
    }

    pub fn input(&self, name: &str) -> Option<&InputPort> {
        self.inputs.get(name)
    }

    pub fn output_type(&self, name: &str) -> Option<PortType> {
        self.outputs.get(name).copied()
    }

    /// Append a value to a queued input.
    ///
    /// Rejects unknown inputs, type mismatches and constant inputs without
    /// changing any state.
    pub fn deliver(&mut self, input: &str, value: PortData) -> Result<()> {
        let port = self
            .inputs
            .get_mut(input)
            .ok_or_else(|| anyhow!("no such input '{input}'"))?;

        if !port.port_type.accepts(&value) {
            bail!(
                "wrong type for input '{input}': expected {}, got {}",
                port.port_type,
                value.port_type()
            );
        }

        match &mut port.mode {
            InputMode::Queued(queue) => {
                queue.push_back(value);
                Ok(())
            }
            InputMode::Constant(_) => bail!("input '{input}' is a constant"),
        }
    }

    /// Bind an input to a constant, replacing whatever it held before.
    pub fn assign_constant(&mut self, input: &str, value: PortData) -> Result<()> {
        let port = self
            .inputs
            .get_mut(input)
            .ok_or_else(|| anyhow!("no such input '{input}'"))?;

        if !port.port_type.accepts(&value) {
            bail!(
                "wrong type for input '{input}': expected {}, got {}",
                port.port_type,
                value.port_type()
            );
        }

        port.mode = InputMode::Constant(value);
        Ok(())
    }

    /// Constants are always pending. Unknown inputs never are.
    pub fn has_pending(&self, input: &str) -> bool {
        match self.inputs.get(input).map(|port| &port.mode) {
            Some(InputMode::Queued(queue)) => !queue.is_empty(),
            Some(InputMode::Constant(_)) => true,
            None => false,
        }
    }

    pub fn all_pending(&self) -> bool {
        self.inputs.keys().all(|name| self.has_pending(name))
    }

    /// Pop the oldest queued value, or read the constant without consuming it.
    pub fn take_input(&mut self, input: &str) -> Result<PortData> {
        let port = self
            .inputs
            .get_mut(input)
            .ok_or_else(|| anyhow!("no such input '{input}'"))?;

        match &mut port.mode {
            InputMode::Queued(queue) => queue
                .pop_front()
                .ok_or_else(|| anyhow!("input '{input}' has no pending value")),
            InputMode::Constant(value) => Ok(value.clone()),
        }
    }

    /// Stage a value for every destination bound to `output`.
    pub fn send_output(&mut self, output: &str, value: PortData) -> Result<()> {
        let port_type = self
            .outputs
            .get(output)
            .ok_or_else(|| anyhow!("no such output '{output}'"))?;

        if !port_type.accepts(&value) {
            bail!(
                "wrong type for output '{output}': expected {port_type}, got {}",
                value.port_type()
            );
        }

        self.outbox.push(SentValue {
            output: output.to_string(),
            value,
        });
        Ok(())
    }

    /// Record a line of externally visible output (what a printer prints).
    pub fn emit(&mut self, text: impl Into<String>) {
        self.emissions.push(text.into());
    }

    pub fn take_outbox(&mut self) -> Vec<SentValue> {
        std::mem::take(&mut self.outbox)
    }

    pub fn take_emissions(&mut self) -> Vec<String> {
        std::mem::take(&mut self.emissions)
    }
}
