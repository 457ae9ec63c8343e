//! Core crate for the conveyor dataflow engine: typed ports, graph wiring,
//! the run-to-fixpoint scheduler and the shipped node kinds.

pub mod config;
pub mod debug_event;
pub mod descriptor;
pub mod executor;
pub mod graph;
pub mod logging;
pub mod node;
pub mod nodes;
pub mod ports;
pub mod registry;
pub mod types;
