use anyhow::Result;
use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::debug_event::PipelineObserver;
use crate::graph::PipelineGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// A full pass made no progress.
    Fixpoint,
    /// The configured pass ceiling stopped the run first.
    PassLimitReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Full passes executed, including the final quiet pass.
    pub passes: u64,
    pub node_runs: u64,
    pub status: RunStatus,
}

/// Cooperative round-robin scheduler.
///
/// Each pass runs every node once in declaration order. The loop ends after
/// the first pass in which no node reports progress. There is no dependency
/// ordering, so cyclic graphs are driven the same way as acyclic ones; a cycle
/// that always makes progress only stops at `max_passes`, if one is set.
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn run(
        &self,
        graph: &mut PipelineGraph,
        observer: &mut dyn PipelineObserver,
    ) -> Result<RunReport> {
        let order = graph.node_order();
        let mut passes = 0u64;
        let mut node_runs = 0u64;

        loop {
            if let Some(limit) = self.config.max_passes {
                if passes >= limit {
                    warn!(passes, limit, "pass limit reached before fixpoint");
                    return Ok(RunReport {
                        passes,
                        node_runs,
                        status: RunStatus::PassLimitReached,
                    });
                }
            }

            passes += 1;
            let mut progressed = false;
            for index in &order {
                progressed |= graph.run_node(*index, observer)?;
                node_runs += 1;
            }
            observer.pass_finished(passes, progressed);

            if !progressed {
                info!(passes, node_runs, "pipeline reached fixpoint");
                return Ok(RunReport {
                    passes,
                    node_runs,
                    status: RunStatus::Fixpoint,
                });
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
