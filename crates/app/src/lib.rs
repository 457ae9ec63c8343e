use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use conveyor_core::config::{config_path, EngineConfig, LoggingConfig, PipelineConfig, SchedulerConfig};
use conveyor_core::debug_event::{NodeDebugValueEvent, PipelineObserver, TracingObserver};
use conveyor_core::executor::{RunReport, RunStatus, Scheduler};
use conveyor_core::graph::PipelineGraph;
use conveyor_core::logging::{self, FileSinkPlan, LoggingInitOptions, DEFAULT_LOG_FILTER};
use conveyor_core::registry::build_default_registry;
use conveyor_core::types::{PortData, PortType};

#[derive(Parser)]
#[command(name = "conveyor", about = "Run typed dataflow pipelines until they settle")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help = "Increase log verbosity (-v: debug, -vv: trace)"
    )]
    verbose: u8,

    #[arg(
        long = "log-filter",
        value_name = "FILTER",
        global = true,
        help = "Explicit tracing filter (overrides RUST_LOG and -v)"
    )]
    log_filter: Option<String>,

    #[arg(long, global = true, help = "Path to conveyor.toml")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a pipeline from JSON and run it to a fixpoint.
    Run(RunArgs),
    /// List the registered node kinds.
    Nodes,
}

#[derive(Args)]
struct RunArgs {
    #[arg(help = "Path to pipeline JSON file")]
    pipeline: PathBuf,
    #[arg(long, value_name = "N", help = "Stop after N scheduler passes")]
    max_passes: Option<u64>,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();

    let cfg_path = config_path(cli.config.as_deref());
    let loaded = EngineConfig::load_from_path(&cfg_path);
    let logging_config = match &loaded {
        Ok(config) => config.logging.clone(),
        Err(_) => LoggingConfig::default(),
    };
    let _log_guard = init_logging(&logging_config, cli.verbose, cli.log_filter.as_deref());

    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "Failed to load config file, using defaults");
            EngineConfig::default()
        }
    };
    info!(config_path = %cfg_path.display(), pid = std::process::id(), "conveyor starting");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Run(args) => {
            let scheduler = SchedulerConfig {
                max_passes: args.max_passes.or(config.scheduler.max_passes),
            };
            run_pipeline(&args.pipeline, scheduler, &mut out)?;
            Ok(())
        }
        Commands::Nodes => list_nodes(&mut out),
    }
}

/// Returns the file writer guard; dropping it flushes pending file output.
fn init_logging(
    config: &LoggingConfig,
    verbose: u8,
    cli_log_filter: Option<&str>,
) -> Option<WorkerGuard> {
    let init_options = LoggingInitOptions {
        verbose,
        cli_log_filter: cli_log_filter.map(ToString::to_string),
        rust_log_env: std::env::var("RUST_LOG").ok(),
        ..LoggingInitOptions::from_config(config)
    };
    let init_plan = logging::compose_logging_init_plan(&init_options);
    let filter = init_plan.filter;

    match init_plan.file_sink {
        FileSinkPlan::Ready(ready) => {
            let (file_writer, guard) = tracing_appender::non_blocking(ready.appender);
            let subscriber = tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_filter(parse_env_filter_with_fallback(&filter, "console")),
                )
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(file_writer)
                        .with_filter(parse_env_filter_with_fallback(&filter, "file")),
                );

            if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(
                    "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
                );
            } else {
                info!(log_dir = %ready.log_dir.display(), "Persistent file logging enabled");
            }
            Some(guard)
        }
        FileSinkPlan::Fallback(fallback) => {
            let subscriber = tracing_subscriber::registry().with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_filter(parse_env_filter_with_fallback(&filter, "console")),
            );

            if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(
                    "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
                );
                return None;
            }

            // Only worth a warning when a directory was asked for.
            if let Some(attempted_log_dir) = fallback.attempted_log_dir {
                warn!(
                    attempted_log_dir = %attempted_log_dir.display(),
                    reason = %fallback.reason,
                    "Persistent file logging unavailable; continuing with console-only logging"
                );
            }
            None
        }
    }
}

fn parse_env_filter_with_fallback(filter: &str, sink_name: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_new(filter).unwrap_or_else(|error| {
        eprintln!(
            "Invalid {sink_name} log filter '{filter}': {error}. Falling back to '{DEFAULT_LOG_FILTER}'."
        );
        tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}

fn run_pipeline<W: Write>(
    pipeline_path: &Path,
    scheduler_config: SchedulerConfig,
    out: &mut W,
) -> Result<RunReport> {
    info!("Loading pipeline: {}", pipeline_path.display());
    let pipeline = PipelineConfig::load_from_path(pipeline_path)?;
    let registry = build_default_registry();

    let mut observer = ConsoleObserver::new(&mut *out);
    let mut graph = PipelineGraph::from_config(&pipeline, &registry, &mut observer)
        .context("Pipeline construction failed")?;

    info!("Running pipeline...");
    let report = Scheduler::new(scheduler_config)
        .run(&mut graph, &mut observer)
        .context("Pipeline run failed")?;
    observer.finish().context("failed to write pipeline output")?;

    writeln!(out, "Pipeline finished work")?;
    if report.status == RunStatus::PassLimitReached {
        writeln!(
            out,
            "Stopped after {} passes without reaching a fixpoint",
            report.passes
        )?;
    }
    info!(
        passes = report.passes,
        node_runs = report.node_runs,
        "Pipeline completed"
    );

    Ok(report)
}

fn list_nodes<W: Write>(out: &mut W) -> Result<()> {
    let registry = build_default_registry();
    for node_type in registry.list_node_types() {
        writeln!(out, "{node_type}")?;
    }
    Ok(())
}

/// Prints node emissions to the wrapped writer and forwards every trace
/// point to `TracingObserver`.
struct ConsoleObserver<W> {
    out: W,
    tracing: TracingObserver,
    write_error: Option<io::Error>,
}

impl<W: Write> ConsoleObserver<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            tracing: TracingObserver,
            write_error: None,
        }
    }

    fn finish(mut self) -> io::Result<()> {
        match self.write_error.take() {
            Some(error) => Err(error),
            None => self.out.flush(),
        }
    }
}

impl<W: Write> PipelineObserver for ConsoleObserver<W> {
    fn node_created(&mut self, node_id: &str, node_type: &str) {
        self.tracing.node_created(node_id, node_type);
    }

    fn constant_assigned(&mut self, node_id: &str, input: &str, value: &PortData) {
        self.tracing.constant_assigned(node_id, input, value);
    }

    fn output_connected(
        &mut self,
        source_id: &str,
        output: &str,
        target_id: &str,
        input: &str,
        port_type: PortType,
    ) {
        self.tracing
            .output_connected(source_id, output, target_id, input, port_type);
    }

    fn value_delivered(&mut self, node_id: &str, input: &str, value: &PortData) {
        self.tracing.value_delivered(node_id, input, value);
    }

    fn value_sent(
        &mut self,
        source_id: &str,
        output: &str,
        target_id: &str,
        input: &str,
        value: &PortData,
    ) {
        self.tracing
            .value_sent(source_id, output, target_id, input, value);
    }

    fn value_dropped(&mut self, source_id: &str, output: &str, value: &PortData) {
        self.tracing.value_dropped(source_id, output, value);
    }

    fn node_ran(&mut self, node_id: &str, progressed: bool) {
        self.tracing.node_ran(node_id, progressed);
    }

    fn node_emitted(&mut self, event: &NodeDebugValueEvent) {
        self.tracing.node_emitted(event);
        if self.write_error.is_none() {
            if let Err(error) = writeln!(self.out, "{}", event.value) {
                self.write_error = Some(error);
            }
        }
    }

    fn pass_finished(&mut self, pass: u64, progressed: bool) {
        self.tracing.pass_finished(pass, progressed);
    }
}
