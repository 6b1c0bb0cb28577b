//! `flowforge` — the CLI entry point. Translates `clap` flags into the
//! `Selectors`/`RunRequest` the orchestrator already accepts; owns none of
//! the engine's internal logic (spec §1).
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use flow_engine::actions::register_builtins;
use flow_engine::artifact::ArtifactAllocator;
use flow_engine::config::FlowForgeConfig;
use flow_engine::observer::{Event, Observer};
use flow_engine::orchestrator::{RunRequest, Selectors};
use flow_engine::registry::ActionRegistryBuilder;
use flow_engine::Orchestrator;
use flow_core::RunSnapshot;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowforge", about = "Declarative JSON flow runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print each task's progress as a colored line to stderr.
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Args)]
struct SelectorArgs {
    /// Root flow document to load.
    flow: PathBuf,

    #[arg(long = "begin-from")]
    begin_from_task_id: Option<String>,
    #[arg(long = "run-task")]
    run_task_id: Option<String>,
    #[arg(long = "run-flow")]
    run_flow_id: Option<String>,
    #[arg(long = "run-subtask")]
    run_subtask_id: Option<String>,
    #[arg(long = "stop-at")]
    stop_at_task_id: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Load a root document and execute it from the start (or from a
    /// selector), with no prior snapshot.
    Run {
        #[command(flatten)]
        selectors: SelectorArgs,
    },
    /// Re-run against a previously emitted `RunSnapshot` JSON file.
    Resume {
        #[command(flatten)]
        selectors: SelectorArgs,

        /// Path to a `RunSnapshot` written by a prior `run`/`resume`.
        #[arg(long)]
        snapshot: PathBuf,
    },
}

/// Prints each lifecycle event to stderr as a colored line; installed only
/// when `--pretty` is passed and stderr is a tty (respects `NO_COLOR`).
struct PrettyObserver;

impl Observer for PrettyObserver {
    fn on_event(&self, event: Event) {
        match event {
            Event::FlowStarted { flow_id, .. } => {
                eprintln!("{} {}", "flow started".green().bold(), flow_id);
            }
            Event::FlowFinished { flow_id, success, .. } => {
                let label = if success { "flow finished".green().bold() } else { "flow failed".red().bold() };
                eprintln!("{} {}", label, flow_id);
            }
            Event::TaskStarted { task, .. } => {
                eprintln!("  {} {} ({})", "->".cyan(), task.id, task.action);
            }
            Event::TaskCompleted { task, .. } => {
                eprintln!("  {} {}", "ok".green(), task.id);
            }
            Event::TaskFailed { task, .. } => {
                eprintln!("  {} {}: {}", "fail".red().bold(), task.id, task.error.unwrap_or_default());
            }
            Event::TaskLog { line, .. } => {
                eprintln!("    {} {}", format!("[{}]", line.level).dimmed(), line.message);
            }
            Event::FlowLoaded { .. } => {}
        }
    }
}

fn install_tracing(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .try_init();
}

fn build_orchestrator(config: &FlowForgeConfig, root_flow_name: &str, pretty: bool) -> Arc<Orchestrator> {
    let registry = register_builtins(ActionRegistryBuilder::new()).freeze();
    let artifacts = ArtifactAllocator::new(config.logs_dir.clone(), root_flow_name);
    let observer: Arc<dyn Observer> = if pretty { Arc::new(PrettyObserver) } else { Arc::new(flow_engine::observer::NullObserver) };
    Orchestrator::new(registry, artifacts, observer, config.max_parallel)
}

fn selectors_from_args(args: &SelectorArgs) -> Selectors {
    Selectors {
        begin_from_task_id: args.begin_from_task_id.clone(),
        run_task_id: args.run_task_id.clone(),
        run_flow_id: args.run_flow_id.clone(),
        run_subtask_id: args.run_subtask_id.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = FlowForgeConfig::from_env();
    install_tracing(&config.log_filter);

    let cli = Cli::parse();

    let (selectors_args, snapshot) = match &cli.command {
        Command::Run { selectors } => (selectors, None),
        Command::Resume { selectors, snapshot } => {
            let raw = std::fs::read_to_string(snapshot)?;
            let snapshot: RunSnapshot = serde_json::from_str(&raw)?;
            (selectors, Some(snapshot))
        }
    };

    let loaded = flow_core::document::load(&selectors_args.flow)?;
    let orchestrator = build_orchestrator(&config, &loaded.root_id, cli.pretty);

    let request = RunRequest {
        selectors: selectors_from_args(selectors_args),
        stop_at_task_id: selectors_args.stop_at_task_id.clone(),
        snapshot,
    };

    let outcome = orchestrator.run(&loaded, request).await?;

    let snapshot_path = config.logs_dir.join(format!("{}-snapshot.json", loaded.root_id));
    if let Some(parent) = snapshot_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&snapshot_path, serde_json::to_string_pretty(&outcome.snapshot)?)?;

    match &outcome.primary_error {
        None => {
            println!("{}", "run succeeded".green());
            Ok(())
        }
        Some(err) => {
            eprintln!("{} {}", "run failed:".red().bold(), err);
            std::process::exit(1);
        }
    }
}
