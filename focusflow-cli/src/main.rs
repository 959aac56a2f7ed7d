use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use focusflow_client::HttpBackend;
use focusflow_core::signals::drain;
use focusflow_core::{
    ComplexityLevel, FlowError, FlowServices, FlowSignal, FlowStage, OrchestrationController,
    Progress, TaskId,
};

mod config;
mod draft_file;
mod prompt;
mod state;

#[derive(Parser, Debug)]
#[command(
    name = "focusflow",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("FOCUSFLOW_BUILD_SHA"), ")"),
    about = "Create a task and start a focus session"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write default config to ~/.focusflow/config.toml
    InitConfig,

    /// Create a task from a draft file, optionally starting a focus session
    Create {
        /// TOML draft (title, priority, energy_level, category, subtasks, ...)
        #[arg(long)]
        draft: PathBuf,

        /// Start a focus session right after creation (after the breakdown, if any)
        #[arg(long)]
        start: bool,

        /// Task you were working on before, for context-switch detection
        #[arg(long)]
        previous_task: Option<i64>,

        /// Ask for an AI breakdown (simple, medium, complex)
        #[arg(long)]
        breakdown: Option<ComplexityLevel>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FOCUSFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::InitConfig => {
            config::init_config()?;
        }

        Command::Create {
            draft,
            start,
            previous_task,
            breakdown,
        } => {
            run_create(draft, start, previous_task.map(TaskId), breakdown).await?;
        }
    }

    Ok(())
}

async fn run_create(
    draft_path: PathBuf,
    start: bool,
    previous_task: Option<TaskId>,
    breakdown: Option<ComplexityLevel>,
) -> Result<()> {
    let cfg = config::load_config()?;
    let draft = draft_file::read_draft(&draft_path, &cfg.flow.timezone)?;
    debug!(path = %draft_path.display(), base_url = %cfg.backend.base_url, "draft loaded");
    let backend = HttpBackend::new(cfg.backend_config()).context("configure backend")?;

    let (controller, mut rx) = OrchestrationController::new(
        draft,
        FlowServices::from_backend(Arc::new(backend)),
        cfg.flow_config(),
    );
    let controller = controller.with_previous_task(previous_task);

    let created = match breakdown {
        Some(level) => controller.breakdown_draft(level, start).await,
        None => controller.submit(start).await,
    };
    show_signals(&mut rx);
    match created {
        Ok(_) => {}
        Err(FlowError::BreakdownUnavailable(msg)) => println!("AI breakdown unavailable: {msg}"),
        Err(e) => bail!("task not created: {e}"),
    }

    if let Some(proposal) = controller.pending_breakdown() {
        if prompt::ask_apply_breakdown(&proposal)? {
            controller.apply_breakdown().await?;
        } else {
            controller.dismiss_breakdown()?;
        }
        show_signals(&mut rx);
    }

    if start && breakdown.is_some() && controller.stage() != FlowStage::EnvironmentPending {
        controller.start_session()?;
    }

    if controller.stage() == FlowStage::EnvironmentPending {
        let progress = match prompt::ask_checklist()? {
            Some(checklist) => controller.save_environment(checklist).await,
            None => controller.skip_environment().await,
        };
        show_signals(&mut rx);
        report_launch(progress)?;
    }

    if let Some(decision) = controller.pending_switch() {
        if controller.stage() == FlowStage::SwitchWarned {
            let resolution = prompt::ask_switch(&decision)?;
            let progress = controller.resolve_switch(resolution).await;
            show_signals(&mut rx);
            report_launch(progress)?;
        }
    }

    match controller.stage() {
        FlowStage::Launched => println!("\nFocus session started."),
        FlowStage::Deferred => println!("\nTask saved; batch it with similar work later."),
        FlowStage::Cancelled => println!("\nSession cancelled; the task is saved."),
        FlowStage::Failed => {
            if let Some(id) = controller.task_id() {
                println!("\nTask {id} saved, but no session is running.");
            }
        }
        _ => {
            if let Some(id) = controller.task_id() {
                println!("\nTask {id} saved. Start it later with a focus session.");
            }
        }
    }
    Ok(())
}

/// A failed launch ends the flow with the task kept, so it is reported
/// rather than returned.
fn report_launch(progress: Result<Progress, FlowError>) -> Result<()> {
    match progress {
        Ok(_) => Ok(()),
        Err(e) if e.is_terminal() => {
            eprintln!("error: {e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn show_signals(rx: &mut UnboundedReceiver<FlowSignal>) {
    for signal in drain(rx) {
        match signal {
            FlowSignal::TaskCreated(id) => println!("Created task {id}"),
            FlowSignal::Error(msg) => eprintln!("warning: {msg}"),
            FlowSignal::SessionLaunched(handle) => println!(
                "Session {} running for {} min",
                handle.id, handle.duration_minutes
            ),
            _ => {}
        }
    }
}
