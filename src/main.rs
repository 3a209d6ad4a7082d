use anyhow::{anyhow, Context, Result};
use clap::Parser;
use parley::integration::{Capabilities, Orchestrator, OrchestratorHandle};
use parley::llm::{build_client, plain_text, Backend};
use parley::{AssistantConfig, OrchestratorEvent, Role};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Terminal chat with a remote language model
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Model backend (relay or gemini)
    #[arg(short, long, env = "PARLEY_BACKEND")]
    backend: Option<Backend>,

    /// Override the model endpoint
    #[arg(short, long, env = "PARLEY_ENDPOINT")]
    endpoint: Option<String>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AssistantConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AssistantConfig::default(),
    };
    if let Some(backend) = cli.backend {
        config.model.backend = backend;
    }
    if let Some(endpoint) = cli.endpoint {
        config.model.endpoint = Some(endpoint);
    }

    info!("Starting Parley with {:?} backend at {}", config.model.backend, config.model.endpoint());

    let client = build_client(&config.model).context("creating model client")?;
    let (orchestrator, handle) = Orchestrator::new(config, client, Capabilities::none())?;
    let worker = orchestrator.start()?;

    drain_events(&handle, Duration::from_millis(50));
    println!("Type a message, /clear to reset, /quit to exit.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match line.trim() {
            "/quit" => break,
            "/clear" => {
                handle.clear_history()?;
                println!("(conversation cleared)");
            }
            "" => {}
            text => {
                handle.send_text(text)?;
                wait_for_reply(&handle);
            }
        }
    }

    if let Err(e) = handle.shutdown() {
        warn!("Orchestrator already stopped: {}", e);
    }
    join_worker(worker)
}

fn join_worker(worker: JoinHandle<()>) -> Result<()> {
    worker.join().map_err(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("Orchestrator thread panicked: {}", reason);
        anyhow!("orchestrator thread panicked: {}", reason)
    })
}

fn wait_for_reply(handle: &OrchestratorHandle) {
    // the orchestrator leaves Idle only once the text command is processed
    let mut started = false;
    let mut quiet_polls = 0;
    loop {
        let event = handle.recv_event_timeout(Duration::from_millis(100));
        if let Some(event) = &event {
            print_event(event);
        }
        let view = handle.snapshot();
        started |= !view.state.is_idle() || event.is_some();
        quiet_polls = if event.is_some() { 0 } else { quiet_polls + 1 };

        let settled = view.state.is_idle() && !view.is_thinking && event.is_none();
        if settled && (started || quiet_polls > 10) {
            break;
        }
    }
}

fn drain_events(handle: &OrchestratorHandle, timeout: Duration) {
    while let Some(event) = handle.recv_event_timeout(timeout) {
        print_event(&event);
    }
}

fn print_event(event: &OrchestratorEvent) {
    match event {
        OrchestratorEvent::TurnAppended(turn) if turn.role() == Role::Assistant => {
            println!("{}", plain_text(turn.text()));
        }
        OrchestratorEvent::Notice(notice) => eprintln!("[{}]", notice),
        _ => {}
    }
}
