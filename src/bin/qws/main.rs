mod chrome;
mod cli;
mod face;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chrome::{ChromeSurface, LaunchConfig};
use cli::{Cli, CliCommand, RunArgs};
use face::RunEvent;
use qwsengine::{
    EngineConfig, ExecutionContext, JsonSettings, MemorySurface, Registry, ScriptExecutor,
    Settings,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qwsengine=info,qws=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        CliCommand::Run(args) => run(args).await,
        CliCommand::Check { script } => check(&script),
        CliCommand::Convert { script, output } => convert(&script, output.as_deref()),
        CliCommand::Commands => {
            for name in Registry::global().list() {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let mut config = EngineConfig::from_env()?;
    config.stop_on_error |= args.stop_on_error;

    let mut context = ExecutionContext::new()
        .with_wait_policy(config.wait.clone())
        .with_stop_on_error(config.stop_on_error);
    if let Some(path) = &config.settings_path {
        let settings: Arc<dyn Settings> = Arc::new(JsonSettings::load(path)?);
        context = context.with_settings(settings);
    }

    // Load before launching anything so syntax errors fail fast.
    let mut executor = ScriptExecutor::with_global_registry(context);
    executor.load_file(&args.script)?;
    if executor.is_empty() {
        anyhow::bail!("no runnable commands in {}", args.script.display());
    }

    let events = if args.serve {
        Some(face::start_server(args.port, executor.control()).await?)
    } else {
        None
    };
    if let Some(tx) = &events {
        let tx = tx.clone();
        executor.context_mut().set_sink(Box::new(move |entry| {
            let _ = tx.send(RunEvent::Log {
                level: entry.level.as_str(),
                line: entry.to_string(),
            });
        }));
    }

    if args.dry_run {
        tracing::info!("dry run: using an in-memory page");
        executor.context_mut().surface = Some(Box::new(MemorySurface::new()));
    } else {
        if !config.wait.drain_events {
            tracing::warn!("QWS_DRAIN_EVENTS is off; Chrome load detection needs it, enabling");
            executor.context_mut().wait.drain_events = true;
        }
        let attach_url = match args.debug_port {
            Some(port) => match chrome::debugger_url(port).await {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("no debuggable Chrome on port {port}: {e}");
                    None
                }
            },
            None => None,
        };
        let launch = LaunchConfig {
            headless: args.headless,
            chrome_path: args.chrome_path.clone(),
            attach_url,
        };
        let surface = tokio::task::spawn_blocking(move || ChromeSurface::launch(&launch))
            .await
            .map_err(|e| anyhow::anyhow!("browser launch panicked: {e}"))??;
        executor.context_mut().surface = Some(Box::new(surface));
    }

    let stopper = executor.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current command");
            stopper.stop();
        }
    });

    let progress_tx = events.clone();
    let (executor, success) = tokio::task::spawn_blocking(move || {
        let success = executor.execute_with(|index, total, description| {
            publish(
                progress_tx.as_ref(),
                RunEvent::Progress {
                    index,
                    total,
                    description: description.to_string(),
                },
            );
        });
        (executor, success)
    })
    .await
    .map_err(|e| anyhow::anyhow!("script run panicked: {e}"))?;

    for error in executor.errors() {
        eprintln!("[{}] {}: {}", error.index + 1, error.command, error.message);
    }
    let clean = success && executor.load_errors().is_empty();
    let summary = executor.context().logs().last().cloned().unwrap_or_default();
    publish(
        events.as_ref(),
        RunEvent::Finished {
            success: clean,
            summary,
        },
    );

    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn publish(tx: Option<&broadcast::Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = tx {
        // No subscribers is not an error.
        let _ = tx.send(event);
    }
}

/// Load a script through the registry without running it.
fn load_only(script: &Path) -> Result<ScriptExecutor> {
    let mut context = ExecutionContext::new();
    context.mirror = false;
    let mut executor = ScriptExecutor::with_global_registry(context);
    executor.load_file(script)?;
    for error in executor.load_errors() {
        eprintln!("{error}");
    }
    Ok(executor)
}

fn check(script: &Path) -> Result<ExitCode> {
    let executor = load_only(script)?;
    println!("{}", executor.to_script().to_json_pretty()?);
    eprintln!(
        "{}: {} commands, {} load errors",
        script.display(),
        executor.len(),
        executor.load_errors().len()
    );
    Ok(if executor.load_errors().is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn convert(script: &Path, output: Option<&Path>) -> Result<ExitCode> {
    let mut executor = load_only(script)?;
    match output {
        Some(path) => {
            executor.save_to_file(path)?;
            tracing::info!("wrote {} commands to {}", executor.len(), path.display());
        }
        None => println!("{}", executor.to_script().to_json_pretty()?),
    }
    Ok(ExitCode::SUCCESS)
}
