//! Command-line host for plughost extension modules.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plughost_core::settings::env_vars;
use plughost_core::{
    spawn_stdin_loop, ConsoleCommand, ExtensionHost, HostSettings, LogSink, NativeModuleLoader,
};
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;

/// plughost - load extension modules and run them until asked to stop.
#[derive(Parser, Debug)]
#[command(name = "plughost")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Directory of dependency libraries, loaded first.
    #[arg(long, global = true)]
    libs_dir: Option<PathBuf>,

    /// Directory of extension modules.
    #[arg(long, global = true)]
    plugins_dir: Option<PathBuf>,

    /// Directory of extension config files.
    #[arg(long, global = true)]
    configs_dir: Option<PathBuf>,

    /// Directory the run log is written to.
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover and start every extension, then read console commands
    /// until `exit`, `quit` or Ctrl+C.
    Run,
    /// Discover extensions and list them without starting any.
    List,
}

impl Args {
    fn settings(&self) -> HostSettings {
        let mut settings = HostSettings::from_env();
        if let Some(dir) = &self.libs_dir {
            settings.libs_dir = dir.clone();
        }
        if let Some(dir) = &self.plugins_dir {
            settings.plugins_dir = dir.clone();
        }
        if let Some(dir) = &self.configs_dir {
            settings.configs_dir = dir.clone();
        }
        if let Some(dir) = &self.logs_dir {
            settings.logs_dir = dir.clone();
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = args.settings();
    let sink = LogSink::new(settings.log_prefix.clone());
    init_tracing(args.verbose, &sink);

    let result = match &args.command {
        Command::Run => run(settings.clone()).await,
        Command::List => list(settings.clone()),
    };

    // The run log is written once, whatever the outcome.
    if matches!(args.command, Command::Run) {
        match sink.flush_to(&settings.logs_dir) {
            Ok(Some(path)) => eprintln!("Log written to {}", path.display()),
            Ok(None) => {}
            Err(e) => eprintln!("Failed to write log: {}", e),
        }
    }

    result
}

fn init_tracing(verbose: bool, sink: &LogSink) {
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if verbose {
        "plughost=debug,plughost_core=debug"
    } else {
        "plughost=info,plughost_core=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(default_level)
            .add_directive(tracing::Level::WARN.into())
    });

    let json_layer = json_logging.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let compact_layer = (!json_logging).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(compact_layer)
        .with(sink.layer())
        .init();
}

async fn run(settings: HostSettings) -> Result<()> {
    let mut host = ExtensionHost::new(settings);
    host.ensure_dirs().context("Failed to create host directories")?;

    let mut loader = NativeModuleLoader::new();
    host.discover(&mut loader)
        .context("Failed to scan extension directories")?;

    for report in host.start_all().await {
        if let Some(e) = report.error {
            tracing::warn!("{} did not start: {}", report.name, e);
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_stdin_loop(host.shutdown_token(), move |command| {
        let _ = tx.send(command);
    })
    .context("Failed to start console")?;
    println!("plughost running. Type 'exit' or 'quit' to stop.");

    loop {
        tokio::select! {
            _ = host.wait_for_shutdown() => break,
            Some(command) = rx.recv() => handle_command(&host, command).await,
        }
    }

    for report in host.stop_all().await {
        if let Some(e) = report.error {
            tracing::warn!("{} did not stop cleanly: {}", report.name, e);
        }
    }
    tracing::info!("Host stopped");
    Ok(())
}

async fn handle_command(host: &ExtensionHost, command: ConsoleCommand) {
    match command.name.to_ascii_lowercase().as_str() {
        "status" | "list" => {
            for d in host.descriptors() {
                println!(
                    "{:<24} {:<14} {}",
                    d.name,
                    d.state.to_string(),
                    d.module.display()
                );
            }
        }
        "reload" => {
            let Some(name) = command.args.first() else {
                println!("Usage: reload <extension>");
                return;
            };
            match host.reload_config(name).await {
                Ok(Some(_)) => println!("Reloaded config of {}", name),
                Ok(None) => println!("{} has no config", name),
                Err(e) => println!("Reload failed: {}", e),
            }
        }
        "help" => {
            println!("Commands: status, reload <extension>, exit, quit");
        }
        other => {
            tracing::debug!("Unhandled console command: {}", other);
        }
    }
}

fn list(settings: HostSettings) -> Result<()> {
    let mut host = ExtensionHost::new(settings);
    let mut loader = NativeModuleLoader::new();
    let report = host
        .discover(&mut loader)
        .context("Failed to scan extension directories")?;

    if report.registered.is_empty() {
        println!(
            "No extensions found in {}",
            host.settings().plugins_dir.display()
        );
    } else {
        println!("{:<24} MODULE", "NAME");
        for d in &report.registered {
            println!("{:<24} {}", d.name, d.module.display());
        }
    }
    for (path, e) in &report.skipped {
        println!("skipped {}: {}", path.display(), e);
    }
    Ok(())
}
