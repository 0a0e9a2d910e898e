use clap::Parser;
use crossterm::style::Stylize;
use devctl::commands::{self, Command};
use devctl::{logging, ui, Config, ServiceManager};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser, Debug)]
#[command(name = "devctl")]
#[command(about = "Start, stop and inspect the local backend/frontend dev stack", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Args {
    /// Project root containing the service directories
    #[arg(long, env = "DEVCTL_ROOT")]
    root: Option<PathBuf>,

    /// Config file (defaults to <root>/devctl.toml, then ~/.config/devctl/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mirror debug logging to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let root = match args.root.map(Ok).unwrap_or_else(std::env::current_dir) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error: cannot determine project root: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::load(&root, args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            ui::error(e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let mut manager = ServiceManager::new(config, root);

    if let Err(e) = logging::init(manager.logs_dir(), args.verbose) {
        eprintln!("Warning: logging disabled: {e}");
    }

    ui::banner();

    let Some(command) = args.command else {
        commands::help(&manager);
        return ExitCode::SUCCESS;
    };

    tracing::debug!(?command, root = %manager.root().display(), "dispatching");

    // Registered before dispatch so SIGINT during synchronous work is held
    // until the next await point instead of killing the process
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(interrupt) => interrupt,
        Err(e) => {
            ui::error(format!("Unexpected error: cannot install interrupt handler: {e}"));
            return ExitCode::FAILURE;
        }
    };

    let outcome = tokio::select! {
        biased;
        _ = interrupt.recv() => None,
        result = commands::run(&mut manager, command) => Some(result),
    };

    match outcome {
        Some(Ok(())) => ExitCode::SUCCESS,
        Some(Err(err)) => {
            ui::error(format!("Unexpected error: {err:#}"));
            eprintln!("{err:?}");
            ExitCode::FAILURE
        }
        None => {
            println!("\n\n{}", "Interrupted by user".yellow());
            tracing::warn!("interrupted by user");
            commands::shutdown(&mut manager);
            ExitCode::SUCCESS
        }
    }
}
