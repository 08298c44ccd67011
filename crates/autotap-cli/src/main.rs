//! autotap CLI entry point.

mod args;
mod commands;
mod paths;
mod replay;
mod report;

use autotap_core::{Config, Interrupt};
use clap::Parser;
use serde_json::Value;
use tracing::{error, info};

use crate::args::{Cli, Commands, ReplayArgs};
use crate::report::ErrorReport;

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        let report = ErrorReport::from_anyhow(&e);
        match serde_json::to_string_pretty(&report) {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("Error: {:#}", e),
        }
        std::process::exit(report.exit_code());
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = paths::load_config(cli.config.as_deref())?;

    let output = match cli.command {
        Commands::Match(args) => commands::run_match(&args, config)?,
        Commands::Color(args) => commands::run_color(&args, config)?,
        Commands::Replay(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_replay(args, config))?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run the blocking replay on a worker thread; Ctrl+C sets the process-wide
/// interrupt flag and waits for the dispatcher to unwind.
async fn run_replay(args: ReplayArgs, config: Config) -> anyhow::Result<Value> {
    let interrupt = Interrupt::global();
    let mut worker = {
        let interrupt = interrupt.clone();
        tokio::task::spawn_blocking(move || commands::run_replay(&args, config, interrupt))
    };

    let summary = tokio::select! {
        joined = &mut worker => joined??,
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, stopping replay");
            interrupt.set();
            worker.await??
        }
    };

    Ok(serde_json::to_value(summary)?)
}
