//! Operator CLI for famly-sync
//!
//! `famly-sync [--config <path>] <status|missing>` prints the status snapshot
//! or the computed missing Famly ids as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{error, info};

use famly_sync::AppState;
use famly_sync::commands;
use famly_sync::domain::SourceSystem;
use famly_sync::infrastructure::{
    AppConfig, UnavailableDriver, UnavailableWriter, init_logging_with_config, log_system_info,
};

const USAGE: &str = "usage: famly-sync [--config <path>] <status|missing>";

#[derive(Debug)]
enum Command {
    Status,
    Missing,
}

struct Args {
    config: Option<PathBuf>,
    command: Command,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut config = None;
    let mut command = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config requires a path")?;
                config = Some(PathBuf::from(path));
            }
            "status" => command = Some(Command::Status),
            "missing" => command = Some(Command::Missing),
            "-h" | "--help" => bail!(USAGE),
            other => bail!("unknown argument '{other}'\n{USAGE}"),
        }
    }

    let command = command.context(USAGE)?;
    Ok(Args { config, command })
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load(args.config.as_deref())?;
    init_logging_with_config(&config.logging)?;
    log_system_info();

    let state = AppState::initialize(
        config,
        Arc::new(UnavailableDriver::new(SourceSystem::Famly)),
        Arc::new(UnavailableDriver::new(SourceSystem::BabyConnect)),
        Arc::new(UnavailableWriter),
    )
    .await?;
    info!("Running {:?}", args.command);

    let output = match args.command {
        Command::Status => serde_json::to_string_pretty(&commands::get_status(&state).await?)?,
        Command::Missing => serde_json::to_string_pretty(&state.engine.compute_missing().await?)?,
    };
    println!("{output}");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("famly-sync failed: {:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
