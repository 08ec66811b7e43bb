use clap::Parser;
use money_tracker::args::{Args, Command};
use money_tracker::{commands, Config, Mode, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.common().log_level());
    trace!("{args:?}");

    let mode = Mode::from_env();
    debug!("Running in {mode} mode");

    match run(args.common().home().path(), args.command(), mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with {} error: {e}", e.error_type());
            ExitCode::FAILURE
        }
    }
}

/// Runs one subcommand. Everything except `init` needs the config that `init` writes.
async fn run(home: &Path, command: &Command, mode: Mode) -> Result<()> {
    if let Command::Init(init_args) = command {
        commands::init(home, init_args.client_secret(), init_args.sheet_url())
            .await?
            .print();
        return Ok(());
    }

    let config = Config::load(home).await?;
    match command {
        Command::Auth(auth_args) if auth_args.verify() => {
            commands::auth_verify(&config, mode).await?.print()
        }
        Command::Auth(_) => commands::auth(&config).await?.print(),
        Command::Serve(serve_args) => commands::serve(config, mode, serve_args.bind())
            .await?
            .print(),
        Command::Init(_) => {}
    }
    Ok(())
}

/// Logs to stderr. `RUST_LOG`, when set, wins over `--log-level`, which otherwise applies to this
/// crate and to the HTTP request traces.
fn init_logger(level: LevelFilter) {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!(
            "{}={level},tower_http={level}",
            env!("CARGO_CRATE_NAME")
        ))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
