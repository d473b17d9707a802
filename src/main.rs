use std::{path::PathBuf, process::ExitCode};

use ::tracing::{error, info_span};
use bundler::RunRequest;
use clap::{Parser, Subcommand};
use config::ServerConfig;
use service::Service;
use tokio_util::sync::CancellationToken;

mod config;
mod http_objects;
mod metrics;
mod routes;
mod service;
#[cfg(test)]
mod testing;
mod tracing;
use tracing::setup_tracing;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "config file", help = "Path to config file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve bundle requests over HTTP (the default).
    Serve,
    /// Bundle one tag, print the outcome as JSON and exit.
    Bundle {
        tag: String,
        #[arg(long, help = "Lifetime of the access URL in seconds")]
        ttl_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ServerConfig::from_path(path),
        None => ServerConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    setup_tracing(&config);

    let root_span = info_span!("bundle-server", env = config.env);
    let _guard = root_span.enter();

    let service = match Service::new(config).await {
        Ok(service) => service,
        Err(err) => {
            error!("Error creating service: {:?}", err);
            return ExitCode::FAILURE;
        }
    };

    let code = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => match service.start().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!("Error starting service: {:?}", err);
                ExitCode::FAILURE
            }
        },
        Command::Bundle { tag, ttl_secs } => bundle_once(&service, tag, ttl_secs).await,
    };
    service.shutdown_metrics();
    code
}

async fn bundle_once(service: &Service, tag: String, ttl_secs: Option<u64>) -> ExitCode {
    let ttl = match http_objects::parse_ttl(ttl_secs) {
        Ok(ttl) => ttl,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let request = RunRequest::by_tag(tag).with_ttl(ttl).with_cancel(cancel);
    let outcome = service.orchestrator.run_request(request).await;
    match serde_json::to_string_pretty(&outcome) {
        Ok(body) => println!("{}", body),
        Err(err) => {
            error!("Error serializing outcome: {:?}", err);
            return ExitCode::FAILURE;
        }
    }

    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
