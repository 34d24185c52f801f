//! mqttc - command-line MQTT client
//!
//! `publish` sends one message to each topic and exits; `subscribe` logs
//! incoming messages until interrupted.

use clap::Parser;
use mqttc::cli::{Cli, Commands, PublishArgs, SubscribeArgs};
use mqttc::commands::{publish, subscribe};
use mqttc::error::{CliError, CliResult};
use mqttc::observability::init_cli_logging;
use mqttc::profile::ConnectionProfile;
use mqttc::transport::mqtt::MqttSession;
use std::io::BufReader;
use std::process::ExitCode;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_cli_logging(cli.command.connection().verbose);

    let result = match cli.command {
        Commands::Publish(args) => run_publish(args).await,
        Commands::Subscribe(args) => run_subscribe(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run_publish(args: PublishArgs) -> CliResult<()> {
    let source = args.body_source();
    let options = args.connection.resolve(&mut rand::thread_rng())?;
    let mut session = MqttSession::new(&ConnectionProfile::derive(&options))?;

    let mut stdin = BufReader::new(std::io::stdin());
    publish::run(&mut session, &options, &source, &mut stdin).await
}

async fn run_subscribe(args: SubscribeArgs) -> CliResult<()> {
    let options = args.connection.resolve(&mut rand::thread_rng())?;
    let mut session = MqttSession::new(&ConnectionProfile::derive(&options))?;

    let mut sigint = signal(SignalKind::interrupt()).map_err(CliError::Signal)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(CliError::Signal)?;

    // The session is dropped on return, which stops its event loop
    tokio::select! {
        result = subscribe::run(&mut session, &options) => result,
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
            Ok(())
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
            Ok(())
        }
    }
}
