//! Command-line surface
//!
//! Flags take precedence over `MQTT_*` environment variables, which take
//! precedence over the `[broker]` section of a `--config` profile file.

use crate::commands::publish::STDIN_MARKER;
use crate::commands::BodySource;
use crate::config::{ConfigError, ConnectOptions, ProfileFile, RawOptions};
use clap::{Args, Parser, Subcommand};
use rand::Rng;
use std::path::PathBuf;
use tracing::debug;

/// Command-line MQTT client
#[derive(Parser, Debug)]
#[command(name = "mqttc")]
#[command(about = "Publish to and subscribe from an MQTT broker")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish one message to every given topic
    Publish(PublishArgs),
    /// Subscribe to topics and log incoming messages
    Subscribe(SubscribeArgs),
}

impl Commands {
    /// Connection options shared by both commands
    pub fn connection(&self) -> &ConnectionArgs {
        match self {
            Commands::Publish(args) => &args.connection,
            Commands::Subscribe(args) => &args.connection,
        }
    }
}

/// Options shared by `publish` and `subscribe`
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Broker host name
    #[arg(short = 'H', long, env = "MQTT_HOST")]
    pub host: Option<String>,

    /// Broker port; 443 and 80 use WebSockets, 443 and 8884 use TLS
    #[arg(short, long, env = "MQTT_PORT")]
    pub port: Option<u16>,

    /// Client identifier (random when omitted)
    #[arg(short = 'c', long = "client-id")]
    pub client_id: Option<String>,

    #[arg(short, long, env = "MQTT_USERNAME")]
    pub username: Option<String>,

    #[arg(short = 'P', long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Client certificate (PEM), used together with --KeyFile
    #[arg(long = "CertFile", value_name = "FILE")]
    pub cert_file: Option<PathBuf>,

    /// Client private key (PEM), used together with --CertFile
    #[arg(long = "KeyFile", value_name = "FILE")]
    pub key_file: Option<PathBuf>,

    /// Extra CA bundle (PEM) trusted in addition to the system roots
    #[arg(long = "CARoot", value_name = "FILE")]
    pub ca_root: Option<PathBuf>,

    /// Topic to publish or subscribe to; repeat for several
    #[arg(short = 't', long = "topic", required = true)]
    pub topics: Vec<String>,

    /// Quality of service; anything but 0, 1 or 2 means 0
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub qos: i64,

    /// Keep-alive interval in seconds
    #[arg(long = "keep-alive", value_name = "SECS")]
    pub keep_alive_secs: Option<u64>,

    /// Log connection and publish details
    #[arg(long)]
    pub verbose: bool,

    /// TOML profile file with connection defaults
    #[arg(long, value_name = "FILE", env = "MQTT_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Merge with the profile file, if any, and validate
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> Result<ConnectOptions, ConfigError> {
        let config_path = self.config.clone();
        let mut raw = self.into_raw();

        if let Some(path) = config_path {
            debug!(path = %path.display(), "loading profile file");
            raw = raw.with_profile_file(ProfileFile::load_from_file(&path)?);
        }

        ConnectOptions::from_raw(raw, rng)
    }

    fn into_raw(self) -> RawOptions {
        RawOptions {
            host: self.host,
            port: self.port,
            client_id: self.client_id,
            username: self.username,
            password: self.password,
            cert_file: self.cert_file,
            key_file: self.key_file,
            ca_root: self.ca_root,
            topics: self.topics,
            // Out-of-range values become u8::MAX and then QoS 0
            qos: u8::try_from(self.qos).unwrap_or(u8::MAX),
            verbose: self.verbose,
            keep_alive_secs: self.keep_alive_secs,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Message body file, or `-` to read one line from stdin
    #[arg(value_name = "FILE", default_value = STDIN_MARKER)]
    pub body: String,

    /// Message body given inline
    #[arg(short, long, conflicts_with = "body")]
    pub message: Option<String>,
}

impl PublishArgs {
    pub fn body_source(&self) -> BodySource {
        BodySource::from_args(&self.body, self.message.clone())
    }
}

#[derive(Args, Debug, Clone)]
pub struct SubscribeArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}
