use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    time::Duration,
};

use clap::Parser;
use thiserror::Error;
use tracing::Level;

use crate::analyser::ProbeSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown environment {0:?}, expected one of dev, test, production")]
    UnknownEnv(String),
    #[error("probe concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Command line arguments. Anything left unset falls back to the defaults of the selected
/// environment.
#[derive(Debug, Parser)]
#[command(name = "url-analyser", version, about = "Serve structural reports for web pages")]
pub(crate) struct Args {
    /// The environment in which the server is running: dev, test or production
    #[arg(long, default_value = "dev")]
    pub(crate) env: String,

    /// Address to listen on
    #[arg(long)]
    pub(crate) ip: Option<IpAddr>,

    /// Port to listen on
    #[arg(long)]
    pub(crate) port: Option<u16>,

    /// Directory holding the web client
    #[arg(long)]
    pub(crate) static_dir: Option<PathBuf>,

    /// Maximum log level
    #[arg(long, default_value = "info")]
    pub(crate) log_level: Level,

    /// Maximum number of links probed at once
    #[arg(long)]
    pub(crate) probe_concurrency: Option<usize>,

    /// Seconds after which an unanswered link counts as inaccessible
    #[arg(long)]
    pub(crate) probe_timeout: Option<u64>,

    /// Seconds to wait for the page being analysed
    #[arg(long)]
    pub(crate) page_timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Config {
    pub(crate) env: String,
    pub(crate) ip: IpAddr,
    pub(crate) port: u16,
    pub(crate) static_dir: PathBuf,
    pub(crate) log_level: Level,
    pub(crate) page_timeout: Duration,
    pub(crate) probe: ProbeSettings,
}

impl Config {
    /// Defaults for a named environment.
    pub(crate) fn for_env(env: &str) -> Result<Self, ConfigError> {
        let (ip, port, log_level) = match env {
            "dev" => (Ipv4Addr::UNSPECIFIED, 8080, Level::DEBUG),
            "test" => (Ipv4Addr::LOCALHOST, 8081, Level::DEBUG),
            "production" => (Ipv4Addr::UNSPECIFIED, 80, Level::INFO),
            other => return Err(ConfigError::UnknownEnv(other.to_string())),
        };

        Ok(Self {
            env: env.to_string(),
            ip: ip.into(),
            port,
            static_dir: PathBuf::from("./public"),
            log_level,
            page_timeout: Duration::from_secs(30),
            probe: ProbeSettings::default(),
        })
    }

    /// Environment defaults overridden by whatever was given on the command line.
    pub(crate) fn from_args(args: Args) -> Result<Self, ConfigError> {
        let mut config = Self::for_env(&args.env)?;

        if let Some(ip) = args.ip {
            config.ip = ip;
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(static_dir) = args.static_dir {
            config.static_dir = static_dir;
        }
        if let Some(concurrency) = args.probe_concurrency {
            if concurrency == 0 {
                return Err(ConfigError::ZeroConcurrency);
            }
            config.probe.concurrency = concurrency;
        }
        if let Some(secs) = args.probe_timeout {
            config.probe.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = args.page_timeout {
            config.page_timeout = Duration::from_secs(secs);
        }
        config.log_level = args.log_level;

        Ok(config)
    }
}
