use clap::builder::TypedValueParser as _;
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use log::LevelFilter;
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Pub/sub channel shared by every relay instance in broker mode.
pub const DEFAULT_BROKER_CHANNEL: &str = "ci_cd_alerts";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl fmt::Display for RustEnvParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "expected one of: development, production, staging")
    }
}

impl StdError for RustEnvParseError {}

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

/// How an ingested webhook reaches connected viewers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RelayMode {
    /// Broadcast straight to this instance's SSE clients.
    Local,
    /// Publish to the broker channel; every subscribed instance broadcasts to its own clients.
    Broker,
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RelayMode::Local => write!(f, "local"),
            RelayMode::Broker => write!(f, "broker"),
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    ZeroHeartbeatInterval,
    HeartbeatNotBelowIdleTimeout {
        heartbeat_interval_secs: u64,
        upstream_idle_timeout_secs: u64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::ZeroHeartbeatInterval => {
                write!(f, "heartbeat interval must be greater than zero")
            }
            ConfigError::HeartbeatNotBelowIdleTimeout {
                heartbeat_interval_secs,
                upstream_idle_timeout_secs,
            } => write!(
                f,
                "heartbeat interval ({heartbeat_interval_secs}s) must be shorter than the upstream idle timeout ({upstream_idle_timeout_secs}s)"
            ),
        }
    }
}

impl StdError for ConfigError {}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "localhost")]
    pub interface: String,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 5500)]
    pub port: u16,

    /// Override the log level verbosity threshold. When unset the level follows the
    /// runtime environment: INFO in production, DEBUG everywhere else.
    #[arg(
        short,
        long,
        env,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)),
        )]
    pub log_level_filter: Option<LevelFilter>,

    /// Directory for `combined.log` and `error.log`. Logs only go to the terminal when unset.
    #[arg(long, env)]
    pub log_dir: Option<PathBuf>,

    /// Set the Rust runtime environment to use.
    #[arg(short, long, env, default_value_t = RustEnv::Development)]
    pub runtime_env: RustEnv,

    /// Whether webhooks are broadcast locally or bridged through the broker.
    #[arg(long, env, value_enum, default_value_t = RelayMode::Local)]
    pub relay_mode: RelayMode,

    /// Redis URL of the pub/sub broker (broker mode only)
    #[arg(long, env, default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Channel used for both publishing and subscribing in broker mode
    #[arg(long, env, default_value = DEFAULT_BROKER_CHANNEL)]
    pub broker_channel: String,

    /// Seconds between keepalive frames on every open event stream
    #[arg(long, env, default_value_t = 8)]
    pub heartbeat_interval_secs: u64,

    /// Idle timeout, in seconds, of the proxy in front of the relay. Heartbeats must
    /// arrive more often than this.
    #[arg(long, env, default_value_t = 10)]
    pub upstream_idle_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Checks invariants clap cannot express on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::ZeroHeartbeatInterval);
        }
        if self.heartbeat_interval_secs >= self.upstream_idle_timeout_secs {
            return Err(ConfigError::HeartbeatNotBelowIdleTimeout {
                heartbeat_interval_secs: self.heartbeat_interval_secs,
                upstream_idle_timeout_secs: self.upstream_idle_timeout_secs,
            });
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn upstream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_idle_timeout_secs)
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.interface, self.port)
    }

    /// Effective log level: the explicit override, else derived from the runtime environment.
    pub fn log_level(&self) -> LevelFilter {
        match self.log_level_filter {
            Some(level) => level,
            None if self.is_production() => LevelFilter::Info,
            None => LevelFilter::Debug,
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
