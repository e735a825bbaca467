use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

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

    /// Redis URL of the shared event bus. When unset, events are only
    /// distributed within this process.
    #[arg(long, env)]
    redis_url: Option<String>,

    /// Bus channel shared by every instance in the deployment. Instances on
    /// different channels never see each other's events.
    #[arg(long, env, default_value = events::DEFAULT_BUS_CHANNEL)]
    bus_channel: String,

    /// Number of undelivered messages each SSE client may have queued before
    /// new messages for it are dropped.
    #[arg(
        long,
        env,
        default_value_t = events::DEFAULT_CLIENT_CAPACITY,
        value_parser = parse_capacity,
    )]
    pub client_buffer_capacity: usize,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

fn parse_capacity(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("capacity must be at least 1".to_string()),
        Ok(capacity) => Ok(capacity),
        Err(e) => Err(e.to_string()),
    }
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

    /// Returns the Redis bus URL, if configured.
    pub fn redis_url(&self) -> Option<&str> {
        self.redis_url.as_deref()
    }

    pub fn bus_channel(&self) -> &str {
        &self.bus_channel
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["shiftboard"]);

        assert_eq!(config.bus_channel(), events::DEFAULT_BUS_CHANNEL);
        assert_eq!(config.client_buffer_capacity, events::DEFAULT_CLIENT_CAPACITY);
        assert!(!config.is_production());
    }

    #[test]
    fn test_bus_flags() {
        let config = Config::parse_from([
            "shiftboard",
            "--redis-url",
            "redis://cache:6379",
            "--bus-channel",
            "staging:events",
            "--client-buffer-capacity",
            "16",
            "--runtime-env",
            "production",
        ]);

        assert_eq!(config.redis_url(), Some("redis://cache:6379"));
        assert_eq!(config.bus_channel(), "staging:events");
        assert_eq!(config.client_buffer_capacity, 16);
        assert!(config.is_production());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = Config::try_parse_from(["shiftboard", "--client-buffer-capacity", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_runtime_env_parses_case_insensitively() {
        assert_eq!("Staging".parse::<RustEnv>(), Ok(RustEnv::Staging));
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
        assert_eq!(RustEnv::Production.to_string(), "production");
    }
}
