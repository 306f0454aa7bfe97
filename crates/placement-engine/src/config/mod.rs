use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::placement::{EngineConfig, OfferExclusivity, PlacedStudentPolicy};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the placement service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: load_engine()?,
        })
    }
}

fn load_engine() -> Result<EngineConfig, ConfigError> {
    let defaults = EngineConfig::default();

    let placed_student_policy = match env::var("PLACEMENT_PLACED_POLICY") {
        Ok(raw) => PlacedStudentPolicy::parse(&raw)
            .ok_or(ConfigError::InvalidPlacedPolicy { value: raw })?,
        Err(_) => defaults.placed_student_policy,
    };

    let offer_exclusivity = match env::var("PLACEMENT_OFFER_EXCLUSIVITY") {
        Ok(raw) => OfferExclusivity::parse(&raw)
            .ok_or(ConfigError::InvalidOfferExclusivity { value: raw })?,
        Err(_) => defaults.offer_exclusivity,
    };

    let max_commit_attempts = match env::var("PLACEMENT_COMMIT_ATTEMPTS") {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|attempts| *attempts >= 1)
            .ok_or(ConfigError::InvalidCommitAttempts)?,
        Err(_) => defaults.max_commit_attempts,
    };

    Ok(EngineConfig {
        placed_student_policy,
        offer_exclusivity,
        max_commit_attempts,
    })
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPlacedPolicy { value: String },
    InvalidOfferExclusivity { value: String },
    InvalidCommitAttempts,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPlacedPolicy { value } => write!(
                f,
                "PLACEMENT_PLACED_POLICY '{value}' must be one of block, allow, higher_category"
            ),
            ConfigError::InvalidOfferExclusivity { value } => write!(
                f,
                "PLACEMENT_OFFER_EXCLUSIVITY '{value}' must be at_acceptance or at_selection"
            ),
            ConfigError::InvalidCommitAttempts => {
                write!(f, "PLACEMENT_COMMIT_ATTEMPTS must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "PLACEMENT_PLACED_POLICY",
            "PLACEMENT_OFFER_EXCLUSIVITY",
            "PLACEMENT_COMMIT_ATTEMPTS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_engine_settings_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PLACEMENT_PLACED_POLICY", "higher_category");
        env::set_var("PLACEMENT_OFFER_EXCLUSIVITY", "at_selection");
        env::set_var("PLACEMENT_COMMIT_ATTEMPTS", "9");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.engine.placed_student_policy,
            PlacedStudentPolicy::HigherCategoryOnly
        );
        assert_eq!(config.engine.offer_exclusivity, OfferExclusivity::AtSelection);
        assert_eq!(config.engine.max_commit_attempts, 9);
        reset_env();
    }

    #[test]
    fn rejects_unknown_policy_and_zero_attempts() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PLACEMENT_PLACED_POLICY", "sometimes");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidPlacedPolicy { .. })
        ));

        reset_env();
        env::set_var("PLACEMENT_COMMIT_ATTEMPTS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidCommitAttempts)
        ));
        reset_env();
    }
}
