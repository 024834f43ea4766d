use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_APPROVE_BELOW: f64 = 0.25;
const DEFAULT_REJECT_ABOVE: f64 = 0.60;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scoring: ScoringConfig,
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

        let model_path = env::var("CREDIT_MODEL_PATH")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);
        let approve_below = threshold_var("CREDIT_APPROVE_BELOW", DEFAULT_APPROVE_BELOW)?;
        let reject_above = threshold_var("CREDIT_REJECT_ABOVE", DEFAULT_REJECT_ABOVE)?;

        let scoring = ScoringConfig {
            model_path,
            approve_below,
            reject_above,
        };
        scoring.validate()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scoring,
        })
    }
}

fn threshold_var(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidThreshold { name }),
        Err(_) => Ok(default),
    }
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Model artifact location and the probability cut-offs used by the decision policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub model_path: Option<PathBuf>,
    pub approve_below: f64,
    pub reject_above: f64,
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |value: f64| value.is_finite() && (0.0..=1.0).contains(&value);
        if !in_range(self.approve_below) {
            return Err(ConfigError::InvalidThreshold {
                name: "CREDIT_APPROVE_BELOW",
            });
        }
        if !in_range(self.reject_above) {
            return Err(ConfigError::InvalidThreshold {
                name: "CREDIT_REJECT_ABOVE",
            });
        }
        if self.approve_below > self.reject_above {
            return Err(ConfigError::ThresholdOrder {
                approve_below: self.approve_below,
                reject_above: self.reject_above,
            });
        }
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            approve_below: DEFAULT_APPROVE_BELOW,
            reject_above: DEFAULT_REJECT_ABOVE,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidThreshold {
        name: &'static str,
    },
    ThresholdOrder {
        approve_below: f64,
        reject_above: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidThreshold { name } => {
                write!(f, "{name} must be a probability between 0 and 1")
            }
            ConfigError::ThresholdOrder {
                approve_below,
                reject_above,
            } => write!(
                f,
                "approve threshold {approve_below} exceeds reject threshold {reject_above}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidThreshold { .. }
            | ConfigError::ThresholdOrder { .. } => None,
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
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("CREDIT_MODEL_PATH");
        env::remove_var("CREDIT_APPROVE_BELOW");
        env::remove_var("CREDIT_REJECT_ABOVE");
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
        assert_eq!(config.scoring, ScoringConfig::default());
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
    fn reads_scoring_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "prod");
        env::set_var("CREDIT_MODEL_PATH", "/srv/models/credit.json");
        env::set_var("CREDIT_APPROVE_BELOW", "0.2");
        env::set_var("CREDIT_REJECT_ABOVE", "0.4");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(
            config.scoring.model_path,
            Some(PathBuf::from("/srv/models/credit.json"))
        );
        assert_eq!(config.scoring.approve_below, 0.2);
        assert_eq!(config.scoring.reject_above, 0.4);
        reset_env();
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CREDIT_APPROVE_BELOW", "0.7");
        env::set_var("CREDIT_REJECT_ABOVE", "0.3");
        match AppConfig::load() {
            Err(ConfigError::ThresholdOrder { .. }) => {}
            other => panic!("expected threshold order error, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CREDIT_REJECT_ABOVE", "1.5");
        match AppConfig::load() {
            Err(ConfigError::InvalidThreshold { name }) => {
                assert_eq!(name, "CREDIT_REJECT_ABOVE")
            }
            other => panic!("expected invalid threshold, got {other:?}"),
        }
        reset_env();
    }
}
