use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

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

const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 35;
const DEVELOPMENT_SHARED_SECRET: &str = "scholar-intake-development-secret";

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub extraction: ExtractionConfig,
    pub submission: SubmissionConfig,
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

        let extraction = ExtractionConfig::from_env(environment, &host, port)?;
        let submission = SubmissionConfig {
            url: env::var("SUBMISSION_URL").unwrap_or_else(|_| {
                format!("http://{host}:{port}/api/v1/scholarship/applications")
            }),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            extraction,
            submission,
        })
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

/// Endpoints and credentials for the three structured-extraction channels.
#[derive(Clone)]
pub struct ExtractionConfig {
    pub id_url: String,
    pub grades_url: String,
    pub registration_url: String,
    pub shared_secret: String,
    pub timeout: Duration,
}

impl ExtractionConfig {
    fn from_env(environment: AppEnvironment, host: &str, port: u16) -> Result<Self, ConfigError> {
        let base = format!("http://{host}:{port}/webhooks/extract");
        let shared_secret = match env::var("EXTRACTION_SHARED_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingSharedSecret)
            }
            _ => DEVELOPMENT_SHARED_SECRET.to_string(),
        };

        let timeout_secs = match env::var("EXTRACTION_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidTimeout)?,
            Err(_) => DEFAULT_EXTRACTION_TIMEOUT_SECS,
        };

        Ok(Self {
            id_url: env::var("EXTRACTION_ID_URL").unwrap_or_else(|_| format!("{base}/id")),
            grades_url: env::var("EXTRACTION_COG_URL").unwrap_or_else(|_| format!("{base}/cog")),
            registration_url: env::var("EXTRACTION_COR_URL")
                .unwrap_or_else(|_| format!("{base}/cor")),
            shared_secret,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("id_url", &self.id_url)
            .field("grades_url", &self.grades_url)
            .field("registration_url", &self.registration_url)
            .field("shared_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Where the intake client posts assembled submissions.
#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    pub url: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    MissingSharedSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "EXTRACTION_TIMEOUT_SECS must be a positive number of seconds")
            }
            ConfigError::MissingSharedSecret => {
                write!(f, "EXTRACTION_SHARED_SECRET is required in production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidTimeout
            | ConfigError::MissingSharedSecret => None,
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
            "EXTRACTION_ID_URL",
            "EXTRACTION_COG_URL",
            "EXTRACTION_COR_URL",
            "EXTRACTION_SHARED_SECRET",
            "EXTRACTION_TIMEOUT_SECS",
            "SUBMISSION_URL",
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
        assert_eq!(config.extraction.timeout, Duration::from_secs(35));
        assert!(config.extraction.id_url.ends_with("/id"));
        assert!(config
            .submission
            .url
            .ends_with("/api/v1/scholarship/applications"));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn production_requires_shared_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        match AppConfig::load() {
            Err(ConfigError::MissingSharedSecret) => {}
            other => panic!("expected missing secret error, got {other:?}"),
        }

        env::set_var("EXTRACTION_SHARED_SECRET", "prod-secret");
        let config = AppConfig::load().expect("config loads with secret");
        assert_eq!(config.extraction.shared_secret, "prod-secret");
        reset_env();
    }

    #[test]
    fn rejects_zero_timeout() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("EXTRACTION_TIMEOUT_SECS", "0");
        assert!(matches!(AppConfig::load(), Err(ConfigError::InvalidTimeout)));
        reset_env();
    }

    #[test]
    fn debug_output_redacts_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads");
        let rendered = format!("{:?}", config.extraction);
        assert!(!rendered.contains(DEVELOPMENT_SHARED_SECRET));
        assert!(rendered.contains("<redacted>"));
    }
}
