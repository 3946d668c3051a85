//! Environment-driven settings for the API binary and the document pipeline.
//!
//! A `.env` file is honored when present; real environment variables take
//! precedence over it.

use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_OCR_LANGUAGE: &str = "eng";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Deployment stage, from `APP_ENV`. Unrecognized values fall back to
/// development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub documents: DocumentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            environment: AppEnvironment::parse(&env_or("APP_ENV", "development")),
            server: ServerConfig::from_env()?,
            telemetry: TelemetryConfig {
                log_level: env_or("APP_LOG_LEVEL", DEFAULT_LOG_LEVEL),
            },
            documents: DocumentConfig::from_env()?,
        })
    }
}

/// Listening address for the HTTP server. CLI flags may override both fields.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_port = env_or("APP_PORT", &DEFAULT_PORT.to_string());
        let port = raw_port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort { value: raw_port })?;

        Ok(Self {
            host: env_or("APP_HOST", DEFAULT_HOST),
            port,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
                .parse()
                .map_err(|source| ConfigError::InvalidHost { source })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// OCR language data and the request body ceiling for uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentConfig {
    /// Directory holding `*.traineddata`; libtesseract's default lookup when unset.
    pub tessdata_dir: Option<PathBuf>,
    pub ocr_language: String,
    pub max_upload_bytes: usize,
}

impl DocumentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_upload_bytes = match env::var("VISA_MAX_UPLOAD_BYTES") {
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(bytes) if bytes > 0 => bytes,
                _ => return Err(ConfigError::InvalidUploadLimit { value: raw }),
            },
        };

        Ok(Self {
            tessdata_dir: env::var("VISA_TESSDATA_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            ocr_language: env_or("VISA_OCR_LANGUAGE", DEFAULT_OCR_LANGUAGE),
            max_upload_bytes,
        })
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            tessdata_dir: None,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort { value: String },
    InvalidHost { source: std::net::AddrParseError },
    InvalidUploadLimit { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort { value } => {
                write!(f, "APP_PORT must be a port number, got '{value}'")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must be 'localhost' or an IP address")
            }
            ConfigError::InvalidUploadLimit { value } => {
                write!(f, "VISA_MAX_UPLOAD_BYTES must be a positive byte count, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort { .. } | ConfigError::InvalidUploadLimit { .. } => None,
        }
    }
}
