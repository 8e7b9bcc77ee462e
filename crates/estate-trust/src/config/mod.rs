use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Deployment stage; `Test` also selects cheap password hashing.
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

/// Settings read from `APP_*` environment variables (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::parse(&var_or("APP_ENV", "development"));
        Ok(Self {
            environment,
            server: ServerConfig::from_env()?,
            telemetry: TelemetryConfig::from_env()?,
            storage: StorageConfig::from_env(),
            auth: AuthConfig::from_env(environment)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        Ok(Self {
            host: var_or("APP_HOST", "127.0.0.1"),
            port,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::from([127, 0, 0, 1])
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
    pub format: LogFormat,
}

impl TelemetryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat(raw))?,
            Err(_) => LogFormat::Compact,
        };
        Ok(Self {
            log_level: var_or("APP_LOG_LEVEL", "info"),
            format,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Where uploaded listing images and KYC documents land.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    /// Explicit `APP_PUBLIC_BASE_URL`, without a trailing slash. When unset,
    /// object URLs point at this server's `/uploads` route.
    pub public_base_url: Option<String>,
}

impl StorageConfig {
    fn from_env() -> Self {
        Self {
            upload_dir: PathBuf::from(var_or("APP_UPLOAD_DIR", "uploads")),
            public_base_url: env::var("APP_PUBLIC_BASE_URL")
                .ok()
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
        }
    }

    /// Prefix for object URLs. Resolve it only after host and port overrides
    /// have been applied to `server`.
    pub fn base_url_for(&self, server: &ServerConfig) -> String {
        match &self.public_base_url {
            Some(url) => url.clone(),
            None => format!("http://{}:{}/uploads", server.host, server.port),
        }
    }
}

/// Session lifetime and password hashing cost.
/// Upper bound for `APP_SESSION_TTL_HOURS`: one year.
pub const MAX_SESSION_TTL_HOURS: u32 = 24 * 366;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_ttl_hours: u32,
    pub password_cost: PasswordCost,
}

impl AuthConfig {
    fn from_env(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let session_ttl_hours = var_or("APP_SESSION_TTL_HOURS", "720")
            .parse::<u32>()
            .ok()
            .filter(|hours| (1..=MAX_SESSION_TTL_HOURS).contains(hours))
            .ok_or(ConfigError::InvalidSessionTtl)?;
        let password_cost = match environment {
            AppEnvironment::Test => PasswordCost::Testing,
            AppEnvironment::Development | AppEnvironment::Production => PasswordCost::Standard,
        };
        Ok(Self {
            session_ttl_hours,
            password_cost,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCost {
    Standard,
    /// Low-memory Argon2 parameters; only for tests and demos.
    Testing,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost {
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("APP_LOG_FORMAT must be 'compact' or 'json' (found '{0}')")]
    InvalidLogFormat(String),
    #[error("APP_SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}")]
    InvalidSessionTtl,
}
