use secrecy::{ExposeSecret, Secret};
use service_core::config::{self as core_config, get_env, get_env_parsed, get_optional_env, Environment};
use service_core::error::AppError;
use std::net::IpAddr;

/// Shortest signing secret accepted for HS256.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    pub admin_bootstrap: Option<AdminBootstrapConfig>,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<Secret<String>>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub expiry_hours: i64,
}

/// Credentials for the first ADMIN account, provisioned at start.
#[derive(Debug, Clone)]
pub struct AdminBootstrapConfig {
    pub email: String,
    pub password: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Peers allowed to name the caller in `x-forwarded-for`.
    pub trusted_proxies: Vec<IpAddr>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let environment = Environment::from_env()?;
        let is_prod = environment.is_prod();

        let backend = get_env("STORAGE_BACKEND", Some("postgres"), is_prod)?.parse()?;
        let database_url = get_optional_env("DATABASE_URL").map(Secret::new);

        let config = ApiConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("homily-api"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            storage: StorageConfig {
                backend,
                database_url,
                max_connections: get_env_parsed("DATABASE_MAX_CONNECTIONS", Some("5"), is_prod)?,
            },
            jwt: JwtConfig {
                // No default: a missing secret stops the process.
                secret: Secret::new(get_env("JWT_SECRET", None, is_prod)?),
                expiry_hours: get_env_parsed("JWT_EXPIRY_HOURS", Some("24"), is_prod)?,
            },
            admin_bootstrap: admin_bootstrap_from_env(),
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?.parse()?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_env_parsed("RATE_LIMIT_LOGIN_ATTEMPTS", Some("10"), is_prod)?,
                login_window_seconds: get_env_parsed(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    Some("900"),
                    is_prod,
                )?,
                global_ip_limit: get_env_parsed("RATE_LIMIT_GLOBAL_IP_LIMIT", Some("300"), is_prod)?,
                global_ip_window_seconds: get_env_parsed(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                trusted_proxies: parse_trusted_proxies(
                    get_optional_env("TRUSTED_PROXIES").as_deref().unwrap_or_default(),
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.secret.expose_secret().len() < MIN_JWT_SECRET_LEN {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            )));
        }

        if self.jwt.expiry_hours <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_EXPIRY_HOURS must be positive"
            )));
        }

        if self.rate_limit.login_attempts == 0 || self.rate_limit.login_window_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Login rate limit must allow at least one attempt per window"
            )));
        }

        if self.storage.backend == StorageBackend::Postgres && self.storage.database_url.is_none()
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_URL is required for the postgres storage backend"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.storage.backend == StorageBackend::Memory {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "In-memory storage is not allowed in production"
                )));
            }
        }

        Ok(())
    }
}

/// Comma-separated IP addresses; empty means no proxy is trusted.
fn parse_trusted_proxies(raw: &str) -> Result<Vec<IpAddr>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("TRUSTED_PROXIES entry {} is invalid: {}", s, e))
            })
        })
        .collect()
}

/// Both halves must be present; a partial pair disables bootstrap.
fn admin_bootstrap_from_env() -> Option<AdminBootstrapConfig> {
    match (get_optional_env("ADMIN_EMAIL"), get_optional_env("ADMIN_PASSWORD")) {
        (Some(email), Some(password)) => Some(AdminBootstrapConfig {
            email,
            password: Secret::new(password),
        }),
        _ => None,
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(AppError::ConfigError(anyhow::anyhow!(
                "Invalid storage backend: {}",
                s
            ))),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(AppError::ConfigError(anyhow::anyhow!(
                "Invalid swagger mode: {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ApiConfig {
        ApiConfig {
            common: core_config::Config { port: 8080 },
            environment: Environment::Dev,
            service_name: "homily-api".to_string(),
            service_version: "test".to_string(),
            log_level: "error".to_string(),
            otlp_endpoint: None,
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                database_url: None,
                max_connections: 1,
            },
            jwt: JwtConfig {
                secret: Secret::new("0123456789abcdef0123456789abcdef".to_string()),
                expiry_hours: 24,
            },
            admin_bootstrap: None,
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            swagger: SwaggerConfig {
                enabled: SwaggerMode::Disabled,
            },
            rate_limit: RateLimitConfig {
                login_attempts: 10,
                login_window_seconds: 900,
                global_ip_limit: 300,
                global_ip_window_seconds: 60,
                trusted_proxies: Vec::new(),
            },
        }
    }

    #[test]
    fn test_sample_config_is_valid() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_short_secret_is_fatal() {
        let mut config = sample_config();
        config.jwt.secret = Secret::new("changeme".to_string());
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_prod_rejects_wildcard_origin() {
        let mut config = sample_config();
        config.environment = Environment::Prod;
        config.storage.backend = StorageBackend::Postgres;
        config.storage.database_url = Some(Secret::new("postgres://localhost/homilies".into()));
        config.security.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trusted_proxies_parsing() {
        assert!(parse_trusted_proxies("").unwrap().is_empty());
        assert_eq!(
            parse_trusted_proxies("127.0.0.1, ::1").unwrap(),
            vec!["127.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]
        );
        assert!(matches!(
            parse_trusted_proxies("127.0.0.1,proxy.internal"),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let mut config = sample_config();
        config.storage.backend = StorageBackend::Postgres;
        assert!(config.validate().is_err());
    }
}
