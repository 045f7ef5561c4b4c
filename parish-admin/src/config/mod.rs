use secrecy::Secret;
use serde::Deserialize;
use service_core::config::Environment;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub environment: Environment,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    pub server: ServerSettings,
    pub hosted: HostedSettings,
    pub ancillary: AncillarySettings,
    #[serde(default)]
    pub database: DatabaseSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Mark the session cookie `Secure`. Required in production.
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_session_hours")]
    pub session_hours: i64,
    /// Reverse proxies whose `x-forwarded-for` names the visitor.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

/// Hosted identity provider (GoTrue REST API).
#[derive(Deserialize, Clone)]
pub struct HostedSettings {
    pub url: String,
    pub anon_key: Secret<String>,
}

/// Homily API used for podcast management.
#[derive(Deserialize, Clone)]
pub struct AncillarySettings {
    pub url: String,
}

/// Role-assignment storage. Without a URL an in-memory directory is used.
#[derive(Deserialize, Clone, Default)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: Option<Secret<String>>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_session_hours() -> i64 {
    24
}

fn default_max_connections() -> u32 {
    5
}

impl Settings {
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server.session_hours <= 0 {
            return Err(config::ConfigError::Message(
                "server.session_hours must be positive".to_string(),
            ));
        }

        if self.environment.is_prod() {
            if !self.server.secure_cookies {
                return Err(config::ConfigError::Message(
                    "server.secure_cookies must be enabled in production".to_string(),
                ));
            }
            if self.database.url.is_none() {
                return Err(config::ConfigError::Message(
                    "database.url is required in production".to_string(),
                ));
            }
        }

        Ok(())
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;

    let configuration_directory = configuration_directory(base_path);

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.trusted_proxies"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

/// Works from the workspace root and from the crate directory.
fn configuration_directory(base_path: PathBuf) -> PathBuf {
    if base_path.ends_with("parish-admin") {
        base_path.join("config")
    } else {
        base_path.join("parish-admin").join("config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_directory_from_workspace_root() {
        assert_eq!(
            configuration_directory(PathBuf::from("/srv/parish")),
            PathBuf::from("/srv/parish/parish-admin/config")
        );
        assert_eq!(
            configuration_directory(PathBuf::from("/srv/parish/parish-admin")),
            PathBuf::from("/srv/parish/parish-admin/config")
        );
    }
}
