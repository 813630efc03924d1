//! Service configuration, read once at startup

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub mail: MailConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

/// Image host credentials and upload options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Destination folder on the image host
    pub folder: String,
    pub api_base: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    /// Login and sender address
    pub user: String,
    pub password: String,
    pub subject: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for registration records. Unset keeps them in memory.
    pub data_dir: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: "LinuxDiary5.0".to_string(),
            api_base: "https://api.cloudinary.com/v1_1".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            user: String::new(),
            password: String::new(),
            subject: "Welcome to LinuxDiary 5.0".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            timeout_ms: 10_000,
        }
    }
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Environment variables that override the credential settings.
const ENV_OVERRIDES: [&str; 6] = [
    "BACKEND_MAIL_USER",
    "BACKEND_MAIL_PASSWORD",
    "BACKEND_MAIL_HOST",
    "CLOUDINARY_CLOUD_NAME",
    "CLOUDINARY_KEY",
    "CLOUDINARY_SECRET",
];

impl Config {
    /// Reads `path` if it exists, applies environment overrides, and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&text)?
        } else {
            info!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies credential overrides from `lookup`, normally the process environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for key in ENV_OVERRIDES {
            let Some(value) = lookup(key).filter(|v| !v.is_empty()) else {
                continue;
            };
            let slot = match key {
                "BACKEND_MAIL_USER" => &mut self.mail.user,
                "BACKEND_MAIL_PASSWORD" => &mut self.mail.password,
                "BACKEND_MAIL_HOST" => &mut self.mail.host,
                "CLOUDINARY_CLOUD_NAME" => &mut self.upload.cloud_name,
                "CLOUDINARY_KEY" => &mut self.upload.api_key,
                "CLOUDINARY_SECRET" => &mut self.upload.api_secret,
                _ => continue,
            };
            *slot = value;
        }
    }

    /// Fails on the first missing credential.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("mail.user", &self.mail.user),
            ("mail.password", &self.mail.password),
            ("mail.host", &self.mail.host),
            ("upload.cloud_name", &self.upload.cloud_name),
            ("upload.api_key", &self.upload.api_key),
            ("upload.api_secret", &self.upload.api_secret),
        ];
        match required.iter().find(|(_, value)| value.is_empty()) {
            Some(&(key, _)) => Err(ConfigError::Missing(key)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FULL: &str = r#"
        [server]
        bind = "127.0.0.1:9000"

        [upload]
        cloud_name = "demo"
        api_key = "key"
        api_secret = "secret"

        [mail]
        host = "smtp.example.com"
        user = "events@example.com"
        password = "hunter2"
        timeout_ms = 5000

        [store]
        data_dir = "data/registrations"
    "#;

    #[test]
    fn parses_sections_and_fills_defaults() {
        let config = Config::from_toml(FULL).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.upload.folder, "LinuxDiary5.0");
        assert_eq!(config.mail.port, 587);
        assert_eq!(config.mail.timeout(), Duration::from_secs(5));
        assert_eq!(config.store.timeout_ms, 10_000);
        assert_eq!(
            config.store.data_dir.as_deref(),
            Some(Path::new("data/registrations"))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_names_first_missing_key() {
        let mut config = Config::from_toml(FULL).unwrap();
        config.mail.password.clear();
        config.upload.api_secret.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("mail.password"))
        ));

        assert!(matches!(
            Config::default().validate(),
            Err(ConfigError::Missing("mail.user"))
        ));
    }

    #[test]
    fn environment_overrides_credentials() {
        let env: HashMap<&str, &str> = [
            ("BACKEND_MAIL_USER", "env-user"),
            ("BACKEND_MAIL_PASSWORD", "env-pass"),
            ("BACKEND_MAIL_HOST", "smtp.env"),
            ("CLOUDINARY_CLOUD_NAME", "env-cloud"),
            ("CLOUDINARY_KEY", "env-key"),
            ("CLOUDINARY_SECRET", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::from_toml(FULL).unwrap();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.mail.user, "env-user");
        assert_eq!(config.mail.host, "smtp.env");
        assert_eq!(config.upload.cloud_name, "env-cloud");
        // empty values do not clobber the file
        assert_eq!(config.upload.api_secret, "secret");
    }
}
