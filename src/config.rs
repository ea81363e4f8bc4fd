//! The TOML configuration file.
//!
//! ```toml
//! access_token = "hf_..."
//! router_url = "https://router.huggingface.co"
//! timeout_secs = 60
//! registry = "/path/to/registry.json"
//!
//! [providers.together]
//! priority = 200
//!
//! [providers.fal-ai]
//! base_url = "https://fal.run"
//! ```
//!
//! The file is looked up in `~/.config/xinfer/config.toml`, `~/.xinfer.toml` and
//! `/etc/xinfer.toml`, unless a path is given explicitly. Keys the
//! configuration does not know are reported and ignored.

use std::collections::BTreeMap;
use std::env::VarError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml;
use tracing::warn;

use crate::providers::ProviderId;
use crate::registry::RegistryError;
use crate::transport;

const ACCESS_TOKEN_ENV_VAR: &str = "HF_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config \"{}\"", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(
        #[from]
        #[source]
        toml::de::Error,
    ),
    #[error("failed to parse {0}")]
    Environment(&'static str),
    #[error("config names provider \"{0}\" which does not exist")]
    UnknownProvider(String),
    #[error("failed to load the model registry: {0}")]
    Registry(
        #[from]
        #[source]
        RegistryError,
    ),
    #[error("failed to initialize the HTTP transport: {0}")]
    Transport(#[source] transport::Error),
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Overrides the provider's own base URL when calling it directly.
    pub base_url: Option<String>,
    pub priority: Option<u8>,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
    pub access_token: Option<String>,
    pub router_url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// A JSON registry document replacing the built-in registry.
    pub registry: Option<PathBuf>,
    /// Per-provider settings, keyed by provider identifier.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Config {
    /// Parses a configuration document, warning about unknown keys.
    pub fn from_toml(raw_config: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::de::from_str(raw_config)?;

        for id in config.providers.keys() {
            if ProviderId::from_str(id).is_err() {
                return Err(ConfigError::UnknownProvider(id.clone()));
            }
        }

        warn_on_extra_fields(&config, raw_config)?;

        Ok(config)
    }

    /// The configured access token, or the `HF_TOKEN` environment variable.
    pub fn access_token(&self) -> Result<Option<String>, ConfigError> {
        if let Some(token) = &self.access_token {
            return Ok(Some(token.clone()));
        }

        match std::env::var(ACCESS_TOKEN_ENV_VAR) {
            Ok(token) if !token.is_empty() => Ok(Some(token)),
            Ok(_) => Ok(None),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => Err(ConfigError::Environment(ACCESS_TOKEN_ENV_VAR)),
        }
    }

    pub fn provider(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(&id.to_string())
    }

    /// The provider tables with known provider identifiers.
    pub fn providers(&self) -> impl Iterator<Item = (ProviderId, &ProviderConfig)> {
        self.providers
            .iter()
            .filter_map(|(id, config)| ProviderId::from_str(id).ok().map(|id| (id, config)))
    }
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/xinfer/config.toml", ".xinfer.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/xinfer.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn warn_on_extra_fields_helper<'a>(
    path: &mut Vec<&'a String>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        if let Some(config_value) = config.get(user_key) {
            if let (toml::Value::Table(user_value), toml::Value::Table(config_value)) =
                (user_value, config_value)
            {
                warn_on_extra_fields_helper(path, user_value, config_value)
            }
        } else {
            let path: Vec<&str> = path.iter().map(|&s| s.as_str()).collect();

            warn!(
                "config contains extraneous key \"{}\", ignoring",
                path.join(".")
            );
        }

        path.pop();
    }
}

fn warn_on_extra_fields(config: &Config, raw_config: &str) -> Result<(), ConfigError> {
    let user_config: toml::Table = toml::de::from_str(raw_config)?;

    // Keys the configuration knows about survive a round trip.
    let config = match toml::Value::try_from(config) {
        Ok(toml::Value::Table(config)) => config,
        _ => return Ok(()),
    };

    let mut path = Vec::new();

    warn_on_extra_fields_helper(&mut path, &user_config, &config);

    Ok(())
}

/// Reads the configuration at `path`, or at the first default location that
/// exists. Without a configuration file the defaults are used.
pub fn read_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path.map(Path::to_path_buf).or_else(get_config_path);

    match config_path {
        Some(path) => {
            let raw_config = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Read { path, source })?;

            Config::from_toml(&raw_config)
        }
        None => Ok(Config::default()),
    }
}
