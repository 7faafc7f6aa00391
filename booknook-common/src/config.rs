//! Configuration loading and secret resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority, handled by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Document store secrets are environment-only and have no default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the store project
pub const ENV_STORE_PROJECT_ID: &str = "BOOKNOOK_STORE_PROJECT_ID";
/// Environment variable naming the store service account
pub const ENV_STORE_CLIENT_EMAIL: &str = "BOOKNOOK_STORE_CLIENT_EMAIL";
/// Environment variable holding the store service account private key
pub const ENV_STORE_PRIVATE_KEY: &str = "BOOKNOOK_STORE_PRIVATE_KEY";
/// Environment variable overriding the data directory
pub const ENV_DATA_DIR: &str = "BOOKNOOK_DATA_DIR";

/// Contents of `config.toml`
///
/// Every key is optional; absent keys fall through to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub catalog_base_url: Option<String>,
    pub catalog_api_key: Option<String>,
    pub app_id: Option<String>,
    pub public_project_id: Option<String>,
    pub auth_domain: Option<String>,
}

impl TomlConfig {
    /// Load from an explicit path, or from the platform default location
    ///
    /// A missing file is not an error: defaults apply and a debug line is
    /// logged. A file that exists but does not parse is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => {
                    debug!("No config.toml found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// First existing config file: user config dir, then `/etc/booknook`
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("booknook").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/booknook/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Resolve an optional setting: ENV → TOML
///
/// Blank values count as absent.
pub fn resolve_optional(env_var: &str, toml_value: Option<&str>) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        if !value.trim().is_empty() {
            return Some(value);
        }
        warn!("{} is set but blank, ignoring", env_var);
    }

    toml_value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Resolve a required setting: ENV → TOML, failing with the variable name
pub fn resolve_required(env_var: &str, toml_value: Option<&str>) -> Result<String> {
    resolve_optional(env_var, toml_value).ok_or_else(|| {
        Error::Config(format!(
            "{} is not configured. Set the environment variable or add the key to config.toml",
            env_var
        ))
    })
}

/// Resolve the data directory: ENV → TOML → platform default
pub fn resolve_data_dir(toml_value: Option<&Path>) -> PathBuf {
    if let Ok(path) = std::env::var(ENV_DATA_DIR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default_data_dir()
}

/// OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("booknook"))
        .unwrap_or_else(|| PathBuf::from("./booknook_data"))
}

/// Privileged credentials for the document store
#[derive(Clone, PartialEq, Eq)]
pub struct StoreCredentials {
    pub project_id: String,
    pub client_email: String,
    /// PEM private key with real newlines
    pub private_key: String,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"******")
            .finish()
    }
}

impl StoreCredentials {
    /// Read credentials from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup
    ///
    /// Fails on the first absent or blank secret, naming it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |key: &'static str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(Error::MissingSecret(key)),
            }
        };

        let project_id = fetch(ENV_STORE_PROJECT_ID)?;
        let client_email = fetch(ENV_STORE_CLIENT_EMAIL)?;
        let private_key = unescape_private_key(&fetch(ENV_STORE_PRIVATE_KEY)?);

        if !looks_like_pem_key(&private_key) {
            return Err(Error::Config(format!(
                "{} does not contain a PEM private key",
                ENV_STORE_PRIVATE_KEY
            )));
        }

        Ok(Self {
            project_id,
            client_email,
            private_key,
        })
    }

    /// Log which secrets are present without revealing them
    pub fn log_presence<F>(lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in [ENV_STORE_PROJECT_ID, ENV_STORE_CLIENT_EMAIL, ENV_STORE_PRIVATE_KEY] {
            let state = if lookup(key).is_some() { "******" } else { "NOT FOUND" };
            info!("{}: {}", key, state);
        }
    }
}

/// Turn literal `\n` sequences into newlines
///
/// Keys stored in single-line environment variables arrive escaped.
pub fn unescape_private_key(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

fn looks_like_pem_key(key: &str) -> bool {
    let trimmed = key.trim();
    trimmed.starts_with("-----BEGIN") && trimmed.contains("PRIVATE KEY-----")
}
