//! Service configuration
//!
//! Resolves every setting the HTTP service needs from CLI overrides,
//! environment and `config.toml`, in that order. Required keys fail with
//! the environment variable to set.

use booknook_common::config::{resolve_data_dir, resolve_optional, resolve_required, TomlConfig};
use booknook_common::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_PORT: u16 = 5740;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://www.googleapis.com/books/v1";

pub const ENV_BIND_ADDRESS: &str = "BOOKNOOK_BIND_ADDRESS";
pub const ENV_CATALOG_BASE_URL: &str = "BOOKNOOK_CATALOG_BASE_URL";
pub const ENV_CATALOG_API_KEY: &str = "BOOKNOOK_CATALOG_API_KEY";
pub const ENV_APP_ID: &str = "BOOKNOOK_APP_ID";
pub const ENV_PUBLIC_PROJECT_ID: &str = "BOOKNOOK_PUBLIC_PROJECT_ID";
pub const ENV_AUTH_DOMAIN: &str = "BOOKNOOK_AUTH_DOMAIN";

/// Values given on the command line (already merged with their env fallbacks by clap)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
}

/// Configuration safe to hand to browsers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub app_id: String,
    pub project_id: Option<String>,
    pub auth_domain: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub bind_address: String,
    pub data_dir: PathBuf,
    pub catalog_base_url: String,
    pub catalog_api_key: String,
    pub app_id: String,
    pub public_project_id: Option<String>,
    pub auth_domain: Option<String>,
}

impl ServiceConfig {
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let config = Self {
            port: cli.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            bind_address: resolve_optional(ENV_BIND_ADDRESS, toml.bind_address.as_deref())
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            data_dir: cli
                .data_dir
                .clone()
                .unwrap_or_else(|| resolve_data_dir(toml.data_dir.as_deref())),
            catalog_base_url: resolve_optional(ENV_CATALOG_BASE_URL, toml.catalog_base_url.as_deref())
                .unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string()),
            catalog_api_key: resolve_required(ENV_CATALOG_API_KEY, toml.catalog_api_key.as_deref())?,
            app_id: resolve_required(ENV_APP_ID, toml.app_id.as_deref())?,
            public_project_id: resolve_optional(ENV_PUBLIC_PROJECT_ID, toml.public_project_id.as_deref()),
            auth_domain: resolve_optional(ENV_AUTH_DOMAIN, toml.auth_domain.as_deref()),
        };

        info!(
            port = config.port,
            bind_address = %config.bind_address,
            data_dir = %config.data_dir.display(),
            catalog = %config.catalog_base_url,
            app_id = %config.app_id,
            "Resolved service configuration"
        );
        Ok(config)
    }

    pub fn public_config(&self) -> PublicConfig {
        PublicConfig {
            app_id: self.app_id.clone(),
            project_id: self.public_project_id.clone(),
            auth_domain: self.auth_domain.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booknook_common::Error;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            ENV_BIND_ADDRESS,
            ENV_CATALOG_BASE_URL,
            ENV_CATALOG_API_KEY,
            ENV_APP_ID,
            ENV_PUBLIC_PROJECT_ID,
            ENV_AUTH_DOMAIN,
            booknook_common::config::ENV_DATA_DIR,
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_toml_values_and_defaults() {
        clear_env();
        let toml = TomlConfig::parse(
            r#"
            catalog_api_key = "toml-key"
            app_id = "book-nook"
            data_dir = "/tmp/booknook-test"
            "#,
        )
        .unwrap();

        let config = ServiceConfig::resolve(&CliOverrides::default(), &toml).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.catalog_base_url, DEFAULT_CATALOG_BASE_URL);
        assert_eq!(config.catalog_api_key, "toml-key");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/booknook-test"));
        assert_eq!(config.public_config().project_id, None);
    }

    #[test]
    #[serial]
    fn test_env_and_cli_take_priority() {
        clear_env();
        std::env::set_var(ENV_CATALOG_API_KEY, "env-key");
        std::env::set_var(ENV_APP_ID, "env-app");
        let toml = TomlConfig {
            port: Some(6000),
            catalog_api_key: Some("toml-key".into()),
            app_id: Some("toml-app".into()),
            ..Default::default()
        };
        let cli = CliOverrides {
            port: Some(7000),
            data_dir: Some(PathBuf::from("/srv/booknook")),
        };

        let config = ServiceConfig::resolve(&cli, &toml).unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.catalog_api_key, "env-key");
        assert_eq!(config.app_id, "env-app");
        assert_eq!(config.data_dir, PathBuf::from("/srv/booknook"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_app_id_names_variable() {
        clear_env();
        let toml = TomlConfig {
            catalog_api_key: Some("key".into()),
            ..Default::default()
        };

        let err = ServiceConfig::resolve(&CliOverrides::default(), &toml).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains(ENV_APP_ID)));
    }
}
