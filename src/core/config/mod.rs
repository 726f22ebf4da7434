//! Layered application configuration.
//!
//! Values come from the built-in defaults, then an optional
//! `quoteserver.toml`, then `QUOTE_*` environment variables where nested
//! keys are separated by `__` (for example `QUOTE_STORE__BASE_URL`).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::shared::CompanyProfile;

pub const DEFAULT_CONFIG_FILE: &str = "quoteserver.toml";
pub const ENV_PREFIX: &str = "QUOTE_";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub documents: DocumentConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Rest,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// JSON fixture used to seed the in-memory backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            base_url: "http://localhost:54321".to_string(),
            api_key: None,
            timeout_secs: 30,
            fixture: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub output_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_path: Option<PathBuf>,
    /// Overrides the built-in seller profile for users without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyProfile>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./proformas"),
            logo_path: None,
            company: None,
        }
    }
}

impl AppConfig {
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(config_file: &Path) -> Result<Self, figment::Error> {
        Self::figment(config_file).extract()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn fallback_company(&self) -> CompanyProfile {
        self.documents
            .company
            .clone()
            .unwrap_or_else(CompanyProfile::builtin)
    }
}
