use std::path::PathBuf;

use chrono::Duration;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::db::default_database_path;
use crate::history::{
    ReconcilerSettings, DEFAULT_PAGE_SIZE, DEFAULT_RETENTION_HOURS, MAX_RETENTION_HOURS,
};
use crate::secrets::{expand_home, resolve_secret_optional, SecretError, DEFAULT_API_KEY_ENV_VAR};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub version: String,
    pub api: ApiConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ApiConfig {
    /// Resolves the API key. With no source configured, `RESTORA_API_KEY` is
    /// consulted and its absence is not an error.
    pub fn resolve_api_key(&self) -> Result<Option<SecretString>, SecretError> {
        let explicit = self.api_key.is_some() || self.api_key_file.is_some() || self.api_key_env_var.is_some();
        if explicit {
            return resolve_secret_optional(
                self.api_key.as_deref(),
                self.api_key_file.as_deref(),
                self.api_key_env_var.as_deref(),
            );
        }
        match resolve_secret_optional(None, None, Some(DEFAULT_API_KEY_ENV_VAR)) {
            Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
            other => other,
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
    /// Models whose jobs belong to this client. Empty accepts all.
    #[serde(default)]
    pub model_ids: Vec<String>,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_retention_hours() -> i64 {
    DEFAULT_RETENTION_HOURS
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            retention_hours: default_retention_hours(),
            model_ids: Vec::new(),
        }
    }
}

impl HistoryConfig {
    pub fn settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            page_size: self.page_size,
            retention: Duration::hours(self.retention_hours.clamp(0, MAX_RETENTION_HOURS)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Defaults to `~/.restora/data/restora.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    /// Same-origin proxy used by the fallback download path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_proxy_url: Option<String>,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_download_timeout_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            image_proxy_url: None,
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl CacheConfig {
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match self.database_path.as_deref() {
            Some(path) if !path.is_empty() => Some(expand_home(path)),
            _ => default_database_path(),
        }
    }

    pub fn download_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.download_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}
