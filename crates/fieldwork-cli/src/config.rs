//! Persistent CLI configuration and effective settings resolution.

use std::path::{Path, PathBuf};

use fieldwork_core::util::{is_http_url, normalize_text_option};
use fieldwork_core::SyncConfig;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
const APP_DIR_NAME: &str = "fieldwork";
const DB_FILE_NAME: &str = "fieldwork.db";

pub const API_URL_ENV: &str = "FIELDWORK_API_URL";
pub const AUTH_TOKEN_ENV: &str = "FIELDWORK_AUTH_TOKEN";
pub const DATA_DIR_ENV: &str = "FIELDWORK_DATA_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub sync: Option<SyncConfig>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Trim, require http(s) and drop trailing slashes
pub fn normalize_base_url(raw: &str) -> Result<String, String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err("API base URL must not be empty".to_string());
    }
    if !is_http_url(&base) {
        return Err("API base URL must include http:// or https://".to_string());
    }
    Ok(base)
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    fn normalize(&mut self) {
        self.version = self.version.max(1);
        self.api_base_url = normalize_text_option(self.api_base_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.auth_token = normalize_text_option(self.auth_token.take());
        self.data_dir = self
            .data_dir
            .take()
            .filter(|dir| !dir.as_os_str().is_empty());
    }
}

/// Settings after layering flags over environment over the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: Option<String>,
    pub auth_token: Option<String>,
    pub data_dir: PathBuf,
    pub sync: SyncConfig,
}

impl Settings {
    pub fn resolve(
        config: &CliConfig,
        data_dir_flag: Option<PathBuf>,
        api_url_flag: Option<String>,
    ) -> Result<Self, String> {
        Self::resolve_with_env(config, data_dir_flag, api_url_flag, |key| {
            std::env::var(key).ok()
        })
    }

    pub fn resolve_with_env(
        config: &CliConfig,
        data_dir_flag: Option<PathBuf>,
        api_url_flag: Option<String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, String> {
        let api_base_url = normalize_text_option(api_url_flag)
            .or_else(|| normalize_text_option(env(API_URL_ENV)))
            .or_else(|| config.api_base_url.clone())
            .map(|url| normalize_base_url(&url))
            .transpose()?;

        let auth_token =
            normalize_text_option(env(AUTH_TOKEN_ENV)).or_else(|| config.auth_token.clone());

        let data_dir = data_dir_flag
            .or_else(|| normalize_text_option(env(DATA_DIR_ENV)).map(PathBuf::from))
            .or_else(|| config.data_dir.clone())
            .unwrap_or_else(default_data_dir);

        let sync = config.sync.clone().unwrap_or_default();
        sync.validate().map_err(|error| error.to_string())?;

        Ok(Self {
            api_base_url,
            auth_token,
            data_dir,
            sync,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}
