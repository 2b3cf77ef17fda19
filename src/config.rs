//! Connection settings for the Parse Server.
//!
//! Settings come from the environment (a `.env` file is honored) or from a JSON config file:
//!
//! ```json
//! {
//!   "publicServerURL": "http://localhost:1337/parse",
//!   "appId": "myAppId",
//!   "masterKey": "myMasterKey",
//!   "customClassFieldTypes": []
//! }
//! ```
//!
//! The resulting [`SyncConfig`] is passed explicitly to whatever needs it.

use crate::error::ParseError;
use crate::typescript::CustomClassFieldType;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/parse-server.config.json";
pub const CONFIG_PATH_ENV: &str = "PARSE_SERVER_SCHEMA_CONFIG_PATH";

/// Which command the configuration is loaded for. `down` and `up` can each point at a
/// different server through their own environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Down,
    Up,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub server_url: String,
    pub app_id: String,
    pub master_key: String,
    pub custom_class_field_types: Vec<CustomClassFieldType>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "publicServerURL")]
    public_server_url: Option<String>,
    #[serde(rename = "appId")]
    app_id: Option<String>,
    #[serde(rename = "masterKey")]
    master_key: Option<String>,
    #[serde(rename = "customClassFieldTypes", default)]
    custom_class_field_types: Vec<CustomClassFieldType>,
}

impl SyncConfig {
    pub fn new(server_url: &str, app_id: &str, master_key: &str) -> Self {
        SyncConfig {
            server_url: server_url.to_string(),
            app_id: app_id.to_string(),
            master_key: master_key.to_string(),
            custom_class_field_types: Vec::new(),
        }
    }

    /// Loads `.env`, then tries the environment and finally the config file.
    ///
    /// The file is `config_path` if given, else `$PARSE_SERVER_SCHEMA_CONFIG_PATH`, else
    /// `config/parse-server.config.json`.
    pub fn load(config_path: Option<&Path>, operation: Operation) -> Result<Self, ParseError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Could not load .env file: {}", e);
            }
        }

        let vars: HashMap<String, String> = std::env::vars().collect();
        if let Some((source, config)) = Self::from_vars(&vars, operation) {
            log::info!(
                "Using config from environment ({}) with server URL: {} with APPID: {} and MASTERKEY: {}",
                source,
                config.server_url,
                config.app_id,
                config.masked_master_key()
            );
            return Ok(config);
        }

        let path = Self::resolve_path(config_path, &vars);
        let config = Self::from_file(&path)?;
        log::info!(
            "Using config from '{}' with server URL: {} with APPID: {}",
            path.display(),
            config.server_url,
            config.app_id
        );
        Ok(config)
    }

    pub fn resolve_path(config_path: Option<&Path>, vars: &HashMap<String, String>) -> PathBuf {
        config_path
            .map(Path::to_path_buf)
            .or_else(|| vars.get(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Builds a config from environment variables. Returns the prefix of the variables used.
    ///
    /// Operation-specific variables (`PARSE_SERVER_DOWN_SCHEMA_*`, `PARSE_SERVER_UP_SCHEMA_*`)
    /// take precedence and are only used when all three are set.
    pub fn from_vars(
        vars: &HashMap<String, String>,
        operation: Operation,
    ) -> Option<(&'static str, Self)> {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        let scoped = match operation {
            Operation::Down => Some("PARSE_SERVER_DOWN_SCHEMA"),
            Operation::Up => Some("PARSE_SERVER_UP_SCHEMA"),
            Operation::Other => None,
        };
        if let Some(scope) = scoped {
            if let (Some(url), Some(app_id), Some(master_key)) = (
                get(&format!("{}_SERVER_URL", scope)),
                get(&format!("{}_APPID", scope)),
                get(&format!("{}_MASTERKEY", scope)),
            ) {
                return Some((scope, Self::new(&url, &app_id, &master_key)));
            }
        }

        let url = get("PARSE_SERVER_URL").or_else(|| get("PARSE_PUBLIC_SERVER_URL"))?;
        let app_id = get("PARSE_SERVER_APPLICATION_ID")?;
        let master_key = get("PARSE_SERVER_MASTER_KEY")?;
        Some(("PARSE_SERVER", Self::new(&url, &app_id, &master_key)))
    }

    /// Reads a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ParseError> {
        if !path.exists() {
            return Err(ParseError::NotFound(format!(
                "No config at '{}'",
                path.display()
            )));
        }
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            return Err(ParseError::Validation(format!(
                "Invalid config file type '{}': only .json config files are supported",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&raw)?;

        let require = |value: Option<String>, key: &str| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ParseError::InvalidConfig(format!("Missing key '{}'.", key)))
        };

        Ok(SyncConfig {
            server_url: require(file.public_server_url, "publicServerURL")?,
            app_id: require(file.app_id, "appId")?,
            master_key: require(file.master_key, "masterKey")?,
            custom_class_field_types: file.custom_class_field_types,
        })
    }

    /// The master key with everything but its first and last character hidden.
    pub fn masked_master_key(&self) -> String {
        let chars: Vec<char> = self.master_key.chars().collect();
        match chars.len() {
            0 => "(not set)".to_string(),
            1 | 2 => "****".to_string(),
            n => format!("{}****{}", chars[0], chars[n - 1]),
        }
    }
}
