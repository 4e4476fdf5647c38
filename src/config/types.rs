use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::settings::SettingsConfig;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    /// known target services, by name
    pub services: IndexMap<String, ServiceDef>,
    pub issuer: IssuerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// account sections, kept in declaration order
    pub accounts: IndexMap<String, AccountConfig>,
}

/// ================================
/// Services
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceDef {
    /// identifier carried by every token issued for this service
    pub app_id: String,
}

/// ================================
/// Accounts
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    /// login identifier, e.g. username or email
    pub identifier: Option<String>,
    #[serde(default)]
    pub secret: String,
    /// comma-separated service names
    #[serde(default)]
    pub services: String,
}

/// ================================
/// Issuer
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct IssuerConfig {
    pub url: String,
    /// header carrying the service app id on every request
    #[serde(default = "default_app_id_header")]
    pub app_id_header: String,
    pub headers: Option<HashMap<String, GenericSourceValue>>,
    /// static JSON body, `{}` when absent
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub response: ResponseConfig,
}

/// Header value sources
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum GenericSourceValue {
    Literal { value: String },
    FromEnv { from_env: String },
    FromFile { path: String },
}

/// JSON pointers into the issuer response
#[derive(Debug, Deserialize, Clone)]
pub struct ResponseConfig {
    #[serde(default = "default_session_id_pointer")]
    pub session_id: String,
    #[serde(default = "default_value_pointer")]
    pub value: String,
    #[serde(default = "default_expiry_pointer")]
    pub expiry: String,
    #[serde(default)]
    pub expiry_format: ExpiryFormat,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id_pointer(),
            value: default_value_pointer(),
            expiry: default_expiry_pointer(),
            expiry_format: ExpiryFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryFormat {
    /// RFC 3339 timestamp string
    #[default]
    Rfc3339,

    /// Unix timestamp (integer seconds since epoch)
    Unix,

    /// Duration in seconds until expiration.
    Seconds,
}

/// ================================
/// Store
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    #[default]
    Memory,
    Redis {
        url: String,
        #[serde(default = "default_key_prefix")]
        key_prefix: String,
    },
}

fn default_app_id_header() -> String {
    "X-App-Id".to_string()
}

fn default_session_id_pointer() -> String {
    "/sessionId".to_string()
}

fn default_value_pointer() -> String {
    "/ticket".to_string()
}

fn default_expiry_pointer() -> String {
    "/expiration".to_string()
}

fn default_key_prefix() -> String {
    "tokens".to_string()
}
