//! Runtime configuration
//!
//! Read from the process environment after loading an optional `.env` file.

use std::time::Duration;
use thiserror::Error;

use crate::domain::aggregates::VariantRemoval;
use crate::domain::receiving::ReceivingWorkflow;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Base URL of the REST backend; without it, payloads are only validated and returned.
    pub backend_api_url: Option<String>,
    pub backend_timeout: Duration,
    pub receiving_workflow: ReceivingWorkflow,
    pub variant_removal: VariantRemoval,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8083,
            backend_api_url: None,
            backend_timeout: Duration::from_secs(30),
            receiving_workflow: ReceivingWorkflow::Standard,
            variant_removal: VariantRemoval::ReissueSkus,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::invalid("PORT", &v))?,
            None => defaults.port,
        };
        let backend_timeout = match get("BACKEND_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(v.parse().map_err(|_| ConfigError::invalid("BACKEND_TIMEOUT_SECS", &v))?),
            None => defaults.backend_timeout,
        };
        let receiving_workflow = match get("RECEIVING_WORKFLOW") {
            Some(v) => v.parse().map_err(|_| ConfigError::invalid("RECEIVING_WORKFLOW", &v))?,
            None => defaults.receiving_workflow,
        };
        let variant_removal = match get("REISSUE_SKUS_ON_VARIANT_REMOVAL") {
            Some(v) if parse_bool(&v) == Some(true) => VariantRemoval::ReissueSkus,
            Some(v) if parse_bool(&v) == Some(false) => VariantRemoval::KeepSkus,
            Some(v) => return Err(ConfigError::invalid("REISSUE_SKUS_ON_VARIANT_REMOVAL", &v)),
            None => defaults.variant_removal,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            backend_api_url: get("BACKEND_API_URL").map(|url| url.trim_end_matches('/').to_string()),
            backend_timeout,
            receiving_workflow,
            variant_removal,
        })
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str) -> Self { Self::Invalid { key, value: value.to_string() } }
}
