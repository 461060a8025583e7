//! Service configuration

use anyhow::Result;
use serde::Deserialize;

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Listen port for the HTTP API
    #[serde(default = "default_port")]
    pub port: u16,

    /// Organization directory document
    #[serde(default = "default_org_mapping_path")]
    pub org_mapping_path: String,

    /// Reported by `/api/test`
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Instance name attached to structured log events
    #[serde(default = "default_instance")]
    pub instance: String,
}

fn default_port() -> u16 {
    8080
}

fn default_org_mapping_path() -> String {
    "assets/config/orgMapping.json".to_string()
}

fn default_environment() -> String {
    "local".to_string()
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "capacity-api".to_string())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            org_mapping_path: default_org_mapping_path(),
            environment: default_environment(),
            instance: default_instance(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `CAPACITY_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CAPACITY"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}
