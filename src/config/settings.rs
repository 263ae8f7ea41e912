//! Application settings loaded from `config.toml`.
//!
//! Every section is optional. Organizations listed under `[[organizations]]` are seeded on
//! start-up so a fresh database has a tenant to sign up into.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Defaults for synthesized invite codes
    #[serde(default)]
    pub invites: InviteSettings,
    /// Analytics tuning
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    /// Organizations to create if missing
    #[serde(default)]
    pub organizations: Vec<OrganizationSeed>,
}

/// Defaults applied to the invite codes created along with a new organization
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct InviteSettings {
    /// Days until a synthesized code expires, never when absent
    pub default_expiry_days: Option<u32>,
    /// Uses allowed per synthesized code, unlimited when absent
    pub default_max_uses: Option<i32>,
}

/// Analytics tuning
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AnalyticsSettings {
    /// Default number of vendors returned by the vendor analysis
    #[serde(default = "default_vendor_limit")]
    pub vendor_limit: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            vendor_limit: default_vendor_limit(),
        }
    }
}

const fn default_vendor_limit() -> usize {
    10
}

/// An organization to seed
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationSeed {
    /// Organization name
    pub name: String,
    /// Legacy flat invite code that joins new users as employees
    pub invite_code: Option<String>,
    /// Businesses to create inside the organization
    #[serde(default)]
    pub businesses: Vec<BusinessSeed>,
}

/// A business to seed
#[derive(Debug, Clone, Deserialize)]
pub struct BusinessSeed {
    /// Business name
    pub name: String,
    /// Location names
    #[serde(default)]
    pub locations: Vec<String>,
}

/// Loads the configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Loading configuration from {path_ref:?}");
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {path_ref:?}: {e}"),
    })
}

/// Loads the configuration from `CONFIG_PATH` (default `./config.toml`).
///
/// A missing file yields the defaults; an unreadable or malformed one is an error.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if !Path::new(&path).exists() {
        warn!("No configuration file at {path}, using defaults");
        return Ok(AppConfig::default());
    }
    load_config(path)
}
