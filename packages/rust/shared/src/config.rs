//! Application configuration for listing-intake.
//!
//! User config lives at `~/.listing-intake/intake.toml`.
//! CLI flags (and their env fallbacks) override config file values, which
//! override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{IntakeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "intake.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".listing-intake";

// ---------------------------------------------------------------------------
// Config structs (matching intake.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Orchestration settings.
    #[serde(default)]
    pub intake: IntakeConfig,

    /// HubSpot portal and CRM object settings.
    #[serde(default)]
    pub hubspot: HubSpotConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the endpoint listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".into()
}

/// `[intake]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Wait between contact submission and the consent update, giving the
    /// directory time to make the new contact readable. `0` disables the wait.
    #[serde(default = "default_consent_delay_ms")]
    pub consent_delay_ms: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            consent_delay_ms: default_consent_delay_ms(),
        }
    }
}

impl IntakeConfig {
    /// The consent delay, or `None` when disabled.
    pub fn consent_delay(&self) -> Option<Duration> {
        (self.consent_delay_ms > 0).then(|| Duration::from_millis(self.consent_delay_ms))
    }
}

fn default_consent_delay_ms() -> u64 {
    1000
}

/// `[hubspot]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSpotConfig {
    /// HubSpot portal (account) id used by the Forms API.
    #[serde(default)]
    pub portal_id: String,

    /// GUID of the form contacts are submitted through.
    #[serde(default)]
    pub form_guid: String,

    /// Name of the env var holding the private app token (never store the token itself).
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// CRM API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Forms submission API base URL.
    #[serde(default = "default_forms_base_url")]
    pub forms_base_url: String,

    /// Custom object type holding listings (object name or `2-xxxxxx` type id).
    #[serde(default = "default_listing_object_type")]
    pub listing_object_type: String,

    /// Listing property matched against the submitted external listing id.
    #[serde(default = "default_listing_key_property")]
    pub listing_key_property: String,

    /// Contact property set to `"true"` when consent is recorded.
    #[serde(default = "default_consent_property")]
    pub consent_property: String,

    /// Labeled association type; the default association is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_type_id: Option<u32>,

    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HubSpotConfig {
    fn default() -> Self {
        Self {
            portal_id: String::new(),
            form_guid: String::new(),
            access_token_env: default_access_token_env(),
            api_base_url: default_api_base_url(),
            forms_base_url: default_forms_base_url(),
            listing_object_type: default_listing_object_type(),
            listing_key_property: default_listing_key_property(),
            consent_property: default_consent_property(),
            association_type_id: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HubSpotConfig {
    /// Read the access token from the configured env var.
    pub fn access_token(&self) -> Option<String> {
        std::env::var(&self.access_token_env)
            .ok()
            .filter(|v| !v.is_empty())
    }
}

fn default_access_token_env() -> String {
    "HUBSPOT_ACCESS_TOKEN".into()
}
fn default_api_base_url() -> String {
    "https://api.hubapi.com".into()
}
fn default_forms_base_url() -> String {
    "https://api.hsforms.com".into()
}
fn default_listing_object_type() -> String {
    "listings".into()
}
fn default_listing_key_property() -> String {
    "external_listing_id".into()
}
fn default_consent_property() -> String {
    "marketing_opt_in".into()
}
fn default_timeout_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.listing-intake/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| IntakeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.listing-intake/intake.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| IntakeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| IntakeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| IntakeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| IntakeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| IntakeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the HubSpot section is usable before serving traffic.
///
/// The access token is only warned about: without it the contact is still
/// submitted through the Forms API and the CRM steps fail softly.
pub fn validate_hubspot(config: &HubSpotConfig) -> Result<()> {
    if config.portal_id.trim().is_empty() {
        return Err(IntakeError::config(
            "HubSpot portal id is not set. Set [hubspot].portal_id or HUBSPOT_PORTAL_ID.",
        ));
    }
    if config.form_guid.trim().is_empty() {
        return Err(IntakeError::config(
            "HubSpot form GUID is not set. Set [hubspot].form_guid or HUBSPOT_FORM_GUID.",
        ));
    }
    for (name, value) in [
        ("api_base_url", &config.api_base_url),
        ("forms_base_url", &config.forms_base_url),
    ] {
        Url::parse(value)
            .map_err(|e| IntakeError::config(format!("invalid [hubspot].{name} '{value}': {e}")))?;
    }
    if config.timeout_secs == 0 {
        return Err(IntakeError::config("[hubspot].timeout_secs must be greater than 0"));
    }

    if config.access_token().is_none() {
        tracing::warn!(
            env = %config.access_token_env,
            "HubSpot access token not set; consent, listing lookup and association will fail"
        );
    }

    Ok(())
}
