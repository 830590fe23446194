//! Shared configuration for camlink tools.
//!
//! TOML camera profiles, credential resolution (env + keyring + plaintext),
//! and translation to `camlink_core::{ConnectionDescriptor, EngineConfig}`.
//! The CLI layers its flag overrides on top of these.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use camlink_core::{AuthMode, ConnectionDescriptor, EngineConfig, Vendor};

/// Keyring service name for stored camera passwords.
const KEYRING_SERVICE: &str = "camlink";

/// Env var consulted after a profile's own `password_env`.
pub const PASSWORD_ENV: &str = "CAMLINK_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named camera profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: None,
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<Option<(&str, &Profile)>, ConfigError> {
        let Some(name) = name.or(self.default_profile.as_deref()) else {
            return Ok(None);
        };
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| Some((k.as_str(), p)))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Load/apply timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Per-vendor probe timeout in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,

    /// Reject self-signed certificates on port 443.
    #[serde(default)]
    pub verify_tls: bool,

    #[serde(default = "default_vendor_order")]
    pub vendor_order: Vec<Vendor>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            probe_timeout: default_probe_timeout(),
            verify_tls: false,
            vendor_order: default_vendor_order(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_probe_timeout() -> u64 {
    15
}
fn default_vendor_order() -> Vec<Vendor> {
    Vendor::DEFAULT_ORDER.to_vec()
}

/// A named camera.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Camera address (IPv4, IPv6 or hostname).
    pub host: String,

    /// HTTP port; 443 selects HTTPS.
    pub port: Option<u16>,

    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    #[serde(default)]
    pub auth_mode: AuthMode,

    /// Known vendor; skips detection when set.
    pub vendor: Option<Vendor>,

    /// Override the load/apply timeout.
    pub timeout: Option<u64>,
}

impl Profile {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: None,
            password: None,
            password_env: None,
            auth_mode: AuthMode::default(),
            vendor: None,
            timeout: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "camlink", "camlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("camlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
///
/// `CAMLINK_`-prefixed env vars override file values, with `__` as the
/// nesting separator (`CAMLINK_DEFAULTS__TIMEOUT=60`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CAMLINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve the camera password.
///
/// Order: the profile's `password_env`, then `CAMLINK_PASSWORD`, then the
/// system keyring, then plaintext in the profile. `None` means the camera
/// is addressed without a password.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    resolve_password_with(profile, profile_name, true)
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    use_keyring: bool,
) -> Option<SecretString> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. Tool-wide env var
    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Some(SecretString::from(val));
    }

    // 3. System keyring
    if use_keyring {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
            if let Ok(secret) = entry.get_password() {
                return Some(SecretString::from(secret));
            }
        }
    }

    // 4. Plaintext in config
    profile
        .password
        .as_ref()
        .map(|pw| SecretString::from(pw.clone()))
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .map_err(|e| ConfigError::Keyring(e.to_string()))?;
    entry
        .set_password(password)
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

// ── Translation to engine types ─────────────────────────────────────

/// Build a `ConnectionDescriptor` from a profile, no CLI flag overrides.
pub fn profile_to_descriptor(
    profile: &Profile,
    profile_name: &str,
) -> Result<ConnectionDescriptor, ConfigError> {
    let host = profile.host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("profile '{profile_name}' has no host"),
        });
    }

    let port = profile.port.unwrap_or(ConnectionDescriptor::DEFAULT_PORT);
    let username = profile
        .username
        .clone()
        .unwrap_or_else(|| ConnectionDescriptor::DEFAULT_USERNAME.into());
    let password =
        resolve_password(profile, profile_name).unwrap_or_else(|| SecretString::from(String::new()));

    Ok(ConnectionDescriptor::new(host, port)
        .with_credentials(username, password)
        .with_auth_mode(profile.auth_mode)
        .with_vendor(profile.vendor))
}

/// Engine tuning from the global defaults, with a profile's overrides.
pub fn engine_config(defaults: &Defaults, profile: Option<&Profile>) -> EngineConfig {
    let timeout = profile
        .and_then(|p| p.timeout)
        .unwrap_or(defaults.timeout);
    EngineConfig {
        probe_timeout: Duration::from_secs(defaults.probe_timeout),
        operation_timeout: Duration::from_secs(timeout),
        vendor_order: defaults.vendor_order.clone(),
        accept_invalid_certs: !defaults.verify_tls,
        ..EngineConfig::default()
    }
}
