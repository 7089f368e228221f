//! Configuration for the `ootb` console tools.
//!
//! A TOML file at the platform config path, overridable through `OOTB_`
//! environment variables, translated into `ootb_core::SyncConfig`. The
//! CLI layers its own flag overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ootb_api::TlsMode;
use ootb_core::{PollConfig, SyncConfig};

/// Device address used when nothing else is configured: the board's
/// USB-gadget network interface.
pub const DEFAULT_DEVICE_URL: &str = "http://192.168.7.1/api/";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

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

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub poll: PollSection,

    #[serde(default)]
    pub defaults: Defaults,
}

/// How to reach the device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceSection {
    /// API base URL, e.g. "http://192.168.7.1/api/".
    #[serde(default = "default_url")]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept the device's self-signed certificate.
    #[serde(default = "default_insecure")]
    pub insecure: bool,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout: default_timeout(),
            insecure: default_insecure(),
        }
    }
}

fn default_url() -> String {
    DEFAULT_DEVICE_URL.into()
}
fn default_timeout() -> u64 {
    10
}
fn default_insecure() -> bool {
    true
}

/// Cache housekeeping, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_idle_eviction")]
    pub idle_eviction: u64,

    /// 0 disables the background sweep.
    #[serde(default = "default_eviction_sweep")]
    pub eviction_sweep: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            idle_eviction: default_idle_eviction(),
            eviction_sweep: default_eviction_sweep(),
        }
    }
}

fn default_idle_eviction() -> u64 {
    60
}
fn default_eviction_sweep() -> u64 {
    15
}

/// Poll cadence for the long-running operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollSection {
    #[serde(default = "default_network_scan")]
    pub network_scan: PollTiming,

    #[serde(default = "default_firmware_update")]
    pub firmware_update: PollTiming,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            network_scan: default_network_scan(),
            firmware_update: default_firmware_update(),
        }
    }
}

/// Interval and ceiling of one poll, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollTiming {
    pub interval: u64,
    pub max_duration: u64,
}

impl PollTiming {
    fn from_preset(preset: PollConfig) -> Self {
        Self {
            interval: preset.interval.as_secs(),
            max_duration: preset.max_duration.as_secs(),
        }
    }

    fn to_poll_config(self, field: &str) -> Result<PollConfig, ConfigError> {
        if self.interval == 0 {
            return Err(invalid(field, "interval must be at least 1 second"));
        }
        if self.max_duration < self.interval {
            return Err(invalid(
                field,
                format!(
                    "max_duration ({}s) is shorter than the interval ({}s)",
                    self.max_duration, self.interval
                ),
            ));
        }
        Ok(PollConfig::new(
            Duration::from_secs(self.interval),
            Duration::from_secs(self.max_duration),
        ))
    }
}

fn default_network_scan() -> PollTiming {
    PollTiming::from_preset(PollConfig::network_scan())
}
fn default_firmware_update() -> PollTiming {
    PollTiming::from_preset(PollConfig::firmware_update())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Output format when `--output` is not given.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "json".into()
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Validate and build the engine configuration.
    pub fn to_sync_config(&self) -> Result<SyncConfig, ConfigError> {
        let base_url: url::Url = self
            .device
            .url
            .parse()
            .map_err(|e| invalid("device.url", format!("{e}: {}", self.device.url)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid(
                "device.url",
                format!("expected http or https, got '{}'", base_url.scheme()),
            ));
        }
        if self.device.timeout == 0 {
            return Err(invalid("device.timeout", "must be at least 1 second"));
        }

        let mut sync = SyncConfig::new(base_url);
        sync.timeout = Duration::from_secs(self.device.timeout);
        sync.tls = if self.device.insecure {
            TlsMode::DangerAcceptInvalid
        } else {
            TlsMode::System
        };
        sync.idle_eviction = Duration::from_secs(self.cache.idle_eviction);
        sync.eviction_sweep = Duration::from_secs(self.cache.eviction_sweep);
        sync.network_scan_poll = self.poll.network_scan.to_poll_config("poll.network_scan")?;
        sync.firmware_update_poll = self
            .poll
            .firmware_update
            .to_poll_config("poll.firmware_update")?;
        Ok(sync)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("cc", "arduino", "ootb").map_or_else(
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
    p.push("ootb");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path` if it exists, then `OOTB_*` variables.
///
/// Nested keys are separated by a double underscore:
/// `OOTB_DEVICE__URL`, `OOTB_POLL__FIRMWARE_UPDATE__MAX_DURATION`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        // OOTB_DEVICE and OOTB_CONFIG belong to the CLI flags.
        .merge(Env::prefixed("OOTB_").ignore(&["device", "config"]).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parent directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
