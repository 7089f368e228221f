// ── Runtime sync configuration ──
//
// How to reach the device and how the engine paces itself. Built by the
// CLI (or any other front end) and handed in; core never reads config files.

use std::time::Duration;

use ootb_api::{TlsMode, TransportConfig};
use url::Url;

use crate::poll::PollConfig;

/// Configuration for one `DeviceSync` session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// API base of the device, e.g. `https://192.168.7.1/api/`.
    pub base_url: Url,
    pub tls: TlsMode,
    /// Per-request timeout.
    pub timeout: Duration,
    /// How long an entry may sit without subscribers or polls before eviction.
    pub idle_eviction: Duration,
    /// How often the eviction sweep runs. Zero disables the sweeper.
    pub eviction_sweep: Duration,
    pub network_scan_poll: PollConfig,
    pub firmware_update_poll: PollConfig,
}

impl SyncConfig {
    /// Defaults for everything but the device address.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            tls: TlsMode::default(),
            timeout: Duration::from_secs(10),
            idle_eviction: Duration::from_secs(60),
            eviction_sweep: Duration::from_secs(15),
            network_scan_poll: PollConfig::network_scan(),
            firmware_update_poll: PollConfig::firmware_update(),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }
}
