// Device payloads the sync layer has to interpret.
//
// Most payload schemas belong to the device firmware and pass through as
// `serde_json::Value`. Firmware-update progress is the exception: the poller
// needs to know when an update has finished or failed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Progress report served by `GET firmware/update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirmwareUpdateProgress {
    /// Download progress, 0..=100.
    pub percentage: f64,
    /// Non-null when the md5 check of the downloaded archive failed.
    pub md5_error: Option<Value>,
    /// Non-null when unpacking the archive failed.
    pub untar_error: Option<Value>,
    /// Current phase: `""`, `"md5"`, `"tar"`, `"dbus"` or `"Completed"`.
    pub status: String,
    /// Set once the offline-update service reports failure.
    pub offline_update_error: String,
}

/// Coarse phase of a firmware update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Downloading,
    VerifyingChecksum,
    Unpacking,
    Installing,
    Completed,
    Failed,
}

impl FirmwareUpdateProgress {
    /// Parse a raw progress payload.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    pub fn phase(&self) -> UpdatePhase {
        if self.has_error() {
            return UpdatePhase::Failed;
        }
        match self.status.to_ascii_lowercase().as_str() {
            "md5" => UpdatePhase::VerifyingChecksum,
            "tar" => UpdatePhase::Unpacking,
            "dbus" => UpdatePhase::Installing,
            "completed" => UpdatePhase::Completed,
            _ => UpdatePhase::Downloading,
        }
    }

    /// Returns `true` if any stage has reported an error.
    pub fn has_error(&self) -> bool {
        !self.offline_update_error.is_empty()
            || self.md5_error.as_ref().is_some_and(|e| !e.is_null())
            || self.untar_error.as_ref().is_some_and(|e| !e.is_null())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase(), UpdatePhase::Completed | UpdatePhase::Failed)
    }
}

/// Body of `POST firmware/update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartFirmwareUpdate {
    pub url: String,
    pub md5: String,
}
