//! `ootb firmware update`: start an update and follow it through the reboot.

use ootb_api::{FirmwareUpdateProgress, StartFirmwareUpdate, UpdatePhase};
use ootb_core::{DeviceSync, PollState};

use crate::commands::util;
use crate::error::CliError;
use crate::output::Printer;

pub async fn update(
    sync: &DeviceSync,
    url: String,
    md5: String,
    printer: &Printer,
) -> Result<(), CliError> {
    let bar = util::spinner("Starting firmware update", printer.quiet);
    let handle = sync
        .start_firmware_update(&StartFirmwareUpdate { url, md5 })
        .await?;
    let last = util::follow(handle, &bar, describe).await?;
    printer.print(last.as_ref())
}

fn describe(state: &PollState) -> String {
    let PollState::Polling { last, .. } = state else {
        return "Waiting for the device".into();
    };
    // No response on this tick usually means the board is rebooting.
    let Some(progress) = last
        .as_deref()
        .and_then(|v| FirmwareUpdateProgress::from_value(v).ok())
    else {
        return "Waiting for the device".into();
    };
    match progress.phase() {
        UpdatePhase::Downloading => format!("Downloading ({:.0}%)", progress.percentage),
        UpdatePhase::VerifyingChecksum => "Verifying checksum".into(),
        UpdatePhase::Unpacking => "Unpacking".into(),
        UpdatePhase::Installing => "Installing".into(),
        UpdatePhase::Completed => "Completed".into(),
        UpdatePhase::Failed => "Failed".into(),
    }
}
