//! Command dispatch: bridges CLI args to the sync engine and output formatting.

pub mod config_cmd;
pub mod firmware;
pub mod get;
pub mod scan;
pub mod set;
pub mod util;
pub mod watch;

use ootb_core::DeviceSync;

use crate::cli::{Command, FirmwareCommand};
use crate::error::CliError;
use crate::output::Printer;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, sync: &DeviceSync, printer: &Printer) -> Result<(), CliError> {
    match cmd {
        Command::Get(args) => get::handle(sync, args, printer).await,
        Command::Watch(args) => watch::handle(sync, args, printer).await,
        Command::Set(args) => set::handle(sync, args, printer).await,
        Command::Scan(args) => scan::handle(sync, args, printer).await,
        Command::Firmware(FirmwareCommand::Update { url, md5 }) => {
            firmware::update(sync, url, md5, printer).await
        }
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "command does not talk to the device".into(),
        }),
    }
}
