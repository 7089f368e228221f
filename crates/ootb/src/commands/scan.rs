//! `ootb scan`: trigger a wireless scan and print the networks found.

use ootb_core::{DeviceSync, PollState};

use crate::cli::ScanArgs;
use crate::commands::util;
use crate::error::CliError;
use crate::output::Printer;

pub async fn handle(sync: &DeviceSync, args: ScanArgs, printer: &Printer) -> Result<(), CliError> {
    let bar = util::spinner("Scanning for networks", printer.quiet);
    let handle = sync.scan_networks(args.interface.as_deref()).await?;
    let networks = util::follow(handle, &bar, |state| match state {
        PollState::Polling { reads, .. } => format!("Scanning for networks (check {reads})"),
        _ => "Scanning for networks".into(),
    })
    .await?;
    printer.print(networks.as_ref())
}
