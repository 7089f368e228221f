//! `ootb get`: one fresh read.

use ootb_core::{DeviceSync, ReadOptions};

use crate::cli::ReadArgs;
use crate::commands::util;
use crate::error::CliError;
use crate::output::Printer;

pub async fn handle(sync: &DeviceSync, args: ReadArgs, printer: &Printer) -> Result<(), CliError> {
    let arg = util::parse_args(&args.args)?;
    let value = sync.read(args.resource, &arg, ReadOptions::fresh()).await?;
    printer.print(value.as_ref())
}
