//! `ootb set`: run a mutation and report what it refreshed.

use serde::Serialize;
use serde_json::Value;

use ootb_core::DeviceSync;

use crate::cli::SetArgs;
use crate::error::CliError;
use crate::output::Printer;

#[derive(Serialize)]
struct Report {
    mutation: String,
    response: Value,
    refreshed: Vec<String>,
}

pub async fn handle(sync: &DeviceSync, args: SetArgs, printer: &Printer) -> Result<(), CliError> {
    let body: Value = serde_json::from_str(&args.body)?;
    let outcome = sync.mutate(args.mutation, body).await?;
    printer.print(&Report {
        mutation: args.mutation.to_string(),
        response: outcome.ack,
        refreshed: outcome.invalidated.iter().map(ToString::to_string).collect(),
    })
}
