//! `ootb watch`: print every snapshot of one resource until interrupted.

use std::time::Duration;

use tokio_stream::StreamExt;

use ootb_core::DeviceSync;

use crate::cli::WatchArgs;
use crate::commands::util;
use crate::error::CliError;
use crate::output::Printer;

pub async fn handle(sync: &DeviceSync, args: WatchArgs, printer: &Printer) -> Result<(), CliError> {
    let arg = util::parse_args(&args.read.args)?;
    let view = sync.use_resource(args.read.resource, &arg)?;
    let key = view.key().clone();
    let mut snapshots = view.into_stream();

    // An interval of zero never fires; only pushed transitions print.
    let mut refresh = (args.interval > 0).then(|| {
        let period = Duration::from_secs(args.interval);
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    });

    let mut printed = 0usize;
    loop {
        tokio::select! {
            next = snapshots.next() => {
                let Some(snapshot) = next else { break };
                printer.print(snapshot.as_ref())?;
                printed += 1;
                if args.count.is_some_and(|n| printed >= n) {
                    break;
                }
            }
            () = async {
                match refresh.as_mut() {
                    Some(interval) => { interval.tick().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                tracing::debug!(%key, "periodic refetch");
                sync.store().force_refetch(&key);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
