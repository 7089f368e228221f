//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};

use ootb_core::{PollHandle, PollState};

use crate::error::CliError;

/// Parse repeated `key=value` flags into a read argument.
///
/// No flags means no argument (`null`).
pub fn parse_args(pairs: &[String]) -> Result<Value, CliError> {
    if pairs.is_empty() {
        return Ok(Value::Null);
    }
    let mut map = Map::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| CliError::Validation {
            field: "--arg".into(),
            reason: format!("expected KEY=VALUE, got '{pair}'"),
        })?;
        if key.is_empty() {
            return Err(CliError::Validation {
                field: "--arg".into(),
                reason: format!("empty key in '{pair}'"),
            });
        }
        map.insert(key.to_owned(), Value::String(value.to_owned()));
    }
    Ok(Value::Object(map))
}

/// Spinner on stderr, hidden when quiet or not attached to a terminal.
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} ({elapsed})") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar.set_message(message.to_owned());
    bar
}

/// Follow a poll session to its end, describing each state on the spinner.
///
/// Ctrl-C cancels the session.
pub async fn follow(
    mut handle: PollHandle,
    bar: &ProgressBar,
    describe: impl Fn(&PollState) -> String,
) -> Result<Arc<Value>, CliError> {
    let mut interrupted = false;
    loop {
        tokio::select! {
            next = handle.changed() => match next {
                Some(state) if state.is_terminal() => break,
                Some(state) => bar.set_message(describe(&state)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                break;
            }
        }
    }
    if interrupted {
        handle.cancel();
        bar.abandon_with_message("cancelled");
        return Err(CliError::Interrupted);
    }

    let state = handle.wait().await;
    tracing::debug!(reads = state.reads(), "poll finished");
    match state.into_result() {
        Ok(value) => {
            bar.finish_and_clear();
            Ok(value)
        }
        Err(e) => {
            bar.abandon();
            Err(e.into())
        }
    }
}
