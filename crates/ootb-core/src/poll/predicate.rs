// ── Stop predicates ──
//
// A poll ends when its predicate says the latest response is terminal.
// Device payload schemas vary per operation, so the predicate is pluggable.

use ootb_api::{FirmwareUpdateProgress, UpdatePhase};
use serde_json::Value;

/// What a predicate concluded about one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollVerdict {
    /// Not terminal yet; keep polling.
    Continue,
    Succeeded,
    /// Terminal failure reported by the device.
    Failed(String),
}

/// Decides when a poll session is finished.
pub trait StopPredicate: Send + Sync {
    fn evaluate(&self, value: &Value) -> PollVerdict;
}

impl<F> StopPredicate for F
where
    F: Fn(&Value) -> PollVerdict + Send + Sync,
{
    fn evaluate(&self, value: &Value) -> PollVerdict {
        self(value)
    }
}

/// Matches a string field against success and failure values.
///
/// Comparison is ASCII case-insensitive. A response without the field, or
/// with a value in neither list, continues the poll.
#[derive(Debug, Clone)]
pub struct StatusPredicate {
    field: String,
    success: Vec<String>,
    failure: Vec<String>,
}

impl StatusPredicate {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            success: Vec::new(),
            failure: Vec::new(),
        }
    }

    #[must_use]
    pub fn succeeds_on(mut self, status: impl Into<String>) -> Self {
        self.success.push(status.into());
        self
    }

    #[must_use]
    pub fn fails_on(mut self, status: impl Into<String>) -> Self {
        self.failure.push(status.into());
        self
    }
}

impl StopPredicate for StatusPredicate {
    fn evaluate(&self, value: &Value) -> PollVerdict {
        let Some(status) = value.get(&self.field).and_then(Value::as_str) else {
            return PollVerdict::Continue;
        };
        if self.success.iter().any(|s| s.eq_ignore_ascii_case(status)) {
            PollVerdict::Succeeded
        } else if self.failure.iter().any(|s| s.eq_ignore_ascii_case(status)) {
            PollVerdict::Failed(format!("{} is {status}", self.field))
        } else {
            PollVerdict::Continue
        }
    }
}

/// Terminal once firmware-update progress completes or any stage reports an error.
pub fn firmware_update_predicate() -> impl StopPredicate {
    |value: &Value| match FirmwareUpdateProgress::from_value(value) {
        Ok(progress) => match progress.phase() {
            UpdatePhase::Completed => PollVerdict::Succeeded,
            UpdatePhase::Failed => PollVerdict::Failed(firmware_failure(&progress)),
            _ => PollVerdict::Continue,
        },
        Err(e) => PollVerdict::Failed(format!("unreadable progress payload: {e}")),
    }
}

fn firmware_failure(progress: &FirmwareUpdateProgress) -> String {
    if !progress.offline_update_error.is_empty() {
        return format!("offline update failed: {}", progress.offline_update_error);
    }
    if let Some(e) = progress.md5_error.as_ref().filter(|e| !e.is_null()) {
        return format!("checksum verification failed: {e}");
    }
    if let Some(e) = progress.untar_error.as_ref().filter(|e| !e.is_null()) {
        return format!("unpacking failed: {e}");
    }
    "firmware update failed".to_owned()
}

/// Terminal once a network scan has produced results.
///
/// The device answers the scan read with the network list once it is done,
/// or with a `status` object while the scan is still running.
pub fn scan_complete_predicate() -> impl StopPredicate {
    |value: &Value| {
        if value.is_array() {
            return PollVerdict::Succeeded;
        }
        match value.get("status").and_then(Value::as_str) {
            Some(s) if ["scanning", "running", "pending"].iter().any(|p| p.eq_ignore_ascii_case(s)) => {
                PollVerdict::Continue
            }
            Some(s) if ["error", "failed"].iter().any(|p| p.eq_ignore_ascii_case(s)) => {
                PollVerdict::Failed(format!("network scan {s}"))
            }
            _ => PollVerdict::Succeeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_predicate_matches_case_insensitively() {
        let p = StatusPredicate::new("status")
            .succeeds_on("completed")
            .fails_on("error");
        assert_eq!(p.evaluate(&json!({ "status": "Completed" })), PollVerdict::Succeeded);
        assert!(matches!(p.evaluate(&json!({ "status": "ERROR" })), PollVerdict::Failed(_)));
        assert_eq!(p.evaluate(&json!({ "status": "running" })), PollVerdict::Continue);
        assert_eq!(p.evaluate(&json!({})), PollVerdict::Continue);
    }

    #[test]
    fn closures_are_predicates() {
        let p = |v: &Value| {
            if v["done"].as_bool() == Some(true) {
                PollVerdict::Succeeded
            } else {
                PollVerdict::Continue
            }
        };
        assert_eq!(p.evaluate(&json!({ "done": true })), PollVerdict::Succeeded);
        assert_eq!(p.evaluate(&json!({ "done": false })), PollVerdict::Continue);
    }

    #[test]
    fn firmware_progress_walks_to_completion() {
        let p = firmware_update_predicate();
        for status in ["", "md5", "tar", "dbus"] {
            assert_eq!(p.evaluate(&json!({ "status": status })), PollVerdict::Continue);
        }
        assert_eq!(p.evaluate(&json!({ "status": "Completed" })), PollVerdict::Succeeded);
    }

    #[test]
    fn firmware_md5_error_fails() {
        let p = firmware_update_predicate();
        let verdict = p.evaluate(&json!({ "status": "md5", "md5Error": "mismatch" }));
        assert_eq!(
            verdict,
            PollVerdict::Failed("checksum verification failed: \"mismatch\"".to_owned())
        );
    }

    #[test]
    fn scan_predicate() {
        let p = scan_complete_predicate();
        assert_eq!(p.evaluate(&json!([{ "ssid": "lab" }])), PollVerdict::Succeeded);
        assert_eq!(p.evaluate(&json!({ "status": "scanning" })), PollVerdict::Continue);
        assert!(matches!(p.evaluate(&json!({ "status": "failed" })), PollVerdict::Failed(_)));
    }
}
