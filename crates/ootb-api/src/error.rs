use thiserror::Error;

/// Top-level error type for the `ootb-api` crate.
///
/// Every failure a single request can produce against the device's local
/// API. The type is `Clone` because the core stores the last read error in a
/// cache entry and hands the same error to every reader that joined a fetch.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Connection refused, reset or dropped mid-response. The device is
    /// most likely rebooting.
    #[error("Device unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// No response within the configured request timeout.
    #[error("Request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    // ── Protocol ────────────────────────────────────────────────────
    /// The device answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The device answered 2xx but the payload is not valid JSON.
    #[error("Malformed response: {message}")]
    Malformed { message: String, body: String },

    // ── Configuration ───────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or HTTP client construction error.
    #[error("TLS error: {0}")]
    Tls(String),
}

impl Error {
    /// Returns `true` if the device could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// HTTP status code, if the device answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify a `reqwest` failure into the device error taxonomy.
    pub(crate) fn from_reqwest(err: &reqwest::Error, url: &str, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_owned(),
                timeout_secs,
            }
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            // Connect failures, resets and truncated bodies all look the same
            // from here: the device went away.
            Self::Unreachable {
                url: url.to_owned(),
                reason: err.to_string(),
            }
        }
    }
}
