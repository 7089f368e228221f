//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and config failures into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use ootb_config::ConfigError;
use ootb_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const OPERATION_FAILED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the device at {url}")]
    #[diagnostic(
        code(ootb::unreachable),
        help(
            "Check that the board is powered and connected.\n\
             Reason: {reason}\n\
             Try: ootb --device http://<address>/api/ get board"
        )
    )]
    Unreachable { url: String, reason: String },

    #[error("Could not set up the HTTP client: {message}")]
    #[diagnostic(
        code(ootb::tls),
        help("Set `insecure = true` under [device] to accept the board's self-signed certificate.")
    )]
    Tls { message: String },

    // ── Timeouts ─────────────────────────────────────────────────────
    #[error("Request to {url} timed out after {seconds}s")]
    #[diagnostic(
        code(ootb::timeout),
        help("Increase the timeout with --timeout or check that the device is responsive.")
    )]
    Timeout { url: String, seconds: u64 },

    #[error("Gave up waiting after {}", humantime::format_duration(*elapsed))]
    #[diagnostic(
        code(ootb::poll_timeout),
        help("Raise max_duration for this operation under [poll] in the config file.")
    )]
    PollTimedOut { elapsed: std::time::Duration },

    // ── Device responses ─────────────────────────────────────────────
    #[error("Device has no such endpoint (HTTP 404)")]
    #[diagnostic(
        code(ootb::not_found),
        help("The firmware on this board may predate the endpoint: {body}")
    )]
    NotFound { body: String },

    #[error("Device answered HTTP {status}")]
    #[diagnostic(code(ootb::http), help("{body}"))]
    Http { status: u16, body: String },

    #[error("Device returned a malformed response: {message}")]
    #[diagnostic(code(ootb::malformed))]
    Malformed { message: String },

    #[error("Device reported failure: {message}")]
    #[diagnostic(code(ootb::operation_failed))]
    OperationFailed { message: String },

    #[error("Interrupted")]
    #[diagnostic(code(ootb::interrupted))]
    Interrupted,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ootb::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(ootb::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(ootb::config))]
    Config(Box<figment::Error>),

    #[error("Internal error: {message}")]
    #[diagnostic(code(ootb::internal))]
    Internal { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(ootb::json), help("Check the --body value and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Could not render output: {message}")]
    #[diagnostic(code(ootb::render))]
    Render { message: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } | Self::Tls { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } | Self::PollTimedOut { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::OperationFailed { .. } => exit_code::OPERATION_FAILED,
            Self::Interrupted => exit_code::INTERRUPTED,
            Self::Validation { .. } | Self::ConfigExists { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Upstream error mapping ───────────────────────────────────────────

impl From<ootb_api::Error> for CliError {
    fn from(err: ootb_api::Error) -> Self {
        use ootb_api::Error as E;
        match err {
            E::Unreachable { url, reason } => Self::Unreachable { url, reason },
            E::Timeout { url, timeout_secs } => Self::Timeout {
                url,
                seconds: timeout_secs,
            },
            E::Http { status: 404, body } => Self::NotFound { body },
            E::Http { status, body } => Self::Http { status, body },
            E::Malformed { message, .. } => Self::Malformed { message },
            E::InvalidUrl(e) => Self::Validation {
                field: "device".into(),
                reason: e.to_string(),
            },
            E::Tls(message) => Self::Tls { message },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Transport(e) => e.into(),
            CoreError::PollTimedOut { elapsed } => Self::PollTimedOut { elapsed },
            CoreError::PollFailed { message } => Self::OperationFailed { message },
            CoreError::PollCancelled => Self::Interrupted,
            CoreError::InvalidArgument { resource, reason } => Self::Validation {
                field: format!("{resource} argument"),
                reason,
            },
            CoreError::Registry { message } => Self::Internal { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Serialization(e) => Self::Render {
                message: e.to_string(),
            },
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Render {
            message: err.to_string(),
        }
    }
}
