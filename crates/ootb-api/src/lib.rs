// ootb-api: Async Rust client for the provisioning device's local HTTP API

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::DeviceClient;
pub use error::Error;
pub use models::{FirmwareUpdateProgress, StartFirmwareUpdate, UpdatePhase};
pub use transport::{Method, Request, TlsMode, Transport, TransportConfig};
