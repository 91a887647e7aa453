/// Error types shared across the transport, decoding, session and config layers
use thiserror::Error;

use crate::models::Channel;

/// Failures reported by the Bluetooth transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// No device matching the acquisition filter was seen during the scan window
    #[error("no device named '{name}' found")]
    NotFound { name: String },

    /// A service or characteristic was missing on the connected device
    #[error("{kind} {uuid} not found on device")]
    MissingAttribute { kind: &'static str, uuid: String },

    #[error("link error: {0}")]
    Link(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),
}

/// Payloads that do not match the expected wire layout
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("{channel} payload has {actual} bytes, expected {expected}")]
    Length {
        channel: Channel,
        expected: usize,
        actual: usize,
    },

    #[error("history buffer is empty")]
    EmptyHistory,

    #[error("CO2 payload is not valid UTF-8 text")]
    Text,
}

/// Problems assembling or loading the device config document
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config document must be a JSON object")]
    NotAnObject,

    #[error("invalid value '{value}' for {field}")]
    InvalidField { field: String, value: String },

    #[error("failed to read config document: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to callers of the session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("session event loop has stopped")]
    Closed,

    /// Acquisition failed or reconnection gave up
    #[error("device is not reachable, session is idle")]
    Unreachable,
}
