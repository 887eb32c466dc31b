use thiserror::Error;

/// Errors produced by the client layer.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Send attempted with no open connection. The connection is not
    /// retried automatically; callers reconnect explicitly.
    #[error("No open connection")]
    NotConnected,

    /// Media-to-text conversion or frame encoding failed. The connection
    /// remains open and usable for subsequent sends.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Inbound frame with an unrecognized or malformed `action`. Reported
    /// as a diagnostic and dropped, never fatal to the connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A bulk-load call answered with an `{error}` body. The store is left
    /// unmodified.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket connect or handshake failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
