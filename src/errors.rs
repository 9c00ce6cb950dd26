//! Bridge error hierarchy
//!
//! Errors are grouped by the layer that produces them. None of them is fatal
//! to the process: transport failures drive the reconnect watchdog, RPC and
//! compositing failures degrade to "no value yet" for the affected feedback.

use std::time::Duration;

use config::ConfigError;
use tokio_util::codec::LinesCodecError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket open/error/close
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Remote call failures
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Image merge failures
    #[error(transparent)]
    Compositing(#[from] CompositingError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// TCP connect refused or unreachable
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TCP connect did not finish in time
    #[error("Connection to {addr} timed out after {duration:?}")]
    ConnectTimeout { addr: String, duration: Duration },

    /// Remote side closed the socket
    #[error("Connection closed: {0}")]
    Closed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Frame could not be read or written
    #[error("Framing error: {0}")]
    Codec(#[from] LinesCodecError),
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Definition query used a kind outside the supported set
    #[error("Unsupported definition kind: {0}")]
    UnsupportedKind(String),

    /// Response payload could not be interpreted
    #[error("Malformed response to {method}: {reason}")]
    MalformedResponse { method: &'static str, reason: String },

    /// Remote engine answered with an error
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Request {method} timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// Connection went away before the answer arrived
    #[error("Connection lost before response")]
    Disconnected,

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CompositingError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image codec failure: {0}")]
    Image(#[from] image::ImageError),

    /// Named overlay is not part of the current image set
    #[error("Overlay image {0} not found")]
    MissingOverlay(String),
}

impl RpcError {
    pub(crate) fn malformed(
        method: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        RpcError::MalformedResponse {
            method,
            reason: reason.into(),
        }
    }
}
