// ABOUTME: SMPP client error types for the session engine and its collaborators
// ABOUTME: Wraps codec, store and config failures so callers can propagate them with `?`

use crate::client::config::ConfigError;
use crate::client::store::StoreError;
use crate::codec::CodecError;
use crate::datatypes::CommandStatus;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Error type for SMPP client operations
///
/// Session-internal failures that must not take the session down (a store
/// hiccup, an undecodable body) are logged where they happen; this type is
/// for the ones that end an operation or a connection.
#[derive(Debug, Error)]
pub enum SmppError {
    /// I/O error during network operations (connection, read, write)
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// A PDU could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The sequence or window store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// SMPP protocol error indicated by command_status field
    #[error("Protocol error: {0:?}")]
    Protocol(CommandStatus),

    /// The SMSC did not accept a bind in time
    #[error("No successful bind within {0:?}")]
    BindTimeout(Duration),

    /// Connection closed unexpectedly
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// The session task is gone, so commands can no longer be delivered
    #[error("Session is no longer running")]
    SessionClosed,
}

/// Result type alias for SMPP operations
pub type SmppResult<T> = Result<T, SmppError>;

impl From<Box<dyn std::error::Error + Send + Sync>> for SmppError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match err.downcast::<io::Error>() {
            Ok(io_err) => SmppError::Connection(*io_err),
            Err(err) => match err.downcast::<CodecError>() {
                Ok(codec_err) => SmppError::Codec(*codec_err),
                Err(other) => SmppError::Connection(io::Error::new(
                    io::ErrorKind::InvalidData,
                    other.to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_io_errors_keep_their_kind() {
        let boxed: crate::Error = Box::new(io::Error::from(io::ErrorKind::ConnectionReset));
        match SmppError::from(boxed) {
            SmppError::Connection(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("Expected Connection, got {other:?}"),
        }
    }

    #[test]
    fn boxed_codec_errors_are_unwrapped() {
        let boxed: crate::Error = Box::new(CodecError::Incomplete);
        assert!(matches!(
            SmppError::from(boxed),
            SmppError::Codec(CodecError::Incomplete)
        ));
    }
}
