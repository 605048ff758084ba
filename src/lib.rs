pub mod client;
pub mod codec;
pub mod connection;
pub mod datatypes;
pub mod frame;
mod macros;


// Re-export codec types for direct access
pub use codec::{CodecError, Decodable, Encodable, Frame, PduHeader, PduRegistry};

// Re-export the main client API for easy access
pub use client::{
    Esme, EsmeCallbacks, EsmeConfig, EsmeEvent, EsmeHandle, SmppError, SmppResult,
    SubmitSmParams,
};

/// Error returned by most functions.
///
/// When writing a real application, one might want to consider a specialized
/// error handling crate or defining an error type as an `enum` of causes.
/// The frame level code only needs to carry I/O, framing and codec failures
/// up to the session, which converts them into [`SmppError`].
///
/// For performance reasons, boxing is avoided in any hot path. For example, in
/// `parse`, a custom error `enum` is defined. This is because the error is hit
/// and handled during normal execution when a partial frame is received on a
/// socket. `std::error::Error` is implemented for `frame::Error` which allows
/// it to be converted to `Box<dyn std::error::Error>`.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for frame level operations.
///
/// # Examples
///
/// ## Running one session over a socket
///
/// Without the reconnecting service, a session can be run directly on any
/// stream; it binds, then serves until the connection ends:
///
/// ```rust,no_run
/// use smpp_esme::client::{Esme, EsmeConfig, EsmeSettings, MemoryStore};
/// use std::sync::Arc;
/// use tokio::net::TcpStream;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = EsmeConfig::from_toml(r#"
///         system_id = "esme"
///         password = "secret"
///     "#)?;
///     let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
///
///     let stream = TcpStream::connect(config.address()).await?;
///     let session = Esme::new(
///         stream,
///         Arc::new(EsmeSettings::from_config(&config)?),
///         Arc::new(MemoryStore::new()),
///         Arc::new(events),
///     );
///     let task = tokio::spawn(session.run());
///
///     while let Some(event) = rx.recv().await {
///         println!("{event:?}");
///     }
///     task.await??;
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;
