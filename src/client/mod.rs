// ABOUTME: ESME client module: session engine, its collaborators and the reconnecting service
// ABOUTME: Exports configuration, callbacks, stores, the session handle and the supervisor

//! SMPP ESME client
//!
//! The pieces, from the wire up:
//!
//! * [`SequenceAllocator`] - sequence numbers from a shared [`KeyValueStore`],
//!   with a locked reset before the counter runs out
//! * [`Esme`] - one session over one connection: bind, keep-alive, submit,
//!   receive (with [`MultipartReassembler`] and [`DeliveryReportParser`])
//! * [`EsmeCallbacks`] - how a session reports back to its owner
//! * [`ReconnectingService`] - keeps a [`Connector`] connected with
//!   exponential backoff
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smpp_esme::client::{EsmeConfig, EsmeEvent, SubmitSmParams, start_esme};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EsmeConfig::load_from_file("esme.toml")?;
//! let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut service = start_esme(&config, Arc::new(events)).await?;
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         EsmeEvent::Connected(handle) => {
//!             let params = SubmitSmParams::new("27831234567", "Hello!").data_coding(1);
//!             handle.submit_sm(params).await?;
//!         }
//!         EsmeEvent::SubmitAck { message_id, .. } => {
//!             println!("SMSC accepted message {message_id}");
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//!
//! service.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod callbacks;
pub mod config;
pub mod delivery_report;
pub mod error;
pub mod keepalive;
pub mod multipart;
pub mod reconnect;
#[cfg(feature = "redis-backend")]
pub mod redis_store;
pub mod sequence;
pub mod service;
pub mod session;
pub mod store;
pub mod types;

// Re-export the main types for easy access
pub use callbacks::{EsmeCallbacks, EsmeEvent};
pub use config::{ConfigError, EsmeConfig, EsmeSettings};
pub use delivery_report::{DeliveryReport, DeliveryReportParser, DeliveryStatus};
pub use error::{SmppError, SmppResult};
pub use keepalive::{KeepAliveEvent, KeepAliveStatus, KeepAliveSupervisor};
pub use multipart::{CompletedMessage, Fragment, MultipartReassembler};
pub use reconnect::{Connector, ReconnectPolicy, ReconnectingService, ShutdownSignal};
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;
pub use sequence::SequenceAllocator;
pub use service::{EsmeConnector, open_store, start_esme};
pub use session::{Esme, EsmeHandle, UNACKED_WINDOW_KEY};
pub use store::{KeyValueStore, MemoryStore, StoreError};
pub use types::{
    BindCredentials, BindMode, LongMessageMode, SessionState, SubmitDefaults, SubmitSmParams,
    UssdReply, UssdSession, UssdSessionEvent,
};
