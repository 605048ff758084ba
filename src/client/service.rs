// ABOUTME: Wires configuration, store and callbacks into a reconnecting TCP ESME service
// ABOUTME: Each connection gets a fresh session; the store and settings are shared between them

use crate::client::callbacks::EsmeCallbacks;
use crate::client::config::{EsmeConfig, EsmeSettings};
use crate::client::error::SmppResult;
use crate::client::reconnect::{Connector, ReconnectingService, ShutdownSignal};
use crate::client::session::Esme;
use crate::client::store::{KeyValueStore, MemoryStore};
use std::io;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::info;

/// Opens TCP connections to the SMSC and runs an [`Esme`] on each.
pub struct EsmeConnector {
    address: String,
    settings: Arc<EsmeSettings>,
    store: Arc<dyn KeyValueStore>,
    callbacks: Arc<dyn EsmeCallbacks>,
}

impl EsmeConnector {
    pub fn new(
        address: impl Into<String>,
        settings: EsmeSettings,
        store: Arc<dyn KeyValueStore>,
        callbacks: Arc<dyn EsmeCallbacks>,
    ) -> Self {
        EsmeConnector {
            address: address.into(),
            settings: Arc::new(settings),
            store,
            callbacks,
        }
    }

    /// Build from a validated config, opening the configured store.
    pub async fn from_config(
        config: &EsmeConfig,
        callbacks: Arc<dyn EsmeCallbacks>,
    ) -> SmppResult<Self> {
        let settings = EsmeSettings::from_config(config)?;
        let store = open_store(config).await?;
        Ok(Self::new(config.address(), settings, store, callbacks))
    }
}

impl Connector for EsmeConnector {
    type Session = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        info!("Connecting to {}", self.address);
        let stream = TcpStream::connect(&self.address).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn run(&self, stream: TcpStream, shutdown: ShutdownSignal) -> SmppResult<()> {
        Esme::new(
            stream,
            self.settings.clone(),
            self.store.clone(),
            self.callbacks.clone(),
        )
        .run_until(shutdown.recv())
        .await
    }
}

/// Redis when `redis_url` is set, otherwise a process-local store.
pub async fn open_store(config: &EsmeConfig) -> SmppResult<Arc<dyn KeyValueStore>> {
    match &config.redis_url {
        #[cfg(feature = "redis-backend")]
        Some(url) => {
            let store =
                crate::client::redis_store::RedisStore::connect(url, &config.redis_key_prefix)
                    .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis-backend"))]
        Some(_) => Err(crate::client::config::ConfigError::Invalid(
            "redis_url needs the redis-backend feature".to_string(),
        )
        .into()),
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

/// A started reconnecting service for `config`.
pub async fn start_esme(
    config: &EsmeConfig,
    callbacks: Arc<dyn EsmeCallbacks>,
) -> SmppResult<ReconnectingService<EsmeConnector>> {
    let connector = EsmeConnector::from_config(config, callbacks).await?;
    let mut service = ReconnectingService::new(connector, config.reconnect_policy());
    service.start();
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{EsmeEvent, SessionState, SubmitSmParams, UNACKED_WINDOW_KEY};
    use crate::connection::Connection;
    use crate::datatypes::{BindTransceiverResponse, CommandId};
    use crate::frame::Frame;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn stop_closes_the_live_session_cleanly() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (submitted_tx, submitted) = oneshot::channel();
        let smsc = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut smsc = Connection::new(socket);
            let bind = smsc.read_frame().await.unwrap().unwrap();
            assert_eq!(bind.command_id(), CommandId::BindTransceiver);
            smsc.write_frame(&Frame::BindTransceiverResp(BindTransceiverResponse::new(
                bind.sequence_number(),
                "SMSC",
            )))
            .await
            .unwrap();
            // take the submit_sm but never acknowledge it
            let submit = smsc.read_frame().await.unwrap().unwrap();
            assert_eq!(submit.command_id(), CommandId::SubmitSm);
            let _ = submitted_tx.send(());
            // until the ESME hangs up
            while let Ok(Some(_)) = smsc.read_frame().await {}
        });

        let config = EsmeConfig {
            system_id: "esme".to_string(),
            password: "secret".to_string(),
            ..EsmeConfig::default()
        };
        let store = Arc::new(MemoryStore::new());
        let (events, mut rx) = unbounded_channel();
        let connector = EsmeConnector::new(
            address,
            EsmeSettings::from_config(&config).unwrap(),
            store.clone(),
            Arc::new(events),
        );
        let mut service = ReconnectingService::new(connector, config.reconnect_policy());
        service.start();

        let handle = match rx.recv().await.unwrap() {
            EsmeEvent::Connected(handle) => handle,
            other => panic!("Expected connect, got {other:?}"),
        };
        let seqs = handle
            .submit_sm(SubmitSmParams::new("123", "never acked"))
            .await
            .unwrap();
        assert_eq!(seqs.len(), 1);
        submitted.await.unwrap();

        service.stop().await;
        assert!(!service.is_running());
        smsc.await.unwrap();

        let mut disconnected = None;
        while let Ok(event) = rx.try_recv() {
            if let EsmeEvent::Disconnected { unacked } = event {
                disconnected = Some(unacked);
            }
        }
        assert_eq!(disconnected, Some(seqs));
        assert_eq!(store.llen(UNACKED_WINDOW_KEY).await.unwrap(), 0);
        assert_eq!(handle.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn memory_store_without_redis_url() {
        let store = open_store(&EsmeConfig::default()).await.unwrap();
        assert_eq!(store.incr("counter").await.unwrap(), 1);
    }

    #[cfg(not(feature = "redis-backend"))]
    #[tokio::test]
    async fn redis_url_needs_the_feature() {
        let config = EsmeConfig {
            redis_url: Some("redis://127.0.0.1/".to_string()),
            ..EsmeConfig::default()
        };
        assert!(open_store(&config).await.is_err());
    }
}
