// ABOUTME: The ESME session: binds, keeps the link alive, submits and receives messages on one connection
// ABOUTME: Runs as a single task that handles socket frames, owner commands and timers strictly in turn

use crate::client::callbacks::EsmeCallbacks;
use crate::client::config::EsmeSettings;
use crate::client::error::{SmppError, SmppResult};
use crate::client::keepalive::{KeepAliveEvent, KeepAliveStatus, KeepAliveSupervisor};
use crate::client::multipart::{
    MAX_SINGLE_PART_LEN, MultipartReassembler, detect_fragment, sar_tlvs, split_message,
    with_concat_udh,
};
use crate::client::sequence::SequenceAllocator;
use crate::client::store::KeyValueStore;
use crate::client::types::{LongMessageMode, SessionState, SubmitSmParams, UssdSession};
use crate::codec::{CodecError, Frame};
use crate::connection::Connection;
use crate::datatypes::{
    CommandId, CommandStatus, DeliverSm, DeliverSmResponse, DestAddress, ESM_CLASS_UDHI,
    EnquireLink, EnquireLinkResponse, GenericNack, MAX_SHORT_MESSAGE_LEN, MessageContent, QuerySm,
    SubmitMulti, SubmitSm, Tlv, Unbind, UnbindResponse, tags,
};
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Store list holding the sequence numbers of submissions still waiting
/// for a response
pub const UNACKED_WINDOW_KEY: &str = "smpp_unacked_window";

const COMMAND_QUEUE_DEPTH: usize = 64;

#[derive(Debug)]
enum Command {
    SubmitSm {
        params: SubmitSmParams,
        reply: oneshot::Sender<Vec<u32>>,
    },
    SubmitMulti {
        destinations: Vec<DestAddress>,
        params: SubmitSmParams,
        reply: oneshot::Sender<Option<u32>>,
    },
    QuerySm {
        message_id: String,
        source_addr: String,
        reply: oneshot::Sender<Option<u32>>,
    },
    Unbind,
    Close,
}

/// Cloneable handle for talking to a running [`Esme`].
///
/// Sends are fire-and-forget: the returned sequence numbers identify the
/// PDUs, and the outcome arrives later through
/// [`EsmeCallbacks::on_submit_ack`]. Every method fails with
/// [`SmppError::SessionClosed`] once the session task has ended.
#[derive(Clone, Debug)]
pub struct EsmeHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
}

impl EsmeHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Submit a message. Returns the sequence number of every submit_sm
    /// sent (several for a split message); empty means nothing was sent,
    /// e.g. because the session is not bound for transmitting.
    pub async fn submit_sm(&self, params: SubmitSmParams) -> SmppResult<Vec<u32>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SubmitSm { params, reply }).await?;
        response.await.map_err(|_| SmppError::SessionClosed)
    }

    /// Submit one message to several destinations. `None` means not sent.
    pub async fn submit_multi(
        &self,
        destinations: Vec<DestAddress>,
        params: SubmitSmParams,
    ) -> SmppResult<Option<u32>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SubmitMulti {
            destinations,
            params,
            reply,
        })
        .await?;
        response.await.map_err(|_| SmppError::SessionClosed)
    }

    /// Ask the SMSC for the state of an earlier submission. The answer
    /// arrives through [`EsmeCallbacks::on_query_sm_resp`].
    pub async fn query_sm(&self, message_id: &str, source_addr: &str) -> SmppResult<Option<u32>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::QuerySm {
            message_id: message_id.to_string(),
            source_addr: source_addr.to_string(),
            reply,
        })
        .await?;
        response.await.map_err(|_| SmppError::SessionClosed)
    }

    /// Send an unbind; the session closes when the SMSC answers it.
    pub async fn unbind(&self) -> SmppResult<()> {
        self.send(Command::Unbind).await
    }

    /// Drop the connection without unbinding.
    pub async fn close(&self) -> SmppResult<()> {
        self.send(Command::Close).await
    }

    async fn send(&self, command: Command) -> SmppResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SmppError::SessionClosed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// One SMPP session over an established transport.
///
/// ```text
/// connect ─► OPEN ──bind_*_resp(ESME_ROK)──► BOUND_TX | BOUND_RX | BOUND_TRX
///              │                                        │
///              └──── bind timeout / EOF / unbind ───────┴──► CLOSED
/// ```
///
/// [`run`](Esme::run) drives the session until the connection ends. Inbound
/// frames are handled one at a time in arrival order; a handler finishes
/// (including store round trips) before the next frame is read.
pub struct Esme<S> {
    connection: Connection<S>,
    settings: Arc<EsmeSettings>,
    store: Arc<dyn KeyValueStore>,
    sequence: SequenceAllocator,
    callbacks: Arc<dyn EsmeCallbacks>,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    keepalive: KeepAliveSupervisor,
    reassembler: MultipartReassembler,
    commands: mpsc::Receiver<Command>,
    handle: EsmeHandle,
    bind_sequence: Option<u32>,
    unbind_sequence: Option<u32>,
    // This session's entries in the shared unacked window
    unacked: Vec<u32>,
}

impl<S> Esme<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        settings: Arc<EsmeSettings>,
        store: Arc<dyn KeyValueStore>,
        callbacks: Arc<dyn EsmeCallbacks>,
    ) -> Self {
        let (commands_tx, commands) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (state_tx, state_rx) = watch::channel(SessionState::Closed);

        Esme {
            connection: Connection::new(stream),
            keepalive: KeepAliveSupervisor::new(
                settings.bind_timeout,
                settings.enquire_link_interval,
            ),
            reassembler: MultipartReassembler::new(settings.multipart_ttl),
            sequence: SequenceAllocator::new(store.clone()),
            settings,
            store,
            callbacks,
            state: SessionState::Closed,
            state_tx,
            commands,
            handle: EsmeHandle {
                commands: commands_tx,
                state: state_rx,
            },
            bind_sequence: None,
            unbind_sequence: None,
            unacked: Vec::new(),
        }
    }

    pub fn handle(&self) -> EsmeHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn keepalive_status(&self) -> KeepAliveStatus {
        self.keepalive.status()
    }

    /// Bind and serve the session until the connection closes.
    ///
    /// Returns `Ok` when the SMSC closed the connection cleanly or an
    /// unbind completed; the disconnect callback fires either way.
    pub async fn run(self) -> SmppResult<()> {
        self.run_until(std::future::pending()).await
    }

    /// Like [`run`](Esme::run), but also closes the connection once
    /// `shutdown` completes. Teardown still runs: the state goes to CLOSED,
    /// the unacked window is cleared and the disconnect callback fires.
    pub async fn run_until<F>(mut self, shutdown: F) -> SmppResult<()>
    where
        F: Future<Output = ()>,
    {
        let shutdown = std::pin::pin!(shutdown);
        let result = match self.open().await {
            Ok(()) => self.event_loop(shutdown).await,
            Err(e) => Err(e),
        };
        self.teardown().await;
        result
    }

    async fn open(&mut self) -> SmppResult<()> {
        self.set_state(SessionState::Open);

        let sequence_number = self.sequence.next().await?;
        let frame = self
            .settings
            .bind_mode
            .bind_frame(sequence_number, &self.settings.credentials);
        self.bind_sequence = Some(sequence_number);
        self.send(&frame).await?;

        info!(
            system_id = %self.settings.credentials.system_id,
            "Sent {} (sequence {})",
            frame.command_id().name(),
            sequence_number
        );
        self.keepalive.arm_bind_timeout();
        Ok(())
    }

    async fn event_loop<F>(&mut self, mut shutdown: Pin<&mut F>) -> SmppResult<()>
    where
        F: Future<Output = ()>,
    {
        loop {
            let flow = tokio::select! {
                () = shutdown.as_mut() => {
                    info!("Shutting down, closing the connection");
                    Flow::Close
                }
                frame = self.connection.read_frame() => match frame? {
                    Some(frame) => self.handle_frame(frame).await?,
                    None => {
                        info!("SMSC closed the connection");
                        Flow::Close
                    }
                },
                Some(command) = self.commands.recv() => self.handle_command(command).await?,
                event = self.keepalive.next_event() => self.handle_timer(event).await?,
            };

            if flow == Flow::Close {
                return Ok(());
            }
        }
    }

    async fn teardown(&mut self) {
        self.keepalive.stop();
        self.set_state(SessionState::Closed);

        if let Err(e) = self.connection.shutdown().await {
            debug!("Transport shutdown failed: {}", e);
        }

        let unacked = std::mem::take(&mut self.unacked);
        for sequence_number in &unacked {
            if let Err(e) = self
                .store
                .lrem(UNACKED_WINDOW_KEY, 1, &sequence_number.to_string())
                .await
            {
                error!(sequence_number, "Failed to clear unacked entry: {}", e);
            }
        }
        if !unacked.is_empty() {
            warn!(
                "{} submission(s) unacknowledged at disconnect, they will not be resent",
                unacked.len()
            );
        }

        self.callbacks.on_disconnect(unacked);
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            info!("Session state {} -> {}", self.state, state);
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }

    async fn send(&mut self, frame: &Frame) -> SmppResult<()> {
        let bytes = frame.to_bytes()?;
        if !is_keepalive(frame.command_id()) {
            debug!(
                sequence_number = frame.sequence_number(),
                "Sending {}",
                frame.command_id().name()
            );
        }
        self.connection.write_encoded(&bytes).await?;
        Ok(())
    }

    async fn handle_frame(&mut self, frame: Frame) -> SmppResult<Flow> {
        let command_id = frame.command_id();
        if !is_keepalive(command_id) {
            debug!(
                sequence_number = frame.sequence_number(),
                "Received {}",
                command_id.name()
            );
        }

        match frame {
            Frame::BindTransmitterResp(resp) => {
                self.handle_bind_resp(command_id, resp.command_status, resp.sequence_number)
            }
            Frame::BindReceiverResp(resp) => {
                self.handle_bind_resp(command_id, resp.command_status, resp.sequence_number)
            }
            Frame::BindTransceiverResp(resp) => {
                self.handle_bind_resp(command_id, resp.command_status, resp.sequence_number)
            }
            Frame::SubmitSmResp(resp) => {
                self.acknowledge(
                    resp.sequence_number,
                    resp.command_status,
                    command_id,
                    resp.message_id,
                )
                .await;
            }
            Frame::SubmitMultiResp(resp) => {
                if !resp.unsuccess_smes.is_empty() {
                    warn!(
                        sequence_number = resp.sequence_number,
                        "submit_multi failed for {} destination(s)",
                        resp.unsuccess_smes.len()
                    );
                }
                self.acknowledge(
                    resp.sequence_number,
                    resp.command_status,
                    command_id,
                    resp.message_id,
                )
                .await;
            }
            Frame::QuerySmResp(resp) => {
                self.callbacks.on_query_sm_resp(resp.sequence_number, resp);
            }
            Frame::DeliverSm(pdu) => self.handle_deliver_sm(*pdu).await?,
            Frame::EnquireLink(req) => {
                self.send(&Frame::EnquireLinkResp(EnquireLinkResponse::new(
                    req.sequence_number,
                )))
                .await?;
            }
            Frame::EnquireLinkResp(resp) => {
                debug!(sequence_number = resp.sequence_number, "enquire_link answered");
                self.keepalive.on_enquire_link_resp();
            }
            Frame::Unbind(req) => {
                info!("SMSC requested unbind");
                self.send(&Frame::UnbindResp(UnbindResponse::new(req.sequence_number)))
                    .await?;
                return Ok(Flow::Close);
            }
            Frame::UnbindResp(resp) => {
                if self.unbind_sequence == Some(resp.sequence_number) {
                    info!("Unbind acknowledged");
                    return Ok(Flow::Close);
                }
                warn!(
                    sequence_number = resp.sequence_number,
                    "Ignoring unbind_resp for an unbind we did not send"
                );
            }
            Frame::GenericNack(nack) => {
                warn!(
                    sequence_number = nack.sequence_number,
                    status = ?nack.command_status,
                    "SMSC sent generic_nack"
                );
                if self.unacked.contains(&nack.sequence_number) {
                    self.acknowledge(
                        nack.sequence_number,
                        nack.command_status,
                        command_id,
                        String::new(),
                    )
                    .await;
                }
            }
            other if other.is_response() => {
                warn!(
                    sequence_number = other.sequence_number(),
                    "Ignoring unexpected {}",
                    command_id.name()
                );
            }
            other => {
                warn!(
                    sequence_number = other.sequence_number(),
                    "Rejecting unsupported request {} (0x{:08x})",
                    command_id.name(),
                    u32::from(command_id)
                );
                self.send(&Frame::GenericNack(GenericNack::invalid_command_id(
                    other.sequence_number(),
                )))
                .await?;
            }
        }

        Ok(Flow::Continue)
    }

    fn handle_bind_resp(
        &mut self,
        command_id: CommandId,
        status: CommandStatus,
        sequence_number: u32,
    ) {
        let mode = self.settings.bind_mode;
        if command_id != mode.response_id() || self.bind_sequence != Some(sequence_number) {
            warn!(
                sequence_number,
                "Ignoring {} that does not answer our {}",
                command_id.name(),
                mode.request_id().name()
            );
            return;
        }
        if self.state != SessionState::Open {
            warn!(state = %self.state, "Ignoring repeated {}", command_id.name());
            return;
        }
        if !status.is_ok() {
            warn!(?status, "Bind refused, waiting for the bind timeout");
            return;
        }

        self.bind_sequence = None;
        self.keepalive.cancel_bind_timeout();
        self.set_state(mode.bound_state());
        self.keepalive.start_keepalive();
        self.callbacks.on_connect(self.handle.clone());
    }

    async fn acknowledge(
        &mut self,
        sequence_number: u32,
        status: CommandStatus,
        command_id: CommandId,
        message_id: String,
    ) {
        match self.unacked.iter().position(|s| *s == sequence_number) {
            Some(index) => {
                self.unacked.remove(index);
                if let Err(e) = self
                    .store
                    .lrem(UNACKED_WINDOW_KEY, 1, &sequence_number.to_string())
                    .await
                {
                    error!(sequence_number, "Failed to clear unacked entry: {}", e);
                }
            }
            None => debug!(sequence_number, "Response outside the unacked window"),
        }

        if !status.is_ok() {
            warn!(sequence_number, ?status, "{} reports failure", command_id.name());
        }
        self.callbacks
            .on_submit_ack(sequence_number, status, command_id, message_id);
    }

    async fn handle_deliver_sm(&mut self, pdu: DeliverSm) -> SmppResult<()> {
        if !self.state.can_receive() {
            warn!(state = %self.state, "Dropping deliver_sm received while not bound for receiving");
            return Ok(());
        }
        if !pdu.command_status.is_ok() {
            warn!(status = ?pdu.command_status, "Ignoring deliver_sm with an error status");
            return Ok(());
        }

        // Acknowledge before anything that may take a while.
        self.send(&Frame::DeliverSmResp(DeliverSmResponse::new(
            pdu.sequence_number,
        )))
        .await?;

        if let Some(report) = self.settings.delivery_reports.from_tlvs(&pdu) {
            self.callbacks
                .on_delivery_report(pdu.destination_addr, pdu.source_addr, report);
            return Ok(());
        }

        let content = pdu
            .tlv(tags::MESSAGE_PAYLOAD)
            .map(|tlv| tlv.value.clone())
            .unwrap_or_else(|| pdu.short_message.clone());

        if let Some(service_op) = pdu.tlv(tags::USSD_SERVICE_OP) {
            let service_op = service_op.value.first().copied().unwrap_or_default();
            let its_session_info = pdu
                .tlv(tags::ITS_SESSION_INFO)
                .and_then(Tlv::as_u16)
                .unwrap_or_default();
            let session = UssdSession::new(service_op, its_session_info);
            debug!(service_op, ?session, "USSD message from {}", pdu.source_addr);

            let content = self.settings.data_coding.decode(pdu.data_coding, content);
            if let Some(report) = self.settings.delivery_reports.from_content(&content) {
                self.callbacks
                    .on_delivery_report(pdu.destination_addr, pdu.source_addr, report);
                return Ok(());
            }
            let message_id = uuid::Uuid::new_v4().to_string();
            self.callbacks.on_deliver_ussd(
                pdu.destination_addr,
                pdu.source_addr,
                content,
                message_id,
                session,
            );
            return Ok(());
        }

        if let Some(fragment) = detect_fragment(&pdu, &content) {
            debug!(
                reference = fragment.reference,
                "Part {} of {} from {}",
                fragment.index,
                fragment.total,
                pdu.source_addr
            );
            if let Some(message) =
                self.reassembler
                    .insert(&pdu.source_addr, &pdu.destination_addr, fragment)
            {
                let content = self.settings.data_coding.decode(pdu.data_coding, message.content);
                self.deliver(message.destination_addr, message.source_addr, content);
            }
            return Ok(());
        }

        let content = self.settings.data_coding.decode(pdu.data_coding, content);
        self.deliver(pdu.destination_addr, pdu.source_addr, content);
        Ok(())
    }

    /// Hand decoded text to the owner, as a delivery report when it reads
    /// like one.
    fn deliver(&self, destination_addr: String, source_addr: String, content: MessageContent) {
        if let Some(report) = self.settings.delivery_reports.from_content(&content) {
            self.callbacks
                .on_delivery_report(destination_addr, source_addr, report);
            return;
        }
        let message_id = uuid::Uuid::new_v4().to_string();
        self.callbacks
            .on_deliver_sm(destination_addr, source_addr, content, message_id);
    }

    async fn handle_command(&mut self, command: Command) -> SmppResult<Flow> {
        match command {
            Command::SubmitSm { params, reply } => {
                let mut sent = Vec::new();
                let result = self.submit_sm(params, &mut sent).await;
                let _ = reply.send(sent);
                absorb(result, "submit_sm")?;
            }
            Command::SubmitMulti {
                destinations,
                params,
                reply,
            } => {
                let result = self.submit_multi(destinations, params).await;
                settle(result, reply, "submit_multi")?;
            }
            Command::QuerySm {
                message_id,
                source_addr,
                reply,
            } => {
                let result = self.query_sm(&message_id, &source_addr).await;
                settle(result, reply, "query_sm")?;
            }
            Command::Unbind => match self.sequence.next().await {
                Ok(sequence_number) => {
                    info!("Unbinding");
                    self.unbind_sequence = Some(sequence_number);
                    self.send(&Frame::Unbind(Unbind::new(sequence_number)))
                        .await?;
                }
                Err(e) => {
                    error!("No sequence number for unbind, closing instead: {}", e);
                    return Ok(Flow::Close);
                }
            },
            Command::Close => {
                info!("Closing the connection on request");
                return Ok(Flow::Close);
            }
        }
        Ok(Flow::Continue)
    }

    async fn handle_timer(&mut self, event: KeepAliveEvent) -> SmppResult<Flow> {
        match event {
            KeepAliveEvent::BindTimeout => {
                if self.state.is_bound() {
                    return Ok(Flow::Continue);
                }
                warn!(
                    "No successful bind within {:?}, closing the connection",
                    self.settings.bind_timeout
                );
                Err(SmppError::BindTimeout(self.settings.bind_timeout))
            }
            KeepAliveEvent::EnquireLink => {
                match self.sequence.next().await {
                    Ok(sequence_number) => {
                        self.keepalive.on_enquire_link_sent();
                        self.send(&Frame::EnquireLink(EnquireLink::new(sequence_number)))
                            .await?;
                    }
                    Err(e) => error!("Skipping enquire_link: {}", e),
                }
                Ok(Flow::Continue)
            }
        }
    }

    async fn submit_sm(&mut self, params: SubmitSmParams, sent: &mut Vec<u32>) -> SmppResult<()> {
        if !self.state.can_transmit() {
            error!(
                state = %self.state,
                destination = %params.destination_addr,
                "Not sending submit_sm while not bound for transmitting"
            );
            return Ok(());
        }

        let message = params.short_message.clone();
        match self.settings.long_messages {
            LongMessageMode::Sar if message.len() > MAX_SINGLE_PART_LEN => {
                let parts = split_message(&message);
                let total = part_count(parts.len())?;
                let reference = (self.sequence.next().await? % 0xFFFF) as u16;
                for (index, part) in (1..=total).zip(parts) {
                    let mut optional_params = params.optional_params.clone();
                    optional_params.extend(sar_tlvs(reference, total, index));
                    let pdu = self
                        .build_submit_sm(&params, part, params.esm_class, optional_params)
                        .await?;
                    self.send_submission(Frame::SubmitSm(Box::new(pdu)), sent)
                        .await?;
                }
            }
            LongMessageMode::Udh if message.len() > MAX_SINGLE_PART_LEN => {
                let parts = split_message(&message);
                let total = part_count(parts.len())?;
                let reference = (self.sequence.next().await? % 0xFF) as u8;
                for (index, part) in (1..=total).zip(parts) {
                    let part = with_concat_udh(reference, total, index, &part);
                    let pdu = self
                        .build_submit_sm(
                            &params,
                            part,
                            params.esm_class | ESM_CLASS_UDHI,
                            params.optional_params.clone(),
                        )
                        .await?;
                    self.send_submission(Frame::SubmitSm(Box::new(pdu)), sent)
                        .await?;
                }
            }
            LongMessageMode::MessagePayload if message.len() > MAX_SHORT_MESSAGE_LEN as usize => {
                let mut optional_params = params.optional_params.clone();
                optional_params.push(Tlv::new(tags::MESSAGE_PAYLOAD, message));
                let pdu = self
                    .build_submit_sm(&params, Bytes::new(), params.esm_class, optional_params)
                    .await?;
                self.send_submission(Frame::SubmitSm(Box::new(pdu)), sent)
                    .await?;
            }
            _ => {
                let pdu = self
                    .build_submit_sm(
                        &params,
                        message,
                        params.esm_class,
                        params.optional_params.clone(),
                    )
                    .await?;
                self.send_submission(Frame::SubmitSm(Box::new(pdu)), sent)
                    .await?;
            }
        }
        Ok(())
    }

    async fn build_submit_sm(
        &mut self,
        params: &SubmitSmParams,
        short_message: Bytes,
        esm_class: u8,
        mut optional_params: Vec<Tlv>,
    ) -> SmppResult<SubmitSm> {
        let sequence_number = self.sequence.next().await?;
        if let Some(ussd) = params.ussd {
            optional_params.extend(ussd.tlvs());
        }
        let defaults = &self.settings.defaults;
        let registered_delivery = params
            .registered_delivery
            .unwrap_or(defaults.registered_delivery);

        let mut pdu = SubmitSm::new(sequence_number, &params.destination_addr, short_message)
            .service_type(defaults.service_type.clone())
            .source_addr_ton(defaults.source_addr_ton)
            .source_addr_npi(defaults.source_addr_npi)
            .source_addr(params.source_addr.clone())
            .dest_addr_ton(defaults.dest_addr_ton)
            .dest_addr_npi(defaults.dest_addr_npi)
            .esm_class(esm_class)
            .protocol_id(params.protocol_id)
            .priority_flag(params.priority_flag)
            .registered_delivery(u8::from(registered_delivery))
            .data_coding(params.data_coding)
            .optional_params(optional_params);
        pdu.schedule_delivery_time = params.schedule_delivery_time.clone();
        pdu.validity_period = params.validity_period.clone();
        Ok(pdu)
    }

    async fn submit_multi(
        &mut self,
        destinations: Vec<DestAddress>,
        params: SubmitSmParams,
    ) -> SmppResult<Option<u32>> {
        if !self.state.can_transmit() {
            error!(state = %self.state, "Not sending submit_multi while not bound for transmitting");
            return Ok(None);
        }

        let sequence_number = self.sequence.next().await?;
        let defaults = &self.settings.defaults;
        let registered_delivery = params
            .registered_delivery
            .unwrap_or(defaults.registered_delivery);

        let mut pdu = SubmitMulti::new(sequence_number, destinations, params.short_message)
            .service_type(defaults.service_type.clone())
            .source_addr_ton(defaults.source_addr_ton)
            .source_addr_npi(defaults.source_addr_npi)
            .source_addr(params.source_addr)
            .esm_class(params.esm_class)
            .registered_delivery(u8::from(registered_delivery))
            .data_coding(params.data_coding)
            .optional_params(params.optional_params);
        pdu.protocol_id = params.protocol_id;
        pdu.priority_flag = params.priority_flag;
        pdu.schedule_delivery_time = params.schedule_delivery_time;
        pdu.validity_period = params.validity_period;

        let mut sent = Vec::with_capacity(1);
        self.send_submission(Frame::SubmitMulti(Box::new(pdu)), &mut sent)
            .await?;
        Ok(sent.pop())
    }

    async fn query_sm(&mut self, message_id: &str, source_addr: &str) -> SmppResult<Option<u32>> {
        if !self.state.can_transmit() {
            error!(state = %self.state, "Not sending query_sm while not bound for transmitting");
            return Ok(None);
        }

        let sequence_number = self.sequence.next().await?;
        let defaults = &self.settings.defaults;
        let pdu = QuerySm::new(sequence_number, message_id, source_addr)
            .source_addr_ton(defaults.source_addr_ton)
            .source_addr_npi(defaults.source_addr_npi);
        self.send(&Frame::QuerySm(pdu)).await?;
        Ok(Some(sequence_number))
    }

    /// Send a submission and record it in the unacked window.
    async fn send_submission(&mut self, frame: Frame, sent: &mut Vec<u32>) -> SmppResult<()> {
        let sequence_number = frame.sequence_number();
        self.send(&frame).await?;

        self.unacked.push(sequence_number);
        sent.push(sequence_number);
        if let Err(e) = self
            .store
            .lpush(UNACKED_WINDOW_KEY, &sequence_number.to_string())
            .await
        {
            error!(sequence_number, "Failed to record unacked submission: {}", e);
        }
        Ok(())
    }
}

fn is_keepalive(command_id: CommandId) -> bool {
    matches!(
        command_id,
        CommandId::EnquireLink | CommandId::EnquireLinkResp
    )
}

fn part_count(parts: usize) -> Result<u8, CodecError> {
    u8::try_from(parts).map_err(|_| CodecError::FieldValidation {
        field: "short_message",
        reason: format!("{parts} parts do not fit one concatenated message"),
    })
}

/// Transport failures end the session; anything else only loses the
/// operation at hand.
fn is_fatal(err: &SmppError) -> bool {
    matches!(err, SmppError::Connection(_) | SmppError::ConnectionClosed)
}

fn absorb(result: SmppResult<()>, operation: &str) -> SmppResult<()> {
    match result {
        Err(e) if !is_fatal(&e) => {
            error!("{} not sent: {}", operation, e);
            Ok(())
        }
        other => other,
    }
}

fn settle<T: Default>(
    result: SmppResult<T>,
    reply: oneshot::Sender<T>,
    operation: &str,
) -> SmppResult<()> {
    match result {
        Ok(value) => {
            let _ = reply.send(value);
            Ok(())
        }
        Err(e) => {
            let _ = reply.send(T::default());
            absorb(Err(e), operation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::store::MemoryStore;
    use crate::client::{EsmeConfig, EsmeSettings};
    use tokio::io::duplex;

    struct Quiet;
    impl EsmeCallbacks for Quiet {}

    fn esme() -> Esme<tokio::io::DuplexStream> {
        let (client, _server) = duplex(1024);
        let settings = EsmeSettings::from_config(&EsmeConfig::default()).unwrap();
        Esme::new(
            client,
            Arc::new(settings),
            Arc::new(MemoryStore::new()),
            Arc::new(Quiet),
        )
    }

    #[tokio::test]
    async fn handle_fails_once_the_session_is_gone() {
        let session = esme();
        let handle = session.handle();
        assert_eq!(handle.state(), SessionState::Closed);
        drop(session);

        assert!(matches!(
            handle.submit_sm(SubmitSmParams::new("123", "hi")).await,
            Err(SmppError::SessionClosed)
        ));
        assert!(matches!(handle.unbind().await, Err(SmppError::SessionClosed)));
    }

    #[test]
    fn transport_errors_are_fatal() {
        let io = SmppError::Connection(std::io::Error::other("broken pipe"));
        assert!(is_fatal(&io));
        assert!(absorb(Err(io), "submit_sm").is_err());

        let codec = SmppError::Codec(CodecError::Incomplete);
        assert!(absorb(Err(codec), "submit_sm").is_ok());
    }

    #[test]
    fn part_count_limit() {
        assert_eq!(part_count(255).unwrap(), 255);
        assert!(part_count(256).is_err());
    }
}
