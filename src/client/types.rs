// ABOUTME: Supporting types for the ESME session: bind modes, session states, credentials, submit parameters
// ABOUTME: The bind mode table decides which bind PDU goes out, which response is expected and the bound state

use crate::codec::Frame;
use crate::datatypes::{
    BindReceiver, BindTransceiver, BindTransmitter, CommandId, INTERFACE_VERSION_34, Tlv, tags,
};
use bytes::Bytes;
use serde::Deserialize;
use std::fmt;

/// SMPP session states (SMPP v3.4 Section 2.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Closed,
    /// Connected, bind not yet accepted
    Open,
    BoundTx,
    BoundRx,
    BoundTrx,
}

impl SessionState {
    /// submit_sm, submit_multi and query_sm are allowed
    pub fn can_transmit(self) -> bool {
        matches!(self, SessionState::BoundTx | SessionState::BoundTrx)
    }

    /// deliver_sm is accepted
    pub fn can_receive(self) -> bool {
        matches!(self, SessionState::BoundRx | SessionState::BoundTrx)
    }

    pub fn is_bound(self) -> bool {
        self.can_transmit() || self.can_receive()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Closed => "CLOSED",
            SessionState::Open => "OPEN",
            SessionState::BoundTx => "BOUND_TX",
            SessionState::BoundRx => "BOUND_RX",
            SessionState::BoundTrx => "BOUND_TRX",
        };
        f.write_str(name)
    }
}

/// Direction the session binds in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind as transmitter (can send submit_sm)
    Transmitter,
    /// Bind as receiver (can receive deliver_sm)
    Receiver,
    /// Bind as transceiver (both transmitter and receiver capabilities)
    #[default]
    Transceiver,
}

struct BindProfile {
    request: CommandId,
    response: CommandId,
    bound: SessionState,
}

// Indexed by `BindMode as usize`
const BIND_PROFILES: [BindProfile; 3] = [
    BindProfile {
        request: CommandId::BindTransmitter,
        response: CommandId::BindTransmitterResp,
        bound: SessionState::BoundTx,
    },
    BindProfile {
        request: CommandId::BindReceiver,
        response: CommandId::BindReceiverResp,
        bound: SessionState::BoundRx,
    },
    BindProfile {
        request: CommandId::BindTransceiver,
        response: CommandId::BindTransceiverResp,
        bound: SessionState::BoundTrx,
    },
];

impl BindMode {
    fn profile(self) -> &'static BindProfile {
        &BIND_PROFILES[self as usize]
    }

    pub fn request_id(self) -> CommandId {
        self.profile().request
    }

    pub fn response_id(self) -> CommandId {
        self.profile().response
    }

    /// State entered once the SMSC accepts the bind
    pub fn bound_state(self) -> SessionState {
        self.profile().bound
    }

    /// The bind request for this mode
    pub fn bind_frame(self, sequence_number: u32, credentials: &BindCredentials) -> Frame {
        macro_rules! bind {
            ($pdu:ident) => {
                $pdu::new(
                    sequence_number,
                    &credentials.system_id,
                    &credentials.password,
                )
                .system_type(credentials.system_type.clone())
                .interface_version(credentials.interface_version)
                .addr_ton(credentials.addr_ton)
                .addr_npi(credentials.addr_npi)
                .address_range(credentials.address_range.clone())
            };
        }

        match self {
            BindMode::Transmitter => Frame::BindTransmitter(bind!(BindTransmitter)),
            BindMode::Receiver => Frame::BindReceiver(bind!(BindReceiver)),
            BindMode::Transceiver => Frame::BindTransceiver(bind!(BindTransceiver)),
        }
    }
}

/// SMPP bind operation credentials
///
/// Contains authentication information sent with every bind request.
#[derive(Debug, Clone, PartialEq)]
pub struct BindCredentials {
    /// System identifier for authentication
    pub system_id: String,
    /// Password for authentication
    pub password: String,
    pub system_type: String,
    /// SMPP interface version to announce
    pub interface_version: u8,
    pub addr_ton: u8,
    pub addr_npi: u8,
    pub address_range: String,
}

impl BindCredentials {
    pub fn new(system_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            password: password.into(),
            system_type: String::new(),
            interface_version: INTERFACE_VERSION_34,
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
        }
    }

    /// Set system type
    pub fn with_system_type(mut self, system_type: impl Into<String>) -> Self {
        self.system_type = system_type.into();
        self
    }

    pub fn with_address_range(mut self, address_range: impl Into<String>) -> Self {
        self.address_range = address_range.into();
        self
    }
}

/// Values applied to every outbound message unless the message says otherwise
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitDefaults {
    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub registered_delivery: bool,
}

impl Default for SubmitDefaults {
    fn default() -> Self {
        Self {
            service_type: String::new(),
            source_addr_ton: 0,
            source_addr_npi: 0,
            dest_addr_ton: 0,
            dest_addr_npi: 1,
            registered_delivery: true,
        }
    }
}

/// How messages longer than a single short_message are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongMessageMode {
    /// Send as is; the encoder rejects anything over 254 bytes
    #[default]
    Reject,
    /// Carry the whole message in the message_payload TLV
    MessagePayload,
    /// One submit_sm per part, linked through SAR TLVs
    Sar,
    /// One submit_sm per part, each prefixed with a concatenation UDH
    Udh,
}

/// Where a USSD dialogue stands after an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UssdSessionEvent {
    New,
    Continue,
    Close,
}

impl UssdSessionEvent {
    /// PSSR indication opens a dialogue, USSR request or response carries
    /// it on. Anything else, a PSSR response included, ends it.
    pub fn from_service_op(service_op: u8) -> Self {
        match service_op {
            0x01 => UssdSessionEvent::New,
            0x02 | 0x12 => UssdSessionEvent::Continue,
            _ => UssdSessionEvent::Close,
        }
    }
}

/// USSD dialogue details of an inbound deliver_sm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UssdSession {
    pub event: UssdSessionEvent,
    /// its_session_info without the end-of-session bit; hand it back in
    /// the [`UssdReply`]
    pub session_info: u16,
}

impl UssdSession {
    pub fn new(service_op: u8, its_session_info: u16) -> Self {
        let event = if its_session_info & 1 == 1 {
            UssdSessionEvent::Close
        } else {
            UssdSessionEvent::from_service_op(service_op)
        };
        UssdSession {
            event,
            session_info: its_session_info & 0xfffe,
        }
    }
}

/// Marks an outbound message as a reply within a USSD dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UssdReply {
    pub session_info: u16,
    pub continue_session: bool,
}

impl UssdReply {
    pub fn new(session_info: u16, continue_session: bool) -> Self {
        UssdReply {
            session_info,
            continue_session,
        }
    }

    /// USSR request, with the end-of-session bit set when the dialogue
    /// should close.
    pub fn tlvs(&self) -> [Tlv; 2] {
        let end = u16::from(!self.continue_session);
        [
            Tlv::from_u8(tags::USSD_SERVICE_OP, 0x02),
            Tlv::from_u16(tags::ITS_SESSION_INFO, self.session_info.wrapping_add(end)),
        ]
    }
}

/// One outbound message
///
/// ```
/// use smpp_esme::client::SubmitSmParams;
///
/// let params = SubmitSmParams::new("27831234567", "Hello!")
///     .source_addr("12345".to_string())
///     .data_coding(1);
/// assert_eq!(params.short_message.as_ref(), b"Hello!");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmitSmParams {
    pub destination_addr: String,
    pub source_addr: String,
    /// Already encoded user data
    pub short_message: Bytes,
    pub data_coding: u8,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub validity_period: String,
    pub schedule_delivery_time: String,
    /// Overrides the configured registered_delivery default
    pub registered_delivery: Option<bool>,
    pub optional_params: Vec<Tlv>,
    /// Sends the message as part of a USSD dialogue
    pub ussd: Option<UssdReply>,
}

impl SubmitSmParams {
    pub fn new(destination_addr: &str, short_message: impl Into<Bytes>) -> Self {
        Self {
            destination_addr: destination_addr.to_string(),
            short_message: short_message.into(),
            ..Default::default()
        }
    }

    crate::macros::builder_setters! {
        source_addr: String,
        data_coding: u8,
        esm_class: u8,
        protocol_id: u8,
        priority_flag: u8,
        validity_period: String,
        schedule_delivery_time: String,
        registered_delivery: Option<bool>,
        optional_params: Vec<Tlv>,
        ussd: Option<UssdReply>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_table_lines_up_with_modes() {
        assert_eq!(BindMode::Transmitter.request_id(), CommandId::BindTransmitter);
        assert_eq!(BindMode::Receiver.response_id(), CommandId::BindReceiverResp);
        assert_eq!(BindMode::Transceiver.bound_state(), SessionState::BoundTrx);
        assert_eq!(BindMode::Transmitter.bound_state(), SessionState::BoundTx);
    }

    #[test]
    fn bind_frame_carries_credentials() {
        let credentials = BindCredentials::new("esme", "secret").with_system_type("VMA");
        let frame = BindMode::Receiver.bind_frame(7, &credentials);

        assert_eq!(frame.command_id(), CommandId::BindReceiver);
        assert_eq!(frame.sequence_number(), 7);
        match frame {
            Frame::BindReceiver(pdu) => {
                assert_eq!(pdu.system_id, "esme");
                assert_eq!(pdu.system_type, "VMA");
                assert_eq!(pdu.interface_version, 0x34);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn ussd_service_ops_map_to_session_events() {
        assert_eq!(UssdSession::new(0x01, 0x0000).event, UssdSessionEvent::New);
        assert_eq!(UssdSession::new(0x02, 0x0000).event, UssdSessionEvent::Continue);
        assert_eq!(UssdSession::new(0x12, 0x0000).event, UssdSessionEvent::Continue);
        assert_eq!(UssdSession::new(0x11, 0x0000).event, UssdSessionEvent::Close);
        assert_eq!(UssdSession::new(0x20, 0x0000).event, UssdSessionEvent::Close);
    }

    #[test]
    fn ussd_end_flag_closes_and_is_stripped() {
        let session = UssdSession::new(0x01, 0x1a05);
        assert_eq!(session.event, UssdSessionEvent::Close);
        assert_eq!(session.session_info, 0x1a04);

        let session = UssdSession::new(0x02, 0x1a04);
        assert_eq!(session.event, UssdSessionEvent::Continue);
        assert_eq!(session.session_info, 0x1a04);
    }

    #[test]
    fn ussd_reply_sets_the_end_flag_when_closing() {
        let [op, info] = UssdReply::new(0x1a04, true).tlvs();
        assert_eq!(op.tag, tags::USSD_SERVICE_OP);
        assert_eq!(op.as_u8(), Some(0x02));
        assert_eq!(info.tag, tags::ITS_SESSION_INFO);
        assert_eq!(info.as_u16(), Some(0x1a04));

        let [_, info] = UssdReply::new(0x1a04, false).tlvs();
        assert_eq!(info.as_u16(), Some(0x1a05));
    }

    #[test]
    fn state_capabilities() {
        assert!(SessionState::BoundTrx.can_transmit());
        assert!(SessionState::BoundTrx.can_receive());
        assert!(!SessionState::BoundRx.can_transmit());
        assert!(!SessionState::BoundTx.can_receive());
        assert!(!SessionState::Open.is_bound());
        assert_eq!(SessionState::BoundTrx.to_string(), "BOUND_TRX");
    }

    #[test]
    fn bind_mode_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: BindMode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"receiver\"").unwrap();
        assert_eq!(parsed.mode, BindMode::Receiver);
    }
}
