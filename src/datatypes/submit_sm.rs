use crate::codec::{CodecError, Decodable, Encodable, PduHeader, decode_cstring, encode_cstring};
use crate::datatypes::{CommandId, CommandStatus, Tlv};
use crate::macros::impl_short_message_pdu;
use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

/// submit_sm is issued by the ESME to submit a short message to the SMSC for
/// transmission to a specified subscriber (SMPP v3.4 Section 4.4.1).
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// The service_type parameter can be used to indicate the SMS Application
    /// service associated with the message. NULL selects the SMSC default.
    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    /// Address of the SME which originated this message (max 20 chars)
    pub source_addr: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    /// Destination address of this short message (max 20 chars)
    pub destination_addr: String,
    /// Message mode and type; bit 6 (0x40) flags a UDH in short_message
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub validity_period: String,
    /// Whether an SMSC delivery receipt is requested
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    /// Up to 254 octets of user data; sm_length is derived from it
    pub short_message: Bytes,
    pub optional_params: Vec<Tlv>,
}

impl SubmitSm {
    pub fn new(sequence_number: u32, destination_addr: &str, short_message: impl Into<Bytes>) -> Self {
        SubmitSm {
            command_status: CommandStatus::Ok,
            sequence_number,
            service_type: String::new(),
            source_addr_ton: 0,
            source_addr_npi: 0,
            source_addr: String::new(),
            dest_addr_ton: 0,
            dest_addr_npi: 0,
            destination_addr: destination_addr.to_string(),
            esm_class: 0,
            protocol_id: 0,
            priority_flag: 0,
            schedule_delivery_time: String::new(),
            validity_period: String::new(),
            registered_delivery: 0,
            replace_if_present_flag: 0,
            data_coding: 0,
            sm_default_msg_id: 0,
            short_message: short_message.into(),
            optional_params: Vec::new(),
        }
    }
}

impl_short_message_pdu!(SubmitSm, CommandId::SubmitSm);

/// submit_sm_resp carries the SMSC assigned message_id on success.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// SMSC message ID of the submitted message, empty when the SMSC omits
    /// the body of an error response
    pub message_id: String,
}

impl SubmitSmResponse {
    pub fn new(sequence_number: u32, message_id: &str) -> Self {
        SubmitSmResponse {
            command_status: CommandStatus::Ok,
            sequence_number,
            message_id: message_id.to_string(),
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        SubmitSmResponse {
            command_status: status,
            sequence_number,
            message_id: String::new(),
        }
    }
}

impl Decodable for SubmitSmResponse {
    fn command_id() -> CommandId {
        CommandId::SubmitSmResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let message_id = if buf.has_remaining() {
            decode_cstring(buf, 65, "message_id")?
        } else {
            String::new()
        };

        Ok(SubmitSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
        })
    }
}

impl Encodable for SubmitSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader::new(
            CommandId::SubmitSmResp,
            self.command_status,
            self.sequence_number,
        );
        crate::codec::encode_with_header(buf, &header, |buf| {
            encode_cstring(buf, &self.message_id, 65, "message_id")
        })
    }
}
