use crate::codec::{CodecError, Decodable, Encodable, PduHeader, decode_cstring};
use crate::datatypes::{CommandId, CommandStatus, Tlv};
use crate::macros::{impl_header_only_constructors, impl_short_message_pdu};
use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

/// deliver_sm is issued by the SMSC to send a message to an ESME: either a
/// mobile originated message or an SMSC delivery receipt
/// (SMPP v3.4 Section 4.6.1).
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub source_addr: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub destination_addr: String,
    /// 0x04 marks an SMSC delivery receipt, 0x40 a UDH in short_message
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    /// Always NULL for deliver_sm
    pub schedule_delivery_time: String,
    /// Always NULL for deliver_sm
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
    pub optional_params: Vec<Tlv>,
}

impl DeliverSm {
    pub fn new(
        sequence_number: u32,
        source_addr: &str,
        destination_addr: &str,
        short_message: impl Into<Bytes>,
    ) -> Self {
        DeliverSm {
            command_status: CommandStatus::Ok,
            sequence_number,
            service_type: String::new(),
            source_addr_ton: 0,
            source_addr_npi: 0,
            source_addr: source_addr.to_string(),
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

impl_short_message_pdu!(DeliverSm, CommandId::DeliverSm);

/// deliver_sm_resp. Its message_id is unused in v3.4 and always NULL.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl_header_only_constructors!(DeliverSmResponse);

impl Decodable for DeliverSmResponse {
    fn command_id() -> CommandId {
        CommandId::DeliverSmResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        if buf.has_remaining() {
            decode_cstring(buf, 65, "message_id")?;
        }

        Ok(DeliverSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }
}

impl Encodable for DeliverSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader::new(
            CommandId::DeliverSmResp,
            self.command_status,
            self.sequence_number,
        );
        crate::codec::encode_with_header(buf, &header, |buf| {
            crate::codec::encode_u8(buf, 0);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;
    use crate::datatypes::tags;

    #[test]
    fn deliver_sm_resp_carries_null_message_id() {
        let bytes = DeliverSmResponse::new(12).to_bytes().unwrap();
        assert_eq!(bytes.len(), 17);
        assert_eq!(bytes[16], 0);
    }

    #[test]
    fn delivery_receipt_tlvs_are_kept_in_order() {
        let deliver = DeliverSm::new(8, "27831234567", "1234", Bytes::new())
            .esm_class(0x04)
            .optional_params(vec![
                Tlv::from_cstring(tags::RECEIPTED_MESSAGE_ID, "msg-1"),
                Tlv::from_u8(tags::MESSAGE_STATE, 2),
            ]);

        let bytes = deliver.to_bytes().unwrap();
        let Frame::DeliverSm(decoded) = Frame::parse(&bytes).unwrap() else {
            panic!("Expected DeliverSm");
        };
        assert_eq!(decoded.optional_params[0].tag, tags::RECEIPTED_MESSAGE_ID);
        assert_eq!(decoded.tlv(tags::MESSAGE_STATE).and_then(Tlv::as_u8), Some(2));
        assert_eq!(*decoded, deliver);
    }

    #[test]
    fn sm_length_past_end_of_body_is_rejected() {
        let mut bytes = BytesMut::from(
            DeliverSm::new(1, "1", "2", "abc").to_bytes().unwrap().as_ref(),
        );
        // Chop the last byte of short_message and fix the length
        bytes.truncate(bytes.len() - 1);
        let length = bytes.len() as u32;
        bytes[0..4].copy_from_slice(&length.to_be_bytes());

        assert!(matches!(
            Frame::parse(&bytes).unwrap(),
            Frame::Unknown { .. }
        ));
    }
}
