// ABOUTME: Implements SMPP v3.4 query_sm and query_sm_resp PDUs for message status queries
// ABOUTME: The response reports the SMSC's message_state and final date for a submitted message

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
    encode_u8, encode_with_header,
};
use crate::datatypes::{CommandId, CommandStatus};
use bytes::{Buf, BytesMut};
use std::io::Cursor;

/// SMPP v3.4 query_sm PDU (Section 4.8.1)
///
/// The query_sm operation is used by an ESME to query the state of a previously submitted short message.
/// The matching algorithm used to find messages submitted by query_sm is a match of the source_addr and message_id fields.
/// Where the original submit_sm 'source_addr' was defaulted to NULL, then the source_addr in the query_sm should also be NULL.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// Message ID returned in the submit_sm_resp of the queried message
    pub message_id: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub source_addr: String,
}

impl QuerySm {
    pub fn new(sequence_number: u32, message_id: &str, source_addr: &str) -> Self {
        QuerySm {
            command_status: CommandStatus::Ok,
            sequence_number,
            message_id: message_id.to_string(),
            source_addr_ton: 0,
            source_addr_npi: 0,
            source_addr: source_addr.to_string(),
        }
    }

    crate::macros::builder_setters! {
        source_addr_ton: u8,
        source_addr_npi: u8,
    }
}

impl Decodable for QuerySm {
    fn command_id() -> CommandId {
        CommandId::QuerySm
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        Ok(QuerySm {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id: decode_cstring(buf, 65, "message_id")?,
            source_addr_ton: decode_u8(buf)?,
            source_addr_npi: decode_u8(buf)?,
            source_addr: decode_cstring(buf, 21, "source_addr")?,
        })
    }
}

impl Encodable for QuerySm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader::new(CommandId::QuerySm, self.command_status, self.sequence_number);
        encode_with_header(buf, &header, |buf| {
            encode_cstring(buf, &self.message_id, 65, "message_id")?;
            encode_u8(buf, self.source_addr_ton);
            encode_u8(buf, self.source_addr_npi);
            encode_cstring(buf, &self.source_addr, 21, "source_addr")
        })
    }
}

/// SMPP v3.4 query_sm_resp PDU (Section 4.8.2)
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: String,

    /// Date and time the message reached its final state, empty while the
    /// message is still pending
    pub final_date: String,

    /// Message state, same values as the message_state TLV (2 = DELIVERED)
    pub message_state: u8,

    /// Network specific error code, 0 when not applicable
    pub error_code: u8,
}

impl QuerySmResponse {
    pub fn new(sequence_number: u32, message_id: &str, message_state: u8) -> Self {
        QuerySmResponse {
            command_status: CommandStatus::Ok,
            sequence_number,
            message_id: message_id.to_string(),
            final_date: String::new(),
            message_state,
            error_code: 0,
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        QuerySmResponse {
            command_status: status,
            sequence_number,
            message_id: String::new(),
            final_date: String::new(),
            message_state: 0,
            error_code: 0,
        }
    }
}

impl Decodable for QuerySmResponse {
    fn command_id() -> CommandId {
        CommandId::QuerySmResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        if !buf.has_remaining() {
            return Ok(QuerySmResponse::error(
                header.sequence_number,
                header.command_status,
            ));
        }

        Ok(QuerySmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id: decode_cstring(buf, 65, "message_id")?,
            final_date: decode_cstring(buf, 17, "final_date")?,
            message_state: decode_u8(buf)?,
            error_code: decode_u8(buf)?,
        })
    }
}

impl Encodable for QuerySmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader::new(
            CommandId::QuerySmResp,
            self.command_status,
            self.sequence_number,
        );
        encode_with_header(buf, &header, |buf| {
            encode_cstring(buf, &self.message_id, 65, "message_id")?;
            encode_cstring(buf, &self.final_date, 17, "final_date")?;
            encode_u8(buf, self.message_state);
            encode_u8(buf, self.error_code);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;

    #[test]
    fn query_sm_to_bytes() {
        let bytes = QuerySm::new(5, "ab", "12").to_bytes().unwrap();

        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x18, // command_length
            0x00, 0x00, 0x00, 0x03, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x05, // sequence_number
            0x61, 0x62, 0x00, // message_id
            0x00, 0x00, // source_addr_ton, source_addr_npi
            0x31, 0x32, 0x00, // source_addr
        ];
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn query_sm_resp_with_final_date() {
        let mut resp = QuerySmResponse::new(5, "ab", 2);
        resp.final_date = "120123171800000+".to_string();

        let bytes = resp.to_bytes().unwrap();
        assert_eq!(Frame::parse(&bytes).unwrap(), Frame::QuerySmResp(resp));
    }

    #[test]
    fn query_sm_resp_error_without_body() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x03, // query_sm_resp
            0x00, 0x00, 0x00, 0x67, // ESME_RQUERYFAIL
            0x00, 0x00, 0x00, 0x02, // sequence_number
        ];
        let Frame::QuerySmResp(resp) = Frame::parse(data).unwrap() else {
            panic!("Expected QuerySmResp");
        };
        assert_eq!(resp.command_status, CommandStatus::QuerySmRequestFailed);
        assert!(resp.message_id.is_empty());
    }
}
