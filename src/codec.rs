// SMPP v3.4 Codec - Separates parsing/encoding logic from domain models
//
// Each PDU implements Encodable/Decodable; the registry maps a command_id to
// the decoder for its body. Anything the registry cannot decode becomes an
// opaque `Frame::Unknown` so a single odd PDU never tears down a session.

use crate::datatypes::{
    BindReceiver, BindReceiverResponse, BindTransceiver, BindTransceiverResponse,
    BindTransmitter, BindTransmitterResponse, CommandId, CommandStatus, DeliverSm,
    DeliverSmResponse, EnquireLink, EnquireLinkResponse, GenericNack, QuerySm, QuerySmResponse,
    SubmitMulti, SubmitMultiResponse, SubmitSm, SubmitSmResponse, Unbind, UnbindResponse,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::LazyLock;
use thiserror::Error;

/// Maximum allowed PDU size to prevent memory exhaustion attacks
pub const MAX_PDU_SIZE: u32 = 65536; // 64KB

/// SMPP v3.4 PDU Header (16 bytes, common to all PDUs)
#[derive(Debug, Clone, PartialEq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: CommandId,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    /// Header for an outbound PDU; `command_length` is patched by `to_bytes`.
    pub fn new(command_id: CommandId, command_status: CommandStatus, sequence_number: u32) -> Self {
        PduHeader {
            command_length: 0,
            command_id,
            command_status,
            sequence_number,
        }
    }

    /// Decode PDU header from buffer.
    ///
    /// Only the length is validated: command ids and statuses outside the
    /// SMPP v3.4 tables are carried through as `Unknown`/`Other`.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let command_length = buf.get_u32();
        let command_id = CommandId::from(buf.get_u32());
        let command_status = CommandStatus::from(buf.get_u32());
        let sequence_number = buf.get_u32();

        validate_length(command_length)?;

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    /// Encode PDU header to buffer
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id.into());
        buf.put_u32(self.command_status.into());
        buf.put_u32(self.sequence_number);
        Ok(())
    }
}

pub(crate) fn validate_length(command_length: u32) -> Result<(), CodecError> {
    if !(PduHeader::SIZE as u32..=MAX_PDU_SIZE).contains(&command_length) {
        return Err(CodecError::InvalidPduLength {
            length: command_length,
            min: PduHeader::SIZE as u32,
            max: MAX_PDU_SIZE,
        });
    }
    Ok(())
}

/// Write `header`, then the body produced by `body`, then patch
/// command_length with the real size.
pub(crate) fn encode_with_header<F>(
    buf: &mut BytesMut,
    header: &PduHeader,
    body: F,
) -> Result<(), CodecError>
where
    F: FnOnce(&mut BytesMut) -> Result<(), CodecError>,
{
    let start = buf.len();
    header.encode(buf)?;
    body(buf)?;

    let length = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&length.to_be_bytes());
    Ok(())
}

/// Trait for types that can be encoded to bytes
pub trait Encodable {
    /// Encode this PDU (header included) to the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Calculate the encoded size without keeping the encoding around
    fn encoded_size(&self) -> usize {
        let mut buf = BytesMut::new();
        self.encode(&mut buf).map(|_| buf.len()).unwrap_or(0)
    }

    /// Encode into a fresh buffer and fix up the command_length field.
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;

        let length = buf.len() as u32;
        validate_length(length)?;
        buf[0..4].copy_from_slice(&length.to_be_bytes());

        Ok(buf.freeze())
    }
}

/// Trait for types that can be decoded from bytes
pub trait Decodable: Sized {
    /// Decode this PDU from the buffer after header
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    /// Return the expected command_id for this PDU type
    fn command_id() -> CommandId;

    /// Validate the header is appropriate for this PDU type
    fn validate_header(header: &PduHeader) -> Result<(), CodecError> {
        if header.command_id != Self::command_id() {
            return Err(CodecError::UnexpectedCommandId {
                expected: Self::command_id(),
                actual: header.command_id,
            });
        }
        Ok(())
    }
}

/// Codec errors with detailed context for debugging
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Incomplete PDU: need more data")]
    Incomplete,

    #[error("Invalid PDU length: {length}, must be {min}-{max}")]
    InvalidPduLength { length: u32, min: u32, max: u32 },

    #[error("Unexpected command_id: expected {expected:?}, got {actual:?}")]
    UnexpectedCommandId {
        expected: CommandId,
        actual: CommandId,
    },

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("TLV parsing error: {0}")]
    TlvError(String),

    #[error("UTF-8 decoding error in field '{field}': {source}")]
    Utf8Error {
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Cannot encode opaque {0:?} frame without its header")]
    Unencodable(CommandId),
}

/// Convert codec errors to appropriate SMPP command_status codes
impl CodecError {
    pub fn to_command_status(&self) -> CommandStatus {
        match self {
            CodecError::InvalidPduLength { .. } => CommandStatus::InvalidCommandLength,
            CodecError::UnexpectedCommandId { .. } => CommandStatus::InvalidCommandId,
            CodecError::FieldValidation { field, .. } => match *field {
                "source_addr" => CommandStatus::InvalidSourceAddress,
                "destination_addr" => CommandStatus::InvalidDestinationAddress,
                "short_message" => CommandStatus::InvalidMsgLength,
                "system_id" => CommandStatus::InvalidSystemId,
                "password" => CommandStatus::InvalidPassword,
                _ => CommandStatus::SystemError,
            },
            CodecError::TlvError(_) => CommandStatus::ErrorInOptionalPartOfPduBody,
            _ => CommandStatus::SystemError,
        }
    }
}

/// Decode a NUL terminated C-Octet string of at most `max_len` bytes
/// (terminator included).
pub fn decode_cstring(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field_name: &'static str,
) -> Result<String, CodecError> {
    let window = &buf.chunk()[..buf.remaining().min(max_len)];
    let Some(end) = window.iter().position(|&b| b == 0) else {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: format!("no NUL terminator within {max_len} bytes"),
        });
    };

    let value = window[..end].to_vec();
    buf.advance(end + 1);

    String::from_utf8(value).map_err(|e| CodecError::Utf8Error {
        field: field_name,
        source: e,
    })
}

/// Decode `len` raw octets
pub fn decode_octets(
    buf: &mut Cursor<&[u8]>,
    len: usize,
    field_name: &'static str,
) -> Result<Bytes, CodecError> {
    if buf.remaining() < len {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: format!("declared {len} bytes, only {} left", buf.remaining()),
        });
    }
    Ok(buf.copy_to_bytes(len))
}

/// Decode a single byte
pub fn decode_u8(buf: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u8())
}

/// Decode a 16-bit big-endian integer
pub fn decode_u16(buf: &mut Cursor<&[u8]>) -> Result<u16, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u16())
}

/// Decode a 32-bit big-endian integer
pub fn decode_u32(buf: &mut Cursor<&[u8]>) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u32())
}

/// Encode a C-Octet string, rejecting values that do not fit `max_len`
/// (terminator included).
pub fn encode_cstring(
    buf: &mut BytesMut,
    value: &str,
    max_len: usize,
    field_name: &'static str,
) -> Result<(), CodecError> {
    let bytes = value.as_bytes();
    if bytes.len() + 1 > max_len {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: format!("{} bytes exceeds the limit of {}", bytes.len(), max_len - 1),
        });
    }
    if bytes.contains(&0) {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: "embedded NUL".to_string(),
        });
    }
    buf.put_slice(bytes);
    buf.put_u8(0);
    Ok(())
}

/// Encode a single byte
pub fn encode_u8(buf: &mut BytesMut, value: u8) {
    buf.put_u8(value);
}

/// Encode a 32-bit big-endian integer
pub fn encode_u32(buf: &mut BytesMut, value: u32) {
    buf.put_u32(value);
}

/// Generic frame type that can hold any PDU
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    // Keep-alive PDUs
    EnquireLink(EnquireLink),
    EnquireLinkResp(EnquireLinkResponse),

    // Session management PDUs
    BindTransmitter(BindTransmitter),
    BindTransmitterResp(BindTransmitterResponse),
    BindReceiver(BindReceiver),
    BindReceiverResp(BindReceiverResponse),
    BindTransceiver(BindTransceiver),
    BindTransceiverResp(BindTransceiverResponse),
    Unbind(Unbind),
    UnbindResp(UnbindResponse),

    // Message PDUs
    SubmitSm(Box<SubmitSm>),
    SubmitSmResp(SubmitSmResponse),
    SubmitMulti(Box<SubmitMulti>),
    SubmitMultiResp(SubmitMultiResponse),
    DeliverSm(Box<DeliverSm>),
    DeliverSmResp(DeliverSmResponse),
    QuerySm(QuerySm),
    QuerySmResp(QuerySmResponse),

    GenericNack(GenericNack),

    // Unknown command ids and bodies that failed to parse
    Unknown { header: PduHeader, body: Bytes },
}

/// Registry of PDU decoders for extensible parsing
type DecoderFn =
    Box<dyn Fn(PduHeader, &mut Cursor<&[u8]>) -> Result<Frame, CodecError> + Send + Sync>;

pub struct PduRegistry {
    decoders: HashMap<CommandId, DecoderFn>,
}

static REGISTRY: LazyLock<PduRegistry> = LazyLock::new(PduRegistry::new);

impl PduRegistry {
    /// Create a new registry with the SMPP v3.4 PDUs this crate speaks
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };

        registry.register_pdu::<EnquireLink, _>(Frame::EnquireLink);
        registry.register_pdu::<EnquireLinkResponse, _>(Frame::EnquireLinkResp);
        registry.register_pdu::<Unbind, _>(Frame::Unbind);
        registry.register_pdu::<UnbindResponse, _>(Frame::UnbindResp);
        registry.register_pdu::<GenericNack, _>(Frame::GenericNack);

        registry.register_pdu::<BindTransmitter, _>(Frame::BindTransmitter);
        registry.register_pdu::<BindTransmitterResponse, _>(Frame::BindTransmitterResp);
        registry.register_pdu::<BindReceiver, _>(Frame::BindReceiver);
        registry.register_pdu::<BindReceiverResponse, _>(Frame::BindReceiverResp);
        registry.register_pdu::<BindTransceiver, _>(Frame::BindTransceiver);
        registry.register_pdu::<BindTransceiverResponse, _>(Frame::BindTransceiverResp);

        // Message PDUs (boxed for large structs)
        registry.register_pdu::<SubmitSm, _>(|pdu| Frame::SubmitSm(Box::new(pdu)));
        registry.register_pdu::<SubmitSmResponse, _>(Frame::SubmitSmResp);
        registry.register_pdu::<SubmitMulti, _>(|pdu| Frame::SubmitMulti(Box::new(pdu)));
        registry.register_pdu::<SubmitMultiResponse, _>(Frame::SubmitMultiResp);
        registry.register_pdu::<DeliverSm, _>(|pdu| Frame::DeliverSm(Box::new(pdu)));
        registry.register_pdu::<DeliverSmResponse, _>(Frame::DeliverSmResp);
        registry.register_pdu::<QuerySm, _>(Frame::QuerySm);
        registry.register_pdu::<QuerySmResponse, _>(Frame::QuerySmResp);

        registry
    }

    fn register_pdu<T, F>(&mut self, frame_constructor: F)
    where
        T: Decodable + 'static,
        F: Fn(T) -> Frame + Send + Sync + 'static,
    {
        let command_id = T::command_id();
        let decoder = Box::new(move |header: PduHeader, buf: &mut Cursor<&[u8]>| {
            let pdu = T::decode(header, buf)?;
            Ok(frame_constructor(pdu))
        });
        self.decoders.insert(command_id, decoder);
    }

    /// Decode a PDU body. `buf` must hold exactly the body of one frame.
    ///
    /// Unregistered commands and bodies the typed decoder rejects are
    /// returned as `Frame::Unknown` with the raw body.
    pub fn decode_pdu(&self, header: PduHeader, buf: &mut Cursor<&[u8]>) -> Frame {
        let start = buf.position();

        let Some(decoder) = self.decoders.get(&header.command_id) else {
            tracing::warn!(
                "Unknown PDU command_id: {:#x}, treating as opaque data",
                u32::from(header.command_id)
            );
            let body = buf.copy_to_bytes(buf.remaining());
            return Frame::Unknown { header, body };
        };

        match decoder(header.clone(), buf) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    command = header.command_id.name(),
                    sequence_number = header.sequence_number,
                    "Undecodable {} body, passing it on as opaque data: {}",
                    header.command_id.name(),
                    e
                );
                buf.set_position(start);
                let body = buf.copy_to_bytes(buf.remaining());
                Frame::Unknown { header, body }
            }
        }
    }

    /// Check if a command_id is registered
    pub fn is_registered(&self, command_id: CommandId) -> bool {
        self.decoders.contains_key(&command_id)
    }
}

impl Default for PduRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    /// Get the command_id for this frame
    pub fn command_id(&self) -> CommandId {
        match self {
            Frame::EnquireLink(_) => CommandId::EnquireLink,
            Frame::EnquireLinkResp(_) => CommandId::EnquireLinkResp,
            Frame::BindTransmitter(_) => CommandId::BindTransmitter,
            Frame::BindTransmitterResp(_) => CommandId::BindTransmitterResp,
            Frame::BindReceiver(_) => CommandId::BindReceiver,
            Frame::BindReceiverResp(_) => CommandId::BindReceiverResp,
            Frame::BindTransceiver(_) => CommandId::BindTransceiver,
            Frame::BindTransceiverResp(_) => CommandId::BindTransceiverResp,
            Frame::Unbind(_) => CommandId::Unbind,
            Frame::UnbindResp(_) => CommandId::UnbindResp,
            Frame::SubmitSm(_) => CommandId::SubmitSm,
            Frame::SubmitSmResp(_) => CommandId::SubmitSmResp,
            Frame::SubmitMulti(_) => CommandId::SubmitMulti,
            Frame::SubmitMultiResp(_) => CommandId::SubmitMultiResp,
            Frame::DeliverSm(_) => CommandId::DeliverSm,
            Frame::DeliverSmResp(_) => CommandId::DeliverSmResp,
            Frame::QuerySm(_) => CommandId::QuerySm,
            Frame::QuerySmResp(_) => CommandId::QuerySmResp,
            Frame::GenericNack(_) => CommandId::GenericNack,
            Frame::Unknown { header, .. } => header.command_id,
        }
    }

    /// Get the sequence number for this frame
    pub fn sequence_number(&self) -> u32 {
        match self {
            Frame::EnquireLink(pdu) => pdu.sequence_number,
            Frame::EnquireLinkResp(pdu) => pdu.sequence_number,
            Frame::BindTransmitter(pdu) => pdu.sequence_number,
            Frame::BindTransmitterResp(pdu) => pdu.sequence_number,
            Frame::BindReceiver(pdu) => pdu.sequence_number,
            Frame::BindReceiverResp(pdu) => pdu.sequence_number,
            Frame::BindTransceiver(pdu) => pdu.sequence_number,
            Frame::BindTransceiverResp(pdu) => pdu.sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number,
            Frame::UnbindResp(pdu) => pdu.sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number,
            Frame::SubmitSmResp(pdu) => pdu.sequence_number,
            Frame::SubmitMulti(pdu) => pdu.sequence_number,
            Frame::SubmitMultiResp(pdu) => pdu.sequence_number,
            Frame::DeliverSm(pdu) => pdu.sequence_number,
            Frame::DeliverSmResp(pdu) => pdu.sequence_number,
            Frame::QuerySm(pdu) => pdu.sequence_number,
            Frame::QuerySmResp(pdu) => pdu.sequence_number,
            Frame::GenericNack(pdu) => pdu.sequence_number,
            Frame::Unknown { header, .. } => header.sequence_number,
        }
    }

    /// Check if this frame is a response PDU
    pub fn is_response(&self) -> bool {
        self.command_id().is_response()
    }

    /// Check whether `buf` starts with a complete frame.
    ///
    /// Returns the frame length on success. `Incomplete` means more bytes are
    /// needed; any other error means the stream cannot be resynchronised.
    pub fn check(buf: &mut Cursor<&[u8]>) -> Result<usize, crate::frame::Error> {
        if buf.remaining() < PduHeader::SIZE {
            return Err(crate::frame::Error::Incomplete);
        }

        // Peek at command_length without advancing cursor
        let pos = buf.position();
        let command_length = buf.get_u32();
        buf.set_position(pos);

        validate_length(command_length)?;

        if buf.remaining() < command_length as usize {
            return Err(crate::frame::Error::Incomplete);
        }

        Ok(command_length as usize)
    }

    /// Parse exactly one complete frame.
    pub fn parse(data: &[u8]) -> Result<Frame, CodecError> {
        let mut cursor = Cursor::new(data);
        let header = PduHeader::decode(&mut cursor)?;
        let length = header.command_length as usize;
        if data.len() < length {
            return Err(CodecError::Incomplete);
        }

        let mut body = Cursor::new(&data[PduHeader::SIZE..length]);
        Ok(REGISTRY.decode_pdu(header, &mut body))
    }

    /// Encode this frame for the wire.
    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        match self {
            Frame::EnquireLink(pdu) => pdu.to_bytes(),
            Frame::EnquireLinkResp(pdu) => pdu.to_bytes(),
            Frame::BindTransmitter(pdu) => pdu.to_bytes(),
            Frame::BindTransmitterResp(pdu) => pdu.to_bytes(),
            Frame::BindReceiver(pdu) => pdu.to_bytes(),
            Frame::BindReceiverResp(pdu) => pdu.to_bytes(),
            Frame::BindTransceiver(pdu) => pdu.to_bytes(),
            Frame::BindTransceiverResp(pdu) => pdu.to_bytes(),
            Frame::Unbind(pdu) => pdu.to_bytes(),
            Frame::UnbindResp(pdu) => pdu.to_bytes(),
            Frame::SubmitSm(pdu) => pdu.to_bytes(),
            Frame::SubmitSmResp(pdu) => pdu.to_bytes(),
            Frame::SubmitMulti(pdu) => pdu.to_bytes(),
            Frame::SubmitMultiResp(pdu) => pdu.to_bytes(),
            Frame::DeliverSm(pdu) => pdu.to_bytes(),
            Frame::DeliverSmResp(pdu) => pdu.to_bytes(),
            Frame::QuerySm(pdu) => pdu.to_bytes(),
            Frame::QuerySmResp(pdu) => pdu.to_bytes(),
            Frame::GenericNack(pdu) => pdu.to_bytes(),
            Frame::Unknown { header, body } => {
                let mut buf = BytesMut::with_capacity(PduHeader::SIZE + body.len());
                header.encode(&mut buf)?;
                buf.put_slice(body);
                let length = buf.len() as u32;
                validate_length(length)?;
                buf[0..4].copy_from_slice(&length.to_be_bytes());
                Ok(buf.freeze())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{Tlv, tags};

    fn roundtrip(frame: Frame) {
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(
            u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize,
            bytes.len()
        );
        assert_eq!(Frame::parse(&bytes).unwrap(), frame);
    }

    #[test]
    fn pdu_header_encode_decode() {
        let header = PduHeader {
            command_length: 24,
            command_id: CommandId::EnquireLink,
            command_status: CommandStatus::Ok,
            sequence_number: 42,
        };

        let mut buf = BytesMut::new();
        header.encode(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf.as_ref());
        let decoded = PduHeader::decode(&mut cursor).unwrap();

        assert_eq!(header, decoded);
    }

    #[test]
    fn pdu_header_validation() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x08, // command_length too small
            0x00, 0x00, 0x00, 0x15, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
        ];
        let mut cursor = Cursor::new(data);

        let result = PduHeader::decode(&mut cursor);
        assert!(matches!(result, Err(CodecError::InvalidPduLength { .. })));
    }

    #[test]
    fn vendor_status_survives_decoding() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x11, // command_length
            0x80, 0x00, 0x00, 0x04, // submit_sm_resp
            0x00, 0x00, 0x04, 0x01, // vendor command_status
            0x00, 0x00, 0x00, 0x07, // sequence_number
            0x00, // empty message_id
        ];
        match Frame::parse(data).unwrap() {
            Frame::SubmitSmResp(resp) => {
                assert_eq!(resp.command_status, CommandStatus::Other(0x401));
                assert_eq!(resp.message_id, "");
            }
            other => panic!("Expected SubmitSmResp, got {other:?}"),
        }
    }

    #[test]
    fn decode_cstring_stops_at_nul() {
        let data = b"hello\0rest";
        let mut cursor = Cursor::new(&data[..]);
        let result = decode_cstring(&mut cursor, 10, "test").unwrap();
        assert_eq!(result, "hello");
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn decode_cstring_requires_terminator_within_limit() {
        let data = b"toolongvalue\0";
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            decode_cstring(&mut cursor, 6, "service_type"),
            Err(CodecError::FieldValidation {
                field: "service_type",
                ..
            })
        ));
    }

    #[test]
    fn encode_cstring_enforces_limit() {
        let mut buf = BytesMut::new();
        encode_cstring(&mut buf, "hello", 6, "test").unwrap();
        assert_eq!(buf.as_ref(), b"hello\0");

        let err = encode_cstring(&mut buf, "123456789", 9, "password").unwrap_err();
        assert_eq!(err.to_command_status(), CommandStatus::InvalidPassword);
    }

    #[test]
    fn unknown_command_decodes_to_opaque_frame() {
        let mut pdu_data = Vec::new();
        pdu_data.extend_from_slice(&20u32.to_be_bytes());
        pdu_data.extend_from_slice(&0x0000_000Au32.to_be_bytes());
        pdu_data.extend_from_slice(&0u32.to_be_bytes());
        pdu_data.extend_from_slice(&1u32.to_be_bytes());
        pdu_data.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        let frame = Frame::parse(&pdu_data).unwrap();
        match &frame {
            Frame::Unknown { header, body } => {
                assert_eq!(header.command_id, CommandId::Unknown(0x0A));
                assert_eq!(body.as_ref(), &[0x01, 0x02, 0x03, 0x04]);
            }
            other => panic!("Expected Unknown frame, got {other:?}"),
        }
        assert_eq!(frame.to_bytes().unwrap().as_ref(), pdu_data.as_slice());
    }

    #[test]
    fn malformed_body_decodes_to_opaque_frame() {
        // submit_sm whose service_type is never terminated
        let mut pdu_data = Vec::new();
        pdu_data.extend_from_slice(&24u32.to_be_bytes());
        pdu_data.extend_from_slice(&0x0000_0004u32.to_be_bytes());
        pdu_data.extend_from_slice(&0u32.to_be_bytes());
        pdu_data.extend_from_slice(&9u32.to_be_bytes());
        pdu_data.extend_from_slice(b"ABCDEFGH");

        let frame = Frame::parse(&pdu_data).unwrap();
        assert!(matches!(
            frame,
            Frame::Unknown { ref header, ref body }
                if header.command_id == CommandId::SubmitSm && body.len() == 8
        ));
        assert_eq!(frame.sequence_number(), 9);
    }

    #[test]
    fn supported_pdus_survive_encode_decode() {
        roundtrip(Frame::BindTransceiver(crate::datatypes::BindTransceiver {
            command_status: CommandStatus::Ok,
            sequence_number: 1,
            system_id: "SMPP3TEST".to_string(),
            password: "secret08".to_string(),
            system_type: "SUBMIT1".to_string(),
            interface_version: 0x34,
            addr_ton: 1,
            addr_npi: 1,
            address_range: String::new(),
        }));
        roundtrip(Frame::BindTransceiverResp(
            crate::datatypes::BindTransceiverResponse::new(1, "SMSC"),
        ));

        let mut submit = SubmitSm::new(2, "27831234567", "Hello");
        submit.source_addr = "1234".to_string();
        submit.registered_delivery = 1;
        submit.data_coding = 8;
        submit.optional_params = vec![Tlv::from_u16(tags::SAR_MSG_REF_NUM, 77)];
        roundtrip(Frame::SubmitSm(Box::new(submit)));
        roundtrip(Frame::SubmitSmResp(SubmitSmResponse::new(2, "msg-1")));

        let mut deliver = DeliverSm::new(3, "27831234567", "12345", "Hi there");
        deliver.optional_params = vec![
            Tlv::from_cstring(tags::RECEIPTED_MESSAGE_ID, "abc"),
            Tlv::from_u8(tags::MESSAGE_STATE, 2),
        ];
        roundtrip(Frame::DeliverSm(Box::new(deliver)));
        roundtrip(Frame::DeliverSmResp(DeliverSmResponse::new(3)));

        roundtrip(Frame::EnquireLink(EnquireLink::new(4)));
        roundtrip(Frame::EnquireLinkResp(EnquireLinkResponse::new(4)));
    }

    #[test]
    fn frame_accessors() {
        let frame = Frame::EnquireLink(EnquireLink::new(42));

        assert_eq!(frame.command_id(), CommandId::EnquireLink);
        assert_eq!(frame.sequence_number(), 42);
        assert!(!frame.is_response());

        let frame = Frame::EnquireLinkResp(EnquireLinkResponse::new(43));

        assert_eq!(frame.command_id(), CommandId::EnquireLinkResp);
        assert_eq!(frame.sequence_number(), 43);
        assert!(frame.is_response());
    }

    #[test]
    fn registry_has_session_pdus() {
        let registry = PduRegistry::new();
        for id in [
            CommandId::BindTransmitterResp,
            CommandId::BindReceiverResp,
            CommandId::BindTransceiverResp,
            CommandId::SubmitSmResp,
            CommandId::SubmitMultiResp,
            CommandId::DeliverSm,
            CommandId::QuerySmResp,
            CommandId::EnquireLink,
            CommandId::Unbind,
            CommandId::GenericNack,
        ] {
            assert!(registry.is_registered(id), "{id:?} not registered");
        }
        assert!(!registry.is_registered(CommandId::DataSm));
    }
}
