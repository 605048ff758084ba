use crate::codec::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// Optional parameter tags used by this crate (SMPP v3.4 Section 5.3.2).
pub mod tags {
    pub const RECEIPTED_MESSAGE_ID: u16 = 0x001E;
    pub const USER_MESSAGE_REFERENCE: u16 = 0x0204;
    pub const SOURCE_PORT: u16 = 0x020A;
    pub const DESTINATION_PORT: u16 = 0x020B;
    pub const SAR_MSG_REF_NUM: u16 = 0x020C;
    pub const SAR_TOTAL_SEGMENTS: u16 = 0x020E;
    pub const SAR_SEGMENT_SEQNUM: u16 = 0x020F;
    pub const MESSAGE_PAYLOAD: u16 = 0x0424;
    pub const MESSAGE_STATE: u16 = 0x0427;
    pub const USSD_SERVICE_OP: u16 = 0x0501;
    pub const ITS_SESSION_INFO: u16 = 0x1383;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tlv {
    /// The Tag field is used to uniquely identify the particular optional parameter in question.
    pub tag: u16,

    /// The Value field contains the actual data for the optional parameter in question.
    /// The Length field on the wire is derived from it.
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        Tlv {
            tag,
            value: value.into(),
        }
    }

    pub fn from_u8(tag: u16, value: u8) -> Self {
        Tlv::new(tag, vec![value])
    }

    pub fn from_u16(tag: u16, value: u16) -> Self {
        Tlv::new(tag, value.to_be_bytes().to_vec())
    }

    /// A C-Octet string value, NUL terminated on the wire.
    pub fn from_cstring(tag: u16, value: &str) -> Self {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        Tlv::new(tag, bytes)
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self.value.as_ref() {
            [v] => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self.value.as_ref() {
            [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
            // Some SMSCs send sar_msg_ref_num as a single octet
            [v] => Some(*v as u16),
            _ => None,
        }
    }

    /// Reads the value as text, tolerating a missing NUL terminator.
    pub fn as_cstring(&self) -> String {
        let end = self
            .value
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.value.len());
        String::from_utf8_lossy(&self.value[..end]).into_owned()
    }

    pub fn encoded_size(&self) -> usize {
        4 + self.value.len()
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let length = u16::try_from(self.value.len()).map_err(|_| {
            CodecError::TlvError(format!(
                "value of tag {:#06x} is {} bytes, over the 65535 limit",
                self.tag,
                self.value.len()
            ))
        })?;
        buf.put_u16(self.tag);
        buf.put_u16(length);
        buf.put_slice(&self.value);
        Ok(())
    }

    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::TlvError(format!(
                "{} trailing bytes cannot hold a tag and length",
                buf.remaining()
            )));
        }
        let tag = buf.get_u16();
        let length = buf.get_u16() as usize;
        if buf.remaining() < length {
            return Err(CodecError::TlvError(format!(
                "tag {tag:#06x} declares {length} bytes, only {} left",
                buf.remaining()
            )));
        }
        Ok(Tlv {
            tag,
            value: buf.copy_to_bytes(length),
        })
    }
}

/// Decode every TLV left in the buffer.
pub fn decode_tlvs(buf: &mut Cursor<&[u8]>) -> Result<Vec<Tlv>, CodecError> {
    let mut tlvs = Vec::new();
    while buf.has_remaining() {
        tlvs.push(Tlv::decode(buf)?);
    }
    Ok(tlvs)
}

pub fn encode_tlvs(tlvs: &[Tlv], buf: &mut BytesMut) -> Result<(), CodecError> {
    for tlv in tlvs {
        tlv.encode(buf)?;
    }
    Ok(())
}

/// First TLV carrying `tag`, if any.
pub fn find_tlv(tlvs: &[Tlv], tag: u16) -> Option<&Tlv> {
    tlvs.iter().find(|tlv| tlv.tag == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tlv_wire_layout() {
        let mut buf = BytesMut::new();
        Tlv::from_u16(tags::SAR_MSG_REF_NUM, 0x1234)
            .encode(&mut buf)
            .unwrap();
        assert_eq!(buf.as_ref(), &[0x02, 0x0C, 0x00, 0x02, 0x12, 0x34]);
    }

    #[test]
    fn decode_rejects_short_value() {
        let data: &[u8] = &[0x04, 0x24, 0x00, 0x05, 0x41, 0x42];
        let mut cursor = Cursor::new(data);
        assert!(matches!(
            Tlv::decode(&mut cursor),
            Err(CodecError::TlvError(_))
        ));
    }

    #[test]
    fn typed_accessors() {
        assert_eq!(Tlv::from_u8(tags::MESSAGE_STATE, 2).as_u8(), Some(2));
        assert_eq!(
            Tlv::from_cstring(tags::RECEIPTED_MESSAGE_ID, "abc").as_cstring(),
            "abc"
        );
        assert_eq!(Tlv::new(tags::SAR_MSG_REF_NUM, vec![7u8]).as_u16(), Some(7));
        assert_eq!(Tlv::new(tags::MESSAGE_STATE, vec![1u8, 2]).as_u8(), None);
    }

    #[test]
    fn find_returns_first_match() {
        let tlvs = vec![
            Tlv::from_u8(tags::SAR_TOTAL_SEGMENTS, 3),
            Tlv::from_u8(tags::SAR_SEGMENT_SEQNUM, 1),
        ];
        assert_eq!(
            find_tlv(&tlvs, tags::SAR_SEGMENT_SEQNUM).and_then(Tlv::as_u8),
            Some(1)
        );
        assert!(find_tlv(&tlvs, tags::MESSAGE_PAYLOAD).is_none());
    }
}
