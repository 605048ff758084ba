// ABOUTME: Implements SMPP v3.4 submit_multi and submit_multi_resp PDUs for multi-destination messaging
// ABOUTME: Destinations are SME addresses or distribution list names, failures come back per SME

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_octets, decode_u8,
    decode_u32, encode_cstring, encode_u8, encode_u32, encode_with_header,
};
use crate::datatypes::{
    CommandId, CommandStatus, MAX_SHORT_MESSAGE_LEN, Tlv, decode_tlvs, encode_tlvs, find_tlv,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// Maximum number of destinations a single submit_multi may carry
pub const MAX_DESTINATIONS: usize = 254;

const DEST_FLAG_SME_ADDRESS: u8 = 1;
const DEST_FLAG_DISTRIBUTION_LIST: u8 = 2;

/// One entry of the submit_multi dest_address list
#[derive(Clone, Debug, PartialEq)]
pub enum DestAddress {
    SmeAddress { ton: u8, npi: u8, addr: String },
    DistributionList(String),
}

impl DestAddress {
    pub fn sme(ton: u8, npi: u8, addr: &str) -> Self {
        DestAddress::SmeAddress {
            ton,
            npi,
            addr: addr.to_string(),
        }
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        match self {
            DestAddress::SmeAddress { ton, npi, addr } => {
                encode_u8(buf, DEST_FLAG_SME_ADDRESS);
                encode_u8(buf, *ton);
                encode_u8(buf, *npi);
                encode_cstring(buf, addr, 21, "destination_addr")
            }
            DestAddress::DistributionList(name) => {
                encode_u8(buf, DEST_FLAG_DISTRIBUTION_LIST);
                encode_cstring(buf, name, 21, "dl_name")
            }
        }
    }

    fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        match decode_u8(buf)? {
            DEST_FLAG_SME_ADDRESS => Ok(DestAddress::SmeAddress {
                ton: decode_u8(buf)?,
                npi: decode_u8(buf)?,
                addr: decode_cstring(buf, 21, "destination_addr")?,
            }),
            DEST_FLAG_DISTRIBUTION_LIST => Ok(DestAddress::DistributionList(decode_cstring(
                buf, 21, "dl_name",
            )?)),
            flag => Err(CodecError::FieldValidation {
                field: "dest_flag",
                reason: format!("unknown dest_flag {flag}"),
            }),
        }
    }
}

/// SMPP v3.4 submit_multi PDU (Section 4.5.1)
///
/// Same body as submit_sm except that the single destination is replaced by
/// a counted list of up to 254 SME addresses or distribution lists.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitMulti {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub source_addr: String,
    pub dest_addresses: Vec<DestAddress>,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
    pub optional_params: Vec<Tlv>,
}

impl SubmitMulti {
    pub fn new(
        sequence_number: u32,
        dest_addresses: Vec<DestAddress>,
        short_message: impl Into<Bytes>,
    ) -> Self {
        SubmitMulti {
            command_status: CommandStatus::Ok,
            sequence_number,
            service_type: String::new(),
            source_addr_ton: 0,
            source_addr_npi: 0,
            source_addr: String::new(),
            dest_addresses,
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

    pub fn tlv(&self, tag: u16) -> Option<&Tlv> {
        find_tlv(&self.optional_params, tag)
    }

    crate::macros::builder_setters! {
        service_type: String,
        source_addr_ton: u8,
        source_addr_npi: u8,
        source_addr: String,
        esm_class: u8,
        registered_delivery: u8,
        data_coding: u8,
        optional_params: Vec<Tlv>,
    }
}

impl Decodable for SubmitMulti {
    fn command_id() -> CommandId {
        CommandId::SubmitMulti
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let service_type = decode_cstring(buf, 6, "service_type")?;
        let source_addr_ton = decode_u8(buf)?;
        let source_addr_npi = decode_u8(buf)?;
        let source_addr = decode_cstring(buf, 21, "source_addr")?;

        let number_of_dests = decode_u8(buf)?;
        let dest_addresses = (0..number_of_dests)
            .map(|_| DestAddress::decode(buf))
            .collect::<Result<Vec<_>, _>>()?;

        let esm_class = decode_u8(buf)?;
        let protocol_id = decode_u8(buf)?;
        let priority_flag = decode_u8(buf)?;
        let schedule_delivery_time = decode_cstring(buf, 17, "schedule_delivery_time")?;
        let validity_period = decode_cstring(buf, 17, "validity_period")?;
        let registered_delivery = decode_u8(buf)?;
        let replace_if_present_flag = decode_u8(buf)?;
        let data_coding = decode_u8(buf)?;
        let sm_default_msg_id = decode_u8(buf)?;
        let sm_length = decode_u8(buf)? as usize;
        let short_message = decode_octets(buf, sm_length, "short_message")?;

        Ok(SubmitMulti {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            service_type,
            source_addr_ton,
            source_addr_npi,
            source_addr,
            dest_addresses,
            esm_class,
            protocol_id,
            priority_flag,
            schedule_delivery_time,
            validity_period,
            registered_delivery,
            replace_if_present_flag,
            data_coding,
            sm_default_msg_id,
            short_message,
            optional_params: decode_tlvs(buf)?,
        })
    }
}

impl Encodable for SubmitMulti {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.dest_addresses.is_empty() || self.dest_addresses.len() > MAX_DESTINATIONS {
            return Err(CodecError::FieldValidation {
                field: "number_of_dests",
                reason: format!(
                    "{} destinations, must be 1-{MAX_DESTINATIONS}",
                    self.dest_addresses.len()
                ),
            });
        }
        if self.short_message.len() > MAX_SHORT_MESSAGE_LEN as usize {
            return Err(CodecError::FieldValidation {
                field: "short_message",
                reason: format!(
                    "{} bytes exceeds the limit of {MAX_SHORT_MESSAGE_LEN}, use message_payload",
                    self.short_message.len()
                ),
            });
        }

        let header = PduHeader::new(
            CommandId::SubmitMulti,
            self.command_status,
            self.sequence_number,
        );
        encode_with_header(buf, &header, |buf| {
            encode_cstring(buf, &self.service_type, 6, "service_type")?;
            encode_u8(buf, self.source_addr_ton);
            encode_u8(buf, self.source_addr_npi);
            encode_cstring(buf, &self.source_addr, 21, "source_addr")?;
            encode_u8(buf, self.dest_addresses.len() as u8);
            for dest in &self.dest_addresses {
                dest.encode(buf)?;
            }
            encode_u8(buf, self.esm_class);
            encode_u8(buf, self.protocol_id);
            encode_u8(buf, self.priority_flag);
            encode_cstring(buf, &self.schedule_delivery_time, 17, "schedule_delivery_time")?;
            encode_cstring(buf, &self.validity_period, 17, "validity_period")?;
            encode_u8(buf, self.registered_delivery);
            encode_u8(buf, self.replace_if_present_flag);
            encode_u8(buf, self.data_coding);
            encode_u8(buf, self.sm_default_msg_id);
            encode_u8(buf, self.short_message.len() as u8);
            buf.put_slice(&self.short_message);
            encode_tlvs(&self.optional_params, buf)
        })
    }
}

/// A destination the SMSC could not accept, as reported in submit_multi_resp
#[derive(Clone, Debug, PartialEq)]
pub struct UnsuccessSme {
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub destination_addr: String,
    pub error_status_code: CommandStatus,
}

/// SMPP v3.4 submit_multi_resp PDU (Section 4.5.2)
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitMultiResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: String,
    pub unsuccess_smes: Vec<UnsuccessSme>,
}

impl SubmitMultiResponse {
    pub fn new(sequence_number: u32, message_id: &str) -> Self {
        SubmitMultiResponse {
            command_status: CommandStatus::Ok,
            sequence_number,
            message_id: message_id.to_string(),
            unsuccess_smes: Vec::new(),
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        SubmitMultiResponse {
            command_status: status,
            sequence_number,
            message_id: String::new(),
            unsuccess_smes: Vec::new(),
        }
    }
}

impl Decodable for SubmitMultiResponse {
    fn command_id() -> CommandId {
        CommandId::SubmitMultiResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        if !buf.has_remaining() {
            return Ok(SubmitMultiResponse::error(
                header.sequence_number,
                header.command_status,
            ));
        }

        let message_id = decode_cstring(buf, 65, "message_id")?;
        let no_unsuccess = if buf.has_remaining() {
            decode_u8(buf)?
        } else {
            0
        };
        let unsuccess_smes = (0..no_unsuccess)
            .map(|_| {
                Ok(UnsuccessSme {
                    dest_addr_ton: decode_u8(buf)?,
                    dest_addr_npi: decode_u8(buf)?,
                    destination_addr: decode_cstring(buf, 21, "destination_addr")?,
                    error_status_code: CommandStatus::from(decode_u32(buf)?),
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(SubmitMultiResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
            unsuccess_smes,
        })
    }
}

impl Encodable for SubmitMultiResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader::new(
            CommandId::SubmitMultiResp,
            self.command_status,
            self.sequence_number,
        );
        encode_with_header(buf, &header, |buf| {
            encode_cstring(buf, &self.message_id, 65, "message_id")?;
            encode_u8(buf, self.unsuccess_smes.len() as u8);
            for sme in &self.unsuccess_smes {
                encode_u8(buf, sme.dest_addr_ton);
                encode_u8(buf, sme.dest_addr_npi);
                encode_cstring(buf, &sme.destination_addr, 21, "destination_addr")?;
                encode_u32(buf, sme.error_status_code.into());
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;

    #[test]
    fn submit_multi_with_mixed_destinations() {
        let multi = SubmitMulti::new(
            11,
            vec![
                DestAddress::sme(1, 1, "27831234567"),
                DestAddress::DistributionList("friends".to_string()),
            ],
            "Hello all",
        )
        .source_addr("1234".to_string());

        let bytes = multi.to_bytes().unwrap();
        let Frame::SubmitMulti(decoded) = Frame::parse(&bytes).unwrap() else {
            panic!("Expected SubmitMulti");
        };
        assert_eq!(decoded.dest_addresses.len(), 2);
        assert_eq!(*decoded, multi);
    }

    #[test]
    fn submit_multi_needs_a_destination() {
        let multi = SubmitMulti::new(1, Vec::new(), "x");
        assert!(matches!(
            multi.to_bytes(),
            Err(CodecError::FieldValidation {
                field: "number_of_dests",
                ..
            })
        ));
    }

    #[test]
    fn submit_multi_resp_reports_failed_smes() {
        let mut resp = SubmitMultiResponse::new(11, "multi-1");
        resp.unsuccess_smes.push(UnsuccessSme {
            dest_addr_ton: 1,
            dest_addr_npi: 1,
            destination_addr: "27830000000".to_string(),
            error_status_code: CommandStatus::InvalidDestinationAddress,
        });

        let bytes = resp.to_bytes().unwrap();
        assert_eq!(Frame::parse(&bytes).unwrap(), Frame::SubmitMultiResp(resp));
    }
}
