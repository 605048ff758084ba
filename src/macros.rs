// ABOUTME: This module provides macros to reduce boilerplate in SMPP PDU implementations
// ABOUTME: Includes macros for header-only PDUs, bind PDUs, short message PDUs and builder setters

/// Macro for implementing codec traits on header-only PDUs (no body)
///
/// # Arguments
/// * `$pdu_type` - The PDU struct name (e.g., EnquireLink)
/// * `$command_id` - The CommandId variant (e.g., CommandId::EnquireLink)
///
/// # Generated code
/// - Decodable with header validation, rejecting a non-empty body
/// - Encodable writing a 16 byte header
macro_rules! impl_header_only_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        impl $crate::codec::Decodable for $pdu_type {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use bytes::Buf;

                Self::validate_header(&header)?;

                if buf.has_remaining() {
                    return Err($crate::codec::CodecError::FieldValidation {
                        field: concat!(stringify!($pdu_type), "_body"),
                        reason: concat!(stringify!($pdu_type), " PDU should have no body")
                            .to_string(),
                    });
                }

                Ok($pdu_type {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                let header = $crate::codec::PduHeader {
                    command_length: $crate::codec::PduHeader::SIZE as u32,
                    command_id: $command_id,
                    command_status: self.command_status,
                    sequence_number: self.sequence_number,
                };
                header.encode(buf)
            }

            fn encoded_size(&self) -> usize {
                $crate::codec::PduHeader::SIZE
            }
        }
    };
}

/// Macro for generating constructor methods for PDUs that only carry
/// command_status and sequence_number
///
/// # Generated code
/// - `new(sequence_number: u32)` - Creates PDU with Ok status
/// - `error(sequence_number: u32, status: CommandStatus)` - Creates PDU with error status
macro_rules! impl_header_only_constructors {
    ($pdu_type:ident) => {
        impl $pdu_type {
            /// Create a new PDU with Ok status
            pub fn new(sequence_number: u32) -> Self {
                Self {
                    command_status: $crate::datatypes::CommandStatus::Ok,
                    sequence_number,
                }
            }

            /// Create a PDU with error status
            pub fn error(sequence_number: u32, status: $crate::datatypes::CommandStatus) -> Self {
                Self {
                    command_status: status,
                    sequence_number,
                }
            }
        }
    };
}

/// Convenience macro combining codec implementation and constructors for
/// header-only PDUs.
macro_rules! impl_complete_header_only_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        $crate::macros::impl_header_only_pdu!($pdu_type, $command_id);
        $crate::macros::impl_header_only_constructors!($pdu_type);
    };
}

/// Macro declaring a bind request/response pair (SMPP v3.4 Section 4.1).
///
/// The three bind operations share one body layout and differ only in the
/// command ids, so the request struct, the response struct and both codec
/// implementations are generated together.
macro_rules! impl_bind_pdu {
    (
        $(#[$req_meta:meta])*
        $req:ident => $req_id:expr,
        $(#[$resp_meta:meta])*
        $resp:ident => $resp_id:expr $(,)?
    ) => {
        $(#[$req_meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $req {
            pub command_status: $crate::datatypes::CommandStatus,
            pub sequence_number: u32,

            /// Identifies the ESME requesting to bind (max 15 chars)
            pub system_id: String,

            /// Password used by the SMSC to authenticate the ESME (max 8 chars)
            pub password: String,

            /// Identifies the type of ESME system (max 12 chars)
            pub system_type: String,

            /// SMPP version supported, 0x34 for v3.4
            pub interface_version: u8,

            /// Type of Number for the address range
            pub addr_ton: u8,

            /// Numbering Plan Indicator for the address range
            pub addr_npi: u8,

            /// Addresses serviced by this ESME (max 40 chars)
            pub address_range: String,
        }

        impl $req {
            pub fn new(sequence_number: u32, system_id: &str, password: &str) -> Self {
                $req {
                    command_status: $crate::datatypes::CommandStatus::Ok,
                    sequence_number,
                    system_id: system_id.to_string(),
                    password: password.to_string(),
                    system_type: String::new(),
                    interface_version: $crate::datatypes::INTERFACE_VERSION_34,
                    addr_ton: 0,
                    addr_npi: 0,
                    address_range: String::new(),
                }
            }

            $crate::macros::builder_setters! {
                system_type: String,
                interface_version: u8,
                addr_ton: u8,
                addr_npi: u8,
                address_range: String,
            }
        }

        impl $crate::codec::Decodable for $req {
            fn command_id() -> $crate::datatypes::CommandId {
                $req_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use $crate::codec::{decode_cstring, decode_u8};

                Self::validate_header(&header)?;

                Ok($req {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                    system_id: decode_cstring(buf, 16, "system_id")?,
                    password: decode_cstring(buf, 9, "password")?,
                    system_type: decode_cstring(buf, 13, "system_type")?,
                    interface_version: decode_u8(buf)?,
                    addr_ton: decode_u8(buf)?,
                    addr_npi: decode_u8(buf)?,
                    address_range: decode_cstring(buf, 41, "address_range")?,
                })
            }
        }

        impl $crate::codec::Encodable for $req {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                use $crate::codec::{encode_cstring, encode_u8};

                let header = $crate::codec::PduHeader::new(
                    $req_id,
                    self.command_status,
                    self.sequence_number,
                );
                $crate::codec::encode_with_header(buf, &header, |buf| {
                    encode_cstring(buf, &self.system_id, 16, "system_id")?;
                    encode_cstring(buf, &self.password, 9, "password")?;
                    encode_cstring(buf, &self.system_type, 13, "system_type")?;
                    encode_u8(buf, self.interface_version);
                    encode_u8(buf, self.addr_ton);
                    encode_u8(buf, self.addr_npi);
                    encode_cstring(buf, &self.address_range, 41, "address_range")
                })
            }
        }

        $(#[$resp_meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $resp {
            pub command_status: $crate::datatypes::CommandStatus,
            pub sequence_number: u32,

            /// SMSC identifier, empty when the SMSC omits the body on error
            pub system_id: String,

            /// Optional parameters, e.g. sc_interface_version
            pub optional_params: Vec<$crate::datatypes::Tlv>,
        }

        impl $resp {
            pub fn new(sequence_number: u32, system_id: &str) -> Self {
                $resp {
                    command_status: $crate::datatypes::CommandStatus::Ok,
                    sequence_number,
                    system_id: system_id.to_string(),
                    optional_params: Vec::new(),
                }
            }

            pub fn error(sequence_number: u32, status: $crate::datatypes::CommandStatus) -> Self {
                $resp {
                    command_status: status,
                    sequence_number,
                    system_id: String::new(),
                    optional_params: Vec::new(),
                }
            }
        }

        impl $crate::codec::Decodable for $resp {
            fn command_id() -> $crate::datatypes::CommandId {
                $resp_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use bytes::Buf;

                Self::validate_header(&header)?;

                let system_id = if buf.has_remaining() {
                    $crate::codec::decode_cstring(buf, 16, "system_id")?
                } else {
                    String::new()
                };

                Ok($resp {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                    system_id,
                    optional_params: $crate::datatypes::decode_tlvs(buf)?,
                })
            }
        }

        impl $crate::codec::Encodable for $resp {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                let header = $crate::codec::PduHeader::new(
                    $resp_id,
                    self.command_status,
                    self.sequence_number,
                );
                $crate::codec::encode_with_header(buf, &header, |buf| {
                    $crate::codec::encode_cstring(buf, &self.system_id, 16, "system_id")?;
                    $crate::datatypes::encode_tlvs(&self.optional_params, buf)
                })
            }
        }
    };
}

/// Macro implementing the codec for PDUs with the submit_sm body layout
/// (submit_sm and deliver_sm, SMPP v3.4 Sections 4.4.1 and 4.6.1).
///
/// The struct must carry the standard field names; `sm_length` is derived
/// from `short_message` and never stored.
macro_rules! impl_short_message_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        impl $pdu_type {
            /// First optional parameter with the given tag
            pub fn tlv(&self, tag: u16) -> Option<&$crate::datatypes::Tlv> {
                $crate::datatypes::find_tlv(&self.optional_params, tag)
            }

            $crate::macros::builder_setters! {
                service_type: String,
                source_addr_ton: u8,
                source_addr_npi: u8,
                source_addr: String,
                dest_addr_ton: u8,
                dest_addr_npi: u8,
                esm_class: u8,
                protocol_id: u8,
                priority_flag: u8,
                registered_delivery: u8,
                data_coding: u8,
                optional_params: Vec<$crate::datatypes::Tlv>,
            }
        }

        impl $crate::codec::Decodable for $pdu_type {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use $crate::codec::{decode_cstring, decode_octets, decode_u8};

                Self::validate_header(&header)?;

                let service_type = decode_cstring(buf, 6, "service_type")?;
                let source_addr_ton = decode_u8(buf)?;
                let source_addr_npi = decode_u8(buf)?;
                let source_addr = decode_cstring(buf, 21, "source_addr")?;
                let dest_addr_ton = decode_u8(buf)?;
                let dest_addr_npi = decode_u8(buf)?;
                let destination_addr = decode_cstring(buf, 21, "destination_addr")?;
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
                let optional_params = $crate::datatypes::decode_tlvs(buf)?;

                Ok($pdu_type {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                    service_type,
                    source_addr_ton,
                    source_addr_npi,
                    source_addr,
                    dest_addr_ton,
                    dest_addr_npi,
                    destination_addr,
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
                    optional_params,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                use bytes::BufMut;
                use $crate::codec::{encode_cstring, encode_u8};

                let sm_length = u8::try_from(self.short_message.len())
                    .ok()
                    .filter(|len| *len <= $crate::datatypes::MAX_SHORT_MESSAGE_LEN)
                    .ok_or_else(|| $crate::codec::CodecError::FieldValidation {
                        field: "short_message",
                        reason: format!(
                            "{} bytes exceeds the limit of {}, use message_payload",
                            self.short_message.len(),
                            $crate::datatypes::MAX_SHORT_MESSAGE_LEN
                        ),
                    })?;

                let header = $crate::codec::PduHeader::new(
                    $command_id,
                    self.command_status,
                    self.sequence_number,
                );
                $crate::codec::encode_with_header(buf, &header, |buf| {
                    encode_cstring(buf, &self.service_type, 6, "service_type")?;
                    encode_u8(buf, self.source_addr_ton);
                    encode_u8(buf, self.source_addr_npi);
                    encode_cstring(buf, &self.source_addr, 21, "source_addr")?;
                    encode_u8(buf, self.dest_addr_ton);
                    encode_u8(buf, self.dest_addr_npi);
                    encode_cstring(buf, &self.destination_addr, 21, "destination_addr")?;
                    encode_u8(buf, self.esm_class);
                    encode_u8(buf, self.protocol_id);
                    encode_u8(buf, self.priority_flag);
                    encode_cstring(buf, &self.schedule_delivery_time, 17, "schedule_delivery_time")?;
                    encode_cstring(buf, &self.validity_period, 17, "validity_period")?;
                    encode_u8(buf, self.registered_delivery);
                    encode_u8(buf, self.replace_if_present_flag);
                    encode_u8(buf, self.data_coding);
                    encode_u8(buf, self.sm_default_msg_id);
                    encode_u8(buf, sm_length);
                    buf.put_slice(&self.short_message);
                    $crate::datatypes::encode_tlvs(&self.optional_params, buf)
                })
            }
        }
    };
}

/// Macro for generating builder setter methods
///
/// Each generated method takes a value, sets the corresponding field, and
/// returns self for method chaining.
macro_rules! builder_setters {
    ($($field:ident: $type:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, $field: $type) -> Self {
                self.$field = $field;
                self
            }
        )*
    };
}

// Make macros available to the rest of the crate
pub(crate) use {
    builder_setters, impl_bind_pdu, impl_complete_header_only_pdu, impl_header_only_constructors,
    impl_header_only_pdu, impl_short_message_pdu,
};
