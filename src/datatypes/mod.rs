mod bind;
mod command_id;
mod command_status;
mod data_coding;
mod deliver_sm;
mod enquire_link;
mod generic_nack;
mod query_sm;
mod submit_multi;
mod submit_sm;
mod tlv;
mod unbind;

pub use bind::{
    BindReceiver, BindReceiverResponse, BindTransceiver, BindTransceiverResponse,
    BindTransmitter, BindTransmitterResponse,
};
pub use command_id::CommandId;
pub use command_status::CommandStatus;
pub use data_coding::{DataCodingTable, DecodeError, MessageContent, TextCodec};
pub use deliver_sm::{DeliverSm, DeliverSmResponse};
pub use enquire_link::{EnquireLink, EnquireLinkResponse};
pub use generic_nack::GenericNack;
pub use query_sm::{QuerySm, QuerySmResponse};
pub use submit_multi::{DestAddress, MAX_DESTINATIONS, SubmitMulti, SubmitMultiResponse, UnsuccessSme};
pub use submit_sm::{SubmitSm, SubmitSmResponse};
pub use tlv::{Tlv, decode_tlvs, encode_tlvs, find_tlv, tags};
pub use unbind::{Unbind, UnbindResponse};

/// interface_version sent in bind requests for SMPP v3.4
pub const INTERFACE_VERSION_34: u8 = 0x34;

/// Largest short_message the sm_length octet can describe
pub const MAX_SHORT_MESSAGE_LEN: u8 = 254;

/// esm_class bit flagging a User Data Header at the start of short_message
pub const ESM_CLASS_UDHI: u8 = 0x40;

/// esm_class message type of an SMSC delivery receipt
pub const ESM_CLASS_DELIVERY_RECEIPT: u8 = 0x04;
