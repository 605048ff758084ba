use crate::datatypes::{CommandId, CommandStatus};
use crate::macros::impl_complete_header_only_pdu;

/// GenericNack is used to acknowledge the receipt of a PDU when the receiving
/// entity cannot process the PDU due to errors such as invalid command_id,
/// invalid command_status, or other format errors.
///
/// The generic_nack PDU has no message body and only contains the standard
/// SMPP header.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericNack {
    /// The command_status field indicates the reason for the generic_nack
    pub command_status: CommandStatus,
    /// The sequence_number from the original PDU that caused the error.
    pub sequence_number: u32,
}

impl_complete_header_only_pdu!(GenericNack, CommandId::GenericNack);

impl GenericNack {
    /// Creates a GenericNack for a request whose command_id we do not handle
    pub fn invalid_command_id(sequence_number: u32) -> Self {
        Self::error(sequence_number, CommandStatus::InvalidCommandId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encodable;

    #[test]
    fn generic_nack_to_bytes() {
        let bytes = GenericNack::invalid_command_id(0x1234).to_bytes().unwrap();

        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x00, // command_id
            0x00, 0x00, 0x00, 0x03, // ESME_RINVCMDID
            0x00, 0x00, 0x12, 0x34, // sequence_number
        ];
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }
}
