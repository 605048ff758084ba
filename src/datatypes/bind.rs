use crate::datatypes::CommandId;
use crate::macros::impl_bind_pdu;

impl_bind_pdu! {
    /// bind_transmitter: bind as an ESME that only submits messages (BOUND_TX).
    BindTransmitter => CommandId::BindTransmitter,
    /// bind_transmitter_resp
    BindTransmitterResponse => CommandId::BindTransmitterResp,
}

impl_bind_pdu! {
    /// bind_receiver: bind as an ESME that only receives messages (BOUND_RX).
    BindReceiver => CommandId::BindReceiver,
    /// bind_receiver_resp
    BindReceiverResponse => CommandId::BindReceiverResp,
}

impl_bind_pdu! {
    /// bind_transceiver: bind as an ESME that both sends and receives
    /// messages through a single connection (BOUND_TRX).
    BindTransceiver => CommandId::BindTransceiver,
    /// bind_transceiver_resp
    BindTransceiverResponse => CommandId::BindTransceiverResp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecError, Encodable, Frame};
    use crate::datatypes::{CommandStatus, Tlv};

    #[test]
    fn bind_transceiver_to_bytes() {
        let bind_transceiver = BindTransceiver::new(1, "SMPP3TEST", "secret08")
            .system_type("SUBMIT1".to_string())
            .addr_ton(1)
            .addr_npi(1);

        let bt_bytes = bind_transceiver.to_bytes().unwrap();

        let expected: Vec<u8> = vec![
            // Header:
            0x00, 0x00, 0x00, 0x2F, // command_length
            0x00, 0x00, 0x00, 0x09, // command_id (BindTransceiver = 0x00000009)
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
            // Body:
            0x53, 0x4D, 0x50, 0x50, 0x33, 0x54, 0x45, 0x53, 0x54, 0x00, // system_id
            0x73, 0x65, 0x63, 0x72, 0x65, 0x74, 0x30, 0x38, 0x00, // password
            0x53, 0x55, 0x42, 0x4D, 0x49, 0x54, 0x31, 0x00, // system_type
            0x34, // interface_version
            0x01, // addr_ton
            0x01, // addr_npi
            0x00, // address_range
        ];

        assert_eq!(bt_bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn bind_transceiver_response_to_bytes_no_tlv() {
        let btr_bytes = BindTransceiverResponse::new(1, "SMPP3TEST")
            .to_bytes()
            .unwrap();

        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x1A, // command_length (26 bytes total)
            0x80, 0x00, 0x00, 0x09, // command_id (BindTransceiverResp = 0x80000009)
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
            0x53, 0x4D, 0x50, 0x50, 0x33, 0x54, 0x45, 0x53, 0x54, 0x00, // "SMPP3TEST\0"
        ];

        assert_eq!(btr_bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn bind_response_with_sc_interface_version() {
        let mut resp = BindReceiverResponse::new(5, "SMSC");
        resp.optional_params = vec![Tlv::from_u8(0x0210, 0x34)];

        let bytes = resp.to_bytes().unwrap();
        assert_eq!(Frame::parse(&bytes).unwrap(), Frame::BindReceiverResp(resp));
    }

    #[test]
    fn error_response_without_body() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x02, // bind_transmitter_resp
            0x00, 0x00, 0x00, 0x0E, // ESME_RINVPASWD
            0x00, 0x00, 0x00, 0x03, // sequence_number
        ];
        assert_eq!(
            Frame::parse(data).unwrap(),
            Frame::BindTransmitterResp(BindTransmitterResponse::error(
                3,
                CommandStatus::InvalidPassword
            ))
        );
    }

    #[test]
    fn oversized_system_id_is_rejected() {
        let bind = BindTransmitter::new(1, "A_SYSTEM_ID_THAT_IS_TOO_LONG", "pw");
        assert!(matches!(
            bind.to_bytes(),
            Err(CodecError::FieldValidation {
                field: "system_id",
                ..
            })
        ));
    }
}
