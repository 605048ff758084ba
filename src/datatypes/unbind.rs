use crate::datatypes::{CommandId, CommandStatus};
use crate::macros::impl_complete_header_only_pdu;

/// The purpose of the SMPP unbind operation is to deregister an instance of an ESME from the SMSC
/// and inform the SMSC that the ESME no longer wishes to use this network connection for the
/// submission or delivery of messages.
///
/// Either peer may send it; the receiver answers with unbind_resp and the
/// connection is then closed.
#[derive(Clone, Debug, PartialEq)]
pub struct Unbind {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnbindResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl_complete_header_only_pdu!(Unbind, CommandId::Unbind);
impl_complete_header_only_pdu!(UnbindResponse, CommandId::UnbindResp);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Encodable, Frame};

    #[test]
    fn unbind_response_keeps_status() {
        let resp = UnbindResponse::error(9, CommandStatus::SystemError);
        let bytes = resp.to_bytes().unwrap();
        assert_eq!(&bytes[4..8], &[0x80, 0x00, 0x00, 0x06]);
        assert_eq!(Frame::parse(&bytes).unwrap(), Frame::UnbindResp(resp));
    }
}
