// ABOUTME: Callback interface through which a session reports to the transport that owns it
// ABOUTME: Includes an event-channel implementation so owners can consume callbacks as a stream

use crate::client::delivery_report::DeliveryReport;
use crate::client::session::EsmeHandle;
use crate::client::types::UssdSession;
use crate::datatypes::{CommandId, CommandStatus, MessageContent, QuerySmResponse};
use tokio::sync::mpsc::UnboundedSender;

/// Hooks invoked from the session task.
///
/// Calls happen inline on the session's event loop, so implementations
/// should hand work off rather than block. Every method defaults to doing
/// nothing.
pub trait EsmeCallbacks: Send + Sync {
    /// The bind was accepted; `handle` can submit on this session.
    fn on_connect(&self, handle: EsmeHandle) {
        let _ = handle;
    }

    /// The connection is gone. `unacked` lists this session's submissions
    /// that never got a response; they are not resent.
    fn on_disconnect(&self, unacked: Vec<u32>) {
        let _ = unacked;
    }

    /// A submit_sm_resp or submit_multi_resp arrived.
    fn on_submit_ack(
        &self,
        sequence_number: u32,
        command_status: CommandStatus,
        command_id: CommandId,
        message_id: String,
    ) {
        let _ = (sequence_number, command_status, command_id, message_id);
    }

    fn on_delivery_report(
        &self,
        destination_addr: String,
        source_addr: String,
        report: DeliveryReport,
    ) {
        let _ = (destination_addr, source_addr, report);
    }

    /// An inbound message, reassembled if it came in parts. `message_id` is
    /// generated locally.
    fn on_deliver_sm(
        &self,
        destination_addr: String,
        source_addr: String,
        content: MessageContent,
        message_id: String,
    ) {
        let _ = (destination_addr, source_addr, content, message_id);
    }

    /// An inbound message carrying `ussd_service_op`. Reply through a
    /// submit with [`UssdReply`](crate::client::UssdReply) built from
    /// `session.session_info`.
    fn on_deliver_ussd(
        &self,
        destination_addr: String,
        source_addr: String,
        content: MessageContent,
        message_id: String,
        session: UssdSession,
    ) {
        let _ = (destination_addr, source_addr, content, message_id, session);
    }

    fn on_query_sm_resp(&self, sequence_number: u32, response: QuerySmResponse) {
        let _ = (sequence_number, response);
    }
}

/// Callback invocations as values
#[derive(Debug)]
pub enum EsmeEvent {
    Connected(EsmeHandle),
    Disconnected {
        unacked: Vec<u32>,
    },
    SubmitAck {
        sequence_number: u32,
        command_status: CommandStatus,
        command_id: CommandId,
        message_id: String,
    },
    DeliveryReport {
        destination_addr: String,
        source_addr: String,
        report: DeliveryReport,
    },
    DeliverSm {
        destination_addr: String,
        source_addr: String,
        content: MessageContent,
        message_id: String,
    },
    Ussd {
        destination_addr: String,
        source_addr: String,
        content: MessageContent,
        message_id: String,
        session: UssdSession,
    },
    QuerySmResp(QuerySmResponse),
}

/// Forwards every callback into the channel; events are dropped once the
/// receiver is gone.
impl EsmeCallbacks for UnboundedSender<EsmeEvent> {
    fn on_connect(&self, handle: EsmeHandle) {
        let _ = self.send(EsmeEvent::Connected(handle));
    }

    fn on_disconnect(&self, unacked: Vec<u32>) {
        let _ = self.send(EsmeEvent::Disconnected { unacked });
    }

    fn on_submit_ack(
        &self,
        sequence_number: u32,
        command_status: CommandStatus,
        command_id: CommandId,
        message_id: String,
    ) {
        let _ = self.send(EsmeEvent::SubmitAck {
            sequence_number,
            command_status,
            command_id,
            message_id,
        });
    }

    fn on_delivery_report(
        &self,
        destination_addr: String,
        source_addr: String,
        report: DeliveryReport,
    ) {
        let _ = self.send(EsmeEvent::DeliveryReport {
            destination_addr,
            source_addr,
            report,
        });
    }

    fn on_deliver_sm(
        &self,
        destination_addr: String,
        source_addr: String,
        content: MessageContent,
        message_id: String,
    ) {
        let _ = self.send(EsmeEvent::DeliverSm {
            destination_addr,
            source_addr,
            content,
            message_id,
        });
    }

    fn on_deliver_ussd(
        &self,
        destination_addr: String,
        source_addr: String,
        content: MessageContent,
        message_id: String,
        session: UssdSession,
    ) {
        let _ = self.send(EsmeEvent::Ussd {
            destination_addr,
            source_addr,
            content,
            message_id,
            session,
        });
    }

    fn on_query_sm_resp(&self, _sequence_number: u32, response: QuerySmResponse) {
        let _ = self.send(EsmeEvent::QuerySmResp(response));
    }
}
