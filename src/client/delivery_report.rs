// ABOUTME: Extracts SMSC delivery receipts from deliver_sm PDUs
// ABOUTME: Reads the receipt TLVs first, then searches the decoded message text with a configurable regex

use crate::datatypes::{DeliverSm, MessageContent, Tlv, tags};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Receipt text as most SMSCs format it, e.g.
/// `id:abc sub:001 dlvrd:001 submit date:1201231717 done date:1201231718 stat:DELIVRD err:000 text:Hello`
pub const DEFAULT_DELIVERY_REPORT_REGEX: &str = concat!(
    r"id:(?P<id>\S{0,65})",
    r" +sub:(?P<sub>...)",
    r" +dlvrd:(?P<dlvrd>...)",
    r" +submit date:(?P<submit_date>\d*)",
    r" +done date:(?P<done_date>\d*)",
    r" +stat:(?P<stat>[A-Z]{7})",
    r" +err:(?P<err>...)",
    r" +[Tt]ext:(?P<text>.{0,20})",
    r".*",
);

/// Final outcome reported to the owner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
    Pending,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Pending => "pending",
        })
    }
}

/// Name of an SMPP message_state value (SMPP v3.4 Section 5.2.28)
pub fn message_state_name(state: u8) -> &'static str {
    match state {
        1 => "ENROUTE",
        2 => "DELIVERED",
        3 => "EXPIRED",
        4 => "DELETED",
        5 => "UNDELIVERABLE",
        6 => "ACCEPTED",
        8 => "REJECTED",
        _ => "UNKNOWN",
    }
}

/// Raw state to status table used when none is configured
pub fn default_status_mapping() -> HashMap<String, DeliveryStatus> {
    use DeliveryStatus::*;

    [
        // Output values map to themselves
        ("delivered", Delivered),
        ("failed", Failed),
        ("pending", Pending),
        // message_state names
        ("ENROUTE", Pending),
        ("DELIVERED", Delivered),
        ("EXPIRED", Failed),
        ("DELETED", Failed),
        ("UNDELIVERABLE", Failed),
        ("ACCEPTED", Delivered),
        ("UNKNOWN", Pending),
        ("REJECTED", Failed),
        // receipt text stat values
        ("DELIVRD", Delivered),
        ("REJECTD", Failed),
        ("0", Delivered),
    ]
    .into_iter()
    .map(|(state, status)| (state.to_string(), status))
    .collect()
}

/// Structured delivery receipt
///
/// Receipts built from TLVs only carry `id` and `stat`; the text fields
/// are filled when the receipt came from the message body.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryReport {
    /// SMSC message id of the original submission
    pub id: String,
    pub sub: Option<String>,
    pub dlvrd: Option<String>,
    pub submit_date: Option<String>,
    pub done_date: Option<String>,
    /// State as the SMSC reported it (e.g. `DELIVRD`, `DELIVERED`)
    pub stat: String,
    pub err: Option<String>,
    pub text: Option<String>,
    pub status: DeliveryStatus,
}

#[derive(Clone, Debug)]
pub struct DeliveryReportParser {
    regex: Regex,
    status_mapping: HashMap<String, DeliveryStatus>,
}

impl DeliveryReportParser {
    /// The pattern may match anywhere in the message text; anchor it with
    /// `^` to only accept receipts at the start.
    pub fn new(
        pattern: &str,
        status_mapping: HashMap<String, DeliveryStatus>,
    ) -> Result<Self, regex::Error> {
        Ok(DeliveryReportParser {
            regex: Regex::new(pattern)?,
            status_mapping,
        })
    }

    /// Parser using the built-in receipt pattern and status table.
    pub fn with_defaults() -> Result<Self, regex::Error> {
        Self::new(DEFAULT_DELIVERY_REPORT_REGEX, default_status_mapping())
    }

    /// Status for a raw state; anything unmapped is still pending.
    pub fn status(&self, stat: &str) -> DeliveryStatus {
        self.status_mapping
            .get(stat)
            .copied()
            .unwrap_or(DeliveryStatus::Pending)
    }

    /// Receipt carried in `receipted_message_id` plus `message_state`.
    pub fn from_tlvs(&self, pdu: &DeliverSm) -> Option<DeliveryReport> {
        let id = pdu.tlv(tags::RECEIPTED_MESSAGE_ID)?.as_cstring();
        let state = pdu.tlv(tags::MESSAGE_STATE).and_then(Tlv::as_u8)?;
        let stat = message_state_name(state).to_string();

        Some(DeliveryReport {
            id,
            sub: None,
            dlvrd: None,
            submit_date: None,
            done_date: None,
            status: self.status(&stat),
            stat,
            err: None,
            text: None,
        })
    }

    /// Receipt written into a message body. Undecoded bodies are searched
    /// as lossy UTF-8.
    pub fn from_content(&self, content: &MessageContent) -> Option<DeliveryReport> {
        match content {
            MessageContent::Text(text) => self.from_text(text),
            MessageContent::Raw(bytes) => self.from_text(&String::from_utf8_lossy(bytes)),
        }
    }

    /// Receipt written into the message text.
    pub fn from_text(&self, text: &str) -> Option<DeliveryReport> {
        let caps = self.regex.captures(text)?;
        let field = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

        let stat = field("stat").unwrap_or_default();
        Some(DeliveryReport {
            id: field("id").unwrap_or_default(),
            sub: field("sub"),
            dlvrd: field("dlvrd"),
            submit_date: field("submit_date"),
            done_date: field("done_date"),
            status: self.status(&stat),
            stat,
            err: field("err"),
            text: field("text"),
        })
    }
}
