// ABOUTME: Concatenated SMS support: splitting long outbound messages and reassembling inbound parts
// ABOUTME: Parts are recognised by SAR TLVs or a concatenation UDH and joined in part-number order

use crate::datatypes::{DeliverSm, ESM_CLASS_UDHI, Tlv, tags};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Longest message sent as a single part
pub const MAX_SINGLE_PART_LEN: usize = 140;

/// Bytes of user data per part, leaving room for the UDH
pub const PART_PAYLOAD_LEN: usize = MAX_SINGLE_PART_LEN - 10;

const IEI_CONCAT_8BIT: u8 = 0x00;
const IEI_CONCAT_16BIT: u8 = 0x08;

/// One part of a concatenated message
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub reference: u16,
    pub total: u8,
    /// 1-based part number
    pub index: u8,
    /// User data with any UDH stripped
    pub payload: Bytes,
}

/// Recognise a deliver_sm carrying one part of a concatenated message.
///
/// `content` is the message body (short_message or message_payload).
/// SAR TLVs win when all three are present; otherwise a UDH is looked for
/// when esm_class flags one.
pub fn detect_fragment(pdu: &DeliverSm, content: &Bytes) -> Option<Fragment> {
    let sar = (
        pdu.tlv(tags::SAR_MSG_REF_NUM).and_then(Tlv::as_u16),
        pdu.tlv(tags::SAR_TOTAL_SEGMENTS).and_then(Tlv::as_u8),
        pdu.tlv(tags::SAR_SEGMENT_SEQNUM).and_then(Tlv::as_u8),
    );
    if let (Some(reference), Some(total), Some(index)) = sar {
        return Some(Fragment {
            reference,
            total,
            index,
            payload: content.clone(),
        });
    }

    if pdu.esm_class & ESM_CLASS_UDHI == 0 {
        return None;
    }
    parse_concat_udh(content)
}

/// Find a concatenation information element in a User Data Header.
fn parse_concat_udh(content: &Bytes) -> Option<Fragment> {
    let udhl = *content.first()? as usize;
    if content.len() < udhl + 1 {
        return None;
    }
    let mut elements = &content[1..=udhl];

    while let [iei, len, rest @ ..] = elements {
        let len = *len as usize;
        if rest.len() < len {
            return None;
        }
        let (data, tail) = rest.split_at(len);
        match (*iei, data) {
            (IEI_CONCAT_8BIT, [reference, total, index]) => {
                return Some(Fragment {
                    reference: *reference as u16,
                    total: *total,
                    index: *index,
                    payload: content.slice(udhl + 1..),
                });
            }
            (IEI_CONCAT_16BIT, [hi, lo, total, index]) => {
                return Some(Fragment {
                    reference: u16::from_be_bytes([*hi, *lo]),
                    total: *total,
                    index: *index,
                    payload: content.slice(udhl + 1..),
                });
            }
            _ => elements = tail,
        }
    }
    None
}

/// Split a message into parts of at most [`PART_PAYLOAD_LEN`] bytes.
///
/// Messages up to [`MAX_SINGLE_PART_LEN`] stay whole. Multi-byte
/// characters may be cut; receivers decode after reassembly.
pub fn split_message(message: &Bytes) -> Vec<Bytes> {
    if message.len() <= MAX_SINGLE_PART_LEN {
        return vec![message.clone()];
    }
    (0..message.len())
        .step_by(PART_PAYLOAD_LEN)
        .map(|start| message.slice(start..(start + PART_PAYLOAD_LEN).min(message.len())))
        .collect()
}

/// SAR TLVs for part `index` (1-based) of `total`
pub fn sar_tlvs(reference: u16, total: u8, index: u8) -> [Tlv; 3] {
    [
        Tlv::from_u16(tags::SAR_MSG_REF_NUM, reference),
        Tlv::from_u8(tags::SAR_TOTAL_SEGMENTS, total),
        Tlv::from_u8(tags::SAR_SEGMENT_SEQNUM, index),
    ]
}

/// Prefix `part` with a 6 byte concatenation UDH (8-bit reference)
pub fn with_concat_udh(reference: u8, total: u8, index: u8, part: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(6 + part.len());
    buf.put_slice(&[0x05, IEI_CONCAT_8BIT, 0x03, reference, total, index]);
    buf.put_slice(part);
    buf.freeze()
}

/// A reassembled message
#[derive(Clone, Debug, PartialEq)]
pub struct CompletedMessage {
    pub source_addr: String,
    pub destination_addr: String,
    pub content: Bytes,
}

#[derive(Debug)]
struct Assembly {
    source_addr: String,
    destination_addr: String,
    total: u8,
    parts: BTreeMap<u8, Bytes>,
    started: Instant,
}

/// Buffers parts until every one of them is in.
///
/// Incomplete assemblies older than the TTL are dropped the next time a part
/// is inserted.
#[derive(Debug)]
pub struct MultipartReassembler {
    ttl: Duration,
    pending: HashMap<String, Assembly>,
}

impl MultipartReassembler {
    pub fn new(ttl: Duration) -> Self {
        MultipartReassembler {
            ttl,
            pending: HashMap::new(),
        }
    }

    pub fn key(source_addr: &str, destination_addr: &str, reference: u16) -> String {
        format!("multi_{source_addr}_{destination_addr}_{reference}")
    }

    /// Number of incomplete assemblies held
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Add a part; returns the full message once the last missing part
    /// arrives. A repeated part number replaces the earlier part.
    pub fn insert(
        &mut self,
        source_addr: &str,
        destination_addr: &str,
        fragment: Fragment,
    ) -> Option<CompletedMessage> {
        self.evict_expired();

        let key = Self::key(source_addr, destination_addr, fragment.reference);
        let total = self
            .pending
            .get(&key)
            .map_or(fragment.total, |assembly| assembly.total);

        if fragment.index == 0 || fragment.index > total {
            warn!(
                key = %key,
                "Dropping part {} of a {} part message",
                fragment.index,
                total
            );
            return None;
        }

        let assembly = self.pending.entry(key.clone()).or_insert_with(|| Assembly {
            source_addr: source_addr.to_string(),
            destination_addr: destination_addr.to_string(),
            total,
            parts: BTreeMap::new(),
            started: Instant::now(),
        });
        assembly.parts.insert(fragment.index, fragment.payload);
        debug!(
            key = %key,
            "Multipart {}/{} parts received",
            assembly.parts.len(),
            assembly.total
        );

        if assembly.parts.len() < assembly.total as usize {
            return None;
        }

        let assembly = self.pending.remove(&key)?;
        let mut content = BytesMut::new();
        for part in assembly.parts.values() {
            content.put_slice(part);
        }
        Some(CompletedMessage {
            source_addr: assembly.source_addr,
            destination_addr: assembly.destination_addr,
            content: content.freeze(),
        })
    }

    fn evict_expired(&mut self) {
        let ttl = self.ttl;
        self.pending.retain(|key, assembly| {
            let live = assembly.started.elapsed() < ttl;
            if !live {
                warn!(
                    key = %key,
                    "Discarding incomplete multipart message, {}/{} parts after {:?}",
                    assembly.parts.len(),
                    assembly.total,
                    ttl
                );
            }
            live
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(reference: u16, total: u8, index: u8, payload: &'static str) -> Fragment {
        Fragment {
            reference,
            total,
            index,
            payload: Bytes::from_static(payload.as_bytes()),
        }
    }

    #[test]
    fn out_of_order_parts_join_in_index_order() {
        let mut reassembler = MultipartReassembler::new(Duration::from_secs(3600));

        assert!(reassembler.insert("123", "456", part(7, 2, 2, " world")).is_none());
        assert_eq!(reassembler.pending(), 1);

        let done = reassembler.insert("123", "456", part(7, 2, 1, "hello")).unwrap();
        assert_eq!(done.content, Bytes::from_static(b"hello world"));
        assert_eq!(done.source_addr, "123");
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn references_are_scoped_by_addresses() {
        let mut reassembler = MultipartReassembler::new(Duration::from_secs(3600));
        assert!(reassembler.insert("a", "b", part(1, 2, 1, "x")).is_none());
        assert!(reassembler.insert("c", "b", part(1, 2, 2, "y")).is_none());
        assert_eq!(reassembler.pending(), 2);
    }

    #[test]
    fn repeated_part_replaces_earlier_copy() {
        let mut reassembler = MultipartReassembler::new(Duration::from_secs(3600));
        assert!(reassembler.insert("a", "b", part(1, 2, 1, "old")).is_none());
        assert!(reassembler.insert("a", "b", part(1, 2, 1, "new")).is_none());
        let done = reassembler.insert("a", "b", part(1, 2, 2, "!")).unwrap();
        assert_eq!(done.content, Bytes::from_static(b"new!"));
    }

    #[test]
    fn out_of_range_parts_are_dropped() {
        let mut reassembler = MultipartReassembler::new(Duration::from_secs(3600));
        assert!(reassembler.insert("a", "b", part(1, 2, 3, "x")).is_none());
        assert!(reassembler.insert("a", "b", part(1, 2, 0, "x")).is_none());
        assert_eq!(reassembler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_assemblies_expire() {
        let mut reassembler = MultipartReassembler::new(Duration::from_secs(60));
        assert!(reassembler.insert("a", "b", part(1, 2, 1, "x")).is_none());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(reassembler.insert("a", "b", part(1, 2, 2, "y")).is_none());
        // the late part started a fresh assembly
        assert_eq!(reassembler.pending(), 1);
    }

    #[test]
    fn udh_with_8bit_reference() {
        let content = with_concat_udh(0x2A, 3, 2, b"abc");
        let pdu = DeliverSm::new(1, "123", "456", content.clone()).esm_class(ESM_CLASS_UDHI);

        assert_eq!(
            detect_fragment(&pdu, &content),
            Some(Fragment {
                reference: 0x2A,
                total: 3,
                index: 2,
                payload: Bytes::from_static(b"abc"),
            })
        );
    }

    #[test]
    fn udh_with_16bit_reference_after_other_elements() {
        // port addressing element first, then 16-bit concatenation
        let content = Bytes::from_static(&[
            0x0A, 0x05, 0x04, 0x0B, 0x84, 0x23, 0xF0, 0x08, 0x04, 0x01, 0x02, 0x02, 0x01, b'h',
            b'i',
        ]);
        let pdu = DeliverSm::new(1, "123", "456", content.clone()).esm_class(ESM_CLASS_UDHI);

        let fragment = detect_fragment(&pdu, &content).unwrap();
        assert_eq!(fragment.reference, 0x0102);
        assert_eq!(fragment.total, 2);
        assert_eq!(fragment.index, 1);
        assert_eq!(fragment.payload, Bytes::from_static(b"hi"));
    }

    #[test]
    fn udh_is_ignored_without_udhi_flag() {
        let content = with_concat_udh(1, 2, 1, b"abc");
        let pdu = DeliverSm::new(1, "123", "456", content.clone());
        assert!(detect_fragment(&pdu, &content).is_none());
    }

    #[test]
    fn sar_tlvs_mark_a_fragment() {
        let content = Bytes::from_static(b"part one");
        let pdu = DeliverSm::new(1, "123", "456", content.clone())
            .optional_params(sar_tlvs(300, 2, 1).to_vec());

        let fragment = detect_fragment(&pdu, &content).unwrap();
        assert_eq!(fragment.reference, 300);
        assert_eq!(fragment.payload, content);
    }

    #[test]
    fn long_messages_split_into_130_byte_parts() {
        assert_eq!(split_message(&Bytes::from(vec![b'a'; 140])).len(), 1);

        let parts = split_message(&Bytes::from(vec![b'a'; 300]));
        let sizes: Vec<usize> = parts.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![130, 130, 40]);
    }
}
