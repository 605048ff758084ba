// ABOUTME: Maps the SMPP data_coding byte to a text codec for inbound short messages
// ABOUTME: Unknown codings and undecodable bytes are handed back raw instead of failing

use bytes::Bytes;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Text encodings a short message body can be decoded with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum TextCodec {
    #[serde(rename = "ascii")]
    Ascii,
    #[serde(rename = "latin1", alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// UCS-2 is decoded as UTF-16BE
    #[serde(rename = "utf-16be", alias = "ucs2")]
    Utf16Be,
}

#[derive(Debug, Error, PartialEq)]
#[error("bytes are not valid {codec}")]
pub struct DecodeError {
    pub codec: TextCodec,
}

impl TextCodec {
    pub fn decode(self, bytes: &[u8]) -> Result<String, DecodeError> {
        let fail = || DecodeError { codec: self };
        match self {
            TextCodec::Ascii => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|&b| b as char).collect())
                } else {
                    Err(fail())
                }
            }
            TextCodec::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            TextCodec::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| fail()),
            TextCodec::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(fail());
                }
                let units = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
                char::decode_utf16(units)
                    .collect::<Result<String, _>>()
                    .map_err(|_| fail())
            }
        }
    }

    /// Encode `text`; `None` when a character has no representation.
    pub fn encode(self, text: &str) -> Option<Bytes> {
        match self {
            TextCodec::Ascii => text.is_ascii().then(|| Bytes::copy_from_slice(text.as_bytes())),
            TextCodec::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect::<Option<Vec<u8>>>()
                .map(Bytes::from),
            TextCodec::Utf8 => Some(Bytes::copy_from_slice(text.as_bytes())),
            TextCodec::Utf16Be => Some(
                text.encode_utf16()
                    .flat_map(u16::to_be_bytes)
                    .collect::<Vec<u8>>()
                    .into(),
            ),
        }
    }
}

impl fmt::Display for TextCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextCodec::Ascii => "ascii",
            TextCodec::Latin1 => "latin1",
            TextCodec::Utf8 => "utf-8",
            TextCodec::Utf16Be => "utf-16be",
        };
        f.write_str(name)
    }
}

/// Decoded body of an inbound message
#[derive(Clone, Debug, PartialEq)]
pub enum MessageContent {
    Text(String),
    /// Undecoded octets: unsupported data_coding or bytes the codec rejected
    Raw(Bytes),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Raw(_) => None,
        }
    }
}

/// data_coding value to codec table: 1 is ASCII, 3 Latin-1, 8 UCS-2,
/// optionally extended or replaced per value.
#[derive(Clone, Debug)]
pub struct DataCodingTable {
    codecs: HashMap<u8, TextCodec>,
}

impl Default for DataCodingTable {
    fn default() -> Self {
        DataCodingTable {
            codecs: HashMap::from([
                (1, TextCodec::Ascii),
                (3, TextCodec::Latin1),
                (8, TextCodec::Utf16Be),
            ]),
        }
    }
}

impl DataCodingTable {
    pub fn with_overrides(overrides: &HashMap<u8, TextCodec>) -> Self {
        let mut table = Self::default();
        table.codecs.extend(overrides.iter().map(|(k, v)| (*k, *v)));
        table
    }

    pub fn codec(&self, data_coding: u8) -> Option<TextCodec> {
        self.codecs.get(&data_coding).copied()
    }

    pub fn decode(&self, data_coding: u8, bytes: Bytes) -> MessageContent {
        let Some(codec) = self.codec(data_coding) else {
            tracing::warn!(data_coding, "Not decoding message with unsupported data_coding");
            return MessageContent::Raw(bytes);
        };

        match codec.decode(&bytes) {
            Ok(text) => MessageContent::Text(text),
            Err(e) => {
                tracing::warn!(data_coding, "Passing message through undecoded: {}", e);
                MessageContent::Raw(bytes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ucs2_decodes_as_utf16be() {
        let bytes = TextCodec::Utf16Be.encode("Zoë ☃").unwrap();
        assert_eq!(bytes.as_ref(), &[0, 0x5A, 0, 0x6F, 0, 0xEB, 0, 0x20, 0x26, 0x03]);

        let table = DataCodingTable::default();
        assert_eq!(
            table.decode(8, bytes),
            MessageContent::Text("Zoë ☃".to_string())
        );
    }

    #[test]
    fn latin1_maps_bytes_to_code_points() {
        assert_eq!(TextCodec::Latin1.decode(&[0x63, 0x61, 0x66, 0xE9]).unwrap(), "café");
        assert_eq!(TextCodec::Latin1.encode("☃"), None);
    }

    #[test]
    fn unsupported_coding_passes_raw_bytes() {
        let table = DataCodingTable::default();
        let raw = Bytes::from_static(&[0x01, 0x02, 0xFF]);
        assert_eq!(table.decode(4, raw.clone()), MessageContent::Raw(raw));
    }

    #[test]
    fn failed_decode_passes_raw_bytes() {
        let table = DataCodingTable::default();
        let raw = Bytes::from_static(&[0x00, 0x41, 0x00]);
        assert_eq!(table.decode(8, raw.clone()), MessageContent::Raw(raw.clone()));
        assert_eq!(
            table.decode(1, Bytes::from_static(b"caf\xe9")),
            MessageContent::Raw(Bytes::from_static(b"caf\xe9"))
        );
    }

    #[test]
    fn overrides_extend_the_table() {
        let table = DataCodingTable::with_overrides(&HashMap::from([
            (0, TextCodec::Utf8),
            (1, TextCodec::Latin1),
        ]));
        assert_eq!(table.codec(0), Some(TextCodec::Utf8));
        assert_eq!(table.codec(1), Some(TextCodec::Latin1));
        assert_eq!(table.codec(8), Some(TextCodec::Utf16Be));
        assert_eq!(
            table.decode(0, Bytes::from_static("héllo".as_bytes())).as_text(),
            Some("héllo")
        );
    }
}
