// ABOUTME: Splits an inbound byte stream into complete SMPP frames using the length prefix
// ABOUTME: Queues frames in arrival order so the session handles them strictly one at a time

pub use crate::codec::Frame;

use crate::codec::CodecError;
use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;
use std::fmt;
use std::io::Cursor;

/// Accumulates raw bytes and slices them into whole PDUs.
///
/// Bytes are appended with [`push`](FrameReader::push); every complete frame
/// found is moved to a FIFO and handed out by
/// [`next_frame`](FrameReader::next_frame) in the order it arrived. A partial
/// frame simply stays buffered until the rest of it shows up.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: BytesMut,
    queue: VecDeque<Bytes>,
}

impl FrameReader {
    pub fn new() -> Self {
        FrameReader {
            buffer: BytesMut::with_capacity(4 * 1024),
            queue: VecDeque::new(),
        }
    }

    /// Append a chunk and queue every frame it completes.
    ///
    /// Fails only when the buffered data declares an impossible length; the
    /// stream is unusable after that.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.buffer.extend_from_slice(chunk);
        self.extract()
    }

    /// Queue every complete frame sitting in the read buffer.
    pub(crate) fn extract(&mut self) -> Result<(), Error> {
        loop {
            let mut cursor = Cursor::new(&self.buffer[..]);
            match Frame::check(&mut cursor) {
                Ok(len) => {
                    let frame = self.buffer.split_to(len).freeze();
                    self.queue.push_back(frame);
                }
                Err(Error::Incomplete) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Oldest complete frame, if any.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        self.queue.pop_front()
    }

    /// Mutable access to the read buffer for socket reads.
    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Bytes received that do not yet form a complete frame.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.remaining()
    }

    /// Number of complete frames waiting to be handled.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[derive(Debug)]
pub enum Error {
    /// Not enough data is available to parse a message
    Incomplete,

    /// Invalid message encoding
    Other(crate::Error),
}

impl From<CodecError> for Error {
    fn from(src: CodecError) -> Error {
        match src {
            CodecError::Incomplete => Error::Incomplete,
            other => Error::Other(Box::new(other)),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Incomplete => write!(fmt, "stream ended early"),
            Error::Other(err) => write!(fmt, "{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encodable;
    use crate::datatypes::{EnquireLink, SubmitSmResponse};

    #[test]
    fn frames_split_across_chunks_are_reassembled() {
        let bytes = EnquireLink::new(7).to_bytes().unwrap();
        let mut reader = FrameReader::new();

        reader.push(&bytes[..10]).unwrap();
        assert_eq!(reader.queued(), 0);
        assert_eq!(reader.pending_bytes(), 10);

        reader.push(&bytes[10..]).unwrap();
        assert_eq!(reader.queued(), 1);
        assert_eq!(reader.next_frame().unwrap(), bytes);
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn several_frames_in_one_chunk_keep_arrival_order() {
        let first = EnquireLink::new(1).to_bytes().unwrap();
        let second = SubmitSmResponse::new(2, "abc").to_bytes().unwrap();
        let third = EnquireLink::new(3).to_bytes().unwrap();

        let mut chunk = Vec::new();
        chunk.extend_from_slice(&first);
        chunk.extend_from_slice(&second);
        chunk.extend_from_slice(&third[..5]);

        let mut reader = FrameReader::new();
        reader.push(&chunk).unwrap();

        assert_eq!(reader.next_frame().unwrap(), first);
        assert_eq!(reader.next_frame().unwrap(), second);
        assert!(reader.next_frame().is_none());

        reader.push(&third[5..]).unwrap();
        assert_eq!(reader.next_frame().unwrap(), third);
    }

    #[test]
    fn short_header_waits_for_more_bytes() {
        let mut reader = FrameReader::new();
        reader.push(&[0x00, 0x00]).unwrap();
        assert_eq!(reader.queued(), 0);
    }

    #[test]
    fn impossible_length_is_fatal() {
        let data = [
            0x00, 0x00, 0x00, 0x05, // command_length = 5 (too small)
            0x00, 0x00, 0x00, 0x15, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
        ];
        let mut reader = FrameReader::new();
        assert!(matches!(reader.push(&data), Err(Error::Other(_))));
    }
}
