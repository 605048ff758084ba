// ABOUTME: Provides frame-level I/O for an SMPP v3.4 session over any async byte stream
// ABOUTME: Reads through the FrameReader FIFO and writes encoded frames through a buffered writer

use crate::codec::CodecError;
use crate::frame::{Frame, FrameReader};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// SMPP v3.4 Connection Management
///
/// Handles frame-based communication for one SMPP session. The stream is
/// usually a `TcpStream`; tests plug in `tokio::io::duplex` halves.
///
/// ## SMPP v3.4 Session States (Section 2.1)
///
/// ```text
/// CLOSED → OPEN → BOUND_TX/BOUND_RX/BOUND_TRX → CLOSED
/// ```
///
/// `Connection` only moves frames. The session state machine lives in
/// [`Esme`](crate::client::Esme), which decides what may be sent when.
#[derive(Debug)]
pub struct Connection<S> {
    // The stream, decorated with a `BufWriter` for write level buffering.
    // Reads go straight to the inner stream through `FrameReader`'s buffer.
    stream: BufWriter<S>,

    // Incoming bytes and the FIFO of complete frames.
    reader: FrameReader,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new `Connection`, backed by `socket`.
    pub fn new(socket: S) -> Connection<S> {
        Connection {
            stream: BufWriter::new(socket),
            reader: FrameReader::new(),
        }
    }

    /// Read a single `Frame` value from the underlying stream.
    ///
    /// Frames come out in the order their last byte arrived. This method is
    /// cancel safe: if the future is dropped while waiting on the socket no
    /// data is lost, which lets the session use it inside `tokio::select!`.
    ///
    /// # Returns
    ///
    /// On success, the received frame is returned. If the stream is closed in
    /// a way that doesn't break a frame in half, it returns `None`. Otherwise,
    /// an error is returned.
    pub async fn read_frame(&mut self) -> crate::Result<Option<Frame>> {
        loop {
            if let Some(data) = self.reader.next_frame() {
                return Ok(Some(Frame::parse(&data)?));
            }

            // There is not enough buffered data to read a frame. Attempt to
            // read more data from the socket. `0` indicates "end of stream".
            if 0 == self.stream.read_buf(self.reader.buffer_mut()).await? {
                // For this to be a clean shutdown, there should be no data in
                // the read buffer. If there is, the peer closed the socket
                // while sending a frame.
                return if self.reader.pending_bytes() == 0 {
                    Ok(None)
                } else {
                    Err("connection reset by peer".into())
                };
            }

            self.reader.extract()?;
        }
    }

    /// Write a single `Frame` value to the underlying stream and flush it.
    pub async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let bytes = frame
            .to_bytes()
            .map_err(|e: CodecError| io::Error::new(io::ErrorKind::InvalidData, e))?;

        self.write_encoded(&bytes).await
    }

    /// Write an already encoded frame and flush it.
    pub async fn write_encoded(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;

        // Ensure the encoded frame is written to the socket.
        self.stream.flush().await
    }

    /// Flush pending writes and shut down the write half.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
