//! Length-prefixed framing between the console and the debugger host.
//!
//! Wire format: `[length: u32 little-endian][payload: UTF-8 bytes]`
//!
//! The same framing is used in both directions. The length counts payload
//! bytes only. The prefix width is fixed for the whole connection; there is
//! no negotiation and no auto-detection.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio::io::AsyncWriteExt;

use crate::error::{ConsoleError, Result};

/// Width of the length prefix in bytes.
pub const PREFIX_LEN: usize = 4;

/// Maximum frame payload size (16 MiB). Prevents OOM on malformed data.
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Encode a command into a single frame.
///
/// No terminator is added; callers that want newline-terminated commands
/// append the newline themselves.
pub fn encode(command: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(PREFIX_LEN + command.len());
    buf.put_u32_le(command.len() as u32);
    buf.put(command.as_bytes());
    buf.freeze()
}

/// Decode exactly one complete frame (synchronous, for testing).
pub fn decode(mut data: &[u8]) -> Result<String> {
    if data.len() < PREFIX_LEN {
        return Err(ConsoleError::MalformedFrame("frame too short".into()));
    }
    let length = data.get_u32_le() as usize;
    if data.remaining() != length {
        return Err(ConsoleError::MalformedFrame(format!(
            "declared {} payload bytes, found {}",
            length,
            data.remaining()
        )));
    }
    Ok(String::from_utf8_lossy(data).into_owned())
}

/// Write an already-encoded frame to an async writer.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, frame: &Bytes) -> io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingPrefix,
    AwaitingPayload { length: usize },
}

/// Per-connection accumulator that turns arbitrary socket reads into frames.
///
/// Bytes that do not yet form a whole frame stay buffered across calls to
/// [`FrameCodec::feed`]. Dropping the codec discards any partial frame.
#[derive(Debug)]
pub struct FrameCodec {
    buffer: BytesMut,
    state: State,
    max_payload: u32,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(max_payload: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            state: State::AwaitingPrefix,
            max_payload,
        }
    }

    /// Append newly-arrived bytes and iterate over the payloads they complete.
    ///
    /// The iterator is lazy: payloads it does not get to (because it was
    /// dropped early) remain buffered and come out of the next `feed`.
    /// After yielding a `MalformedFrame` error the iterator ends and the
    /// codec is reset.
    pub fn feed(&mut self, data: &[u8]) -> Frames<'_> {
        self.buffer.extend_from_slice(data);
        Frames { codec: self, done: false }
    }

    /// Number of bytes received but not yet resolved into a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the codec is in the middle of a frame.
    pub fn is_partial(&self) -> bool {
        !self.buffer.is_empty() || self.state != State::AwaitingPrefix
    }

    /// Discard all buffered bytes and wait for a fresh prefix.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::AwaitingPrefix;
    }

    fn next_payload(&mut self) -> Result<Option<String>> {
        loop {
            match self.state {
                State::AwaitingPrefix => {
                    if self.buffer.len() < PREFIX_LEN {
                        return Ok(None);
                    }
                    let length = self.buffer.get_u32_le();
                    if length > self.max_payload {
                        self.reset();
                        return Err(ConsoleError::MalformedFrame(format!(
                            "frame payload too large: {} bytes (max {})",
                            length, self.max_payload
                        )));
                    }
                    self.state = State::AwaitingPayload {
                        length: length as usize,
                    };
                }
                State::AwaitingPayload { length } => {
                    if self.buffer.len() < length {
                        return Ok(None);
                    }
                    let payload = self.buffer.split_to(length);
                    self.state = State::AwaitingPrefix;
                    return Ok(Some(String::from_utf8_lossy(&payload).into_owned()));
                }
            }
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Payloads completed by one [`FrameCodec::feed`] call.
pub struct Frames<'a> {
    codec: &'a mut FrameCodec,
    done: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.codec.next_payload() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
