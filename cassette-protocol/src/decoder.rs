//! Event-stream framing.
//!
//! Backends stream one event per `data:` line. Anything else on the wire
//! (blank separators, `:` keep-alive comments, `event:`/`id:` fields) is
//! ignored. Chunks arrive at arbitrary boundaries, so [`FrameDecoder`] holds
//! back the trailing partial line until the rest of it shows up.
//!
//! # Example
//!
//! ```
//! use cassette_protocol::{FrameDecoder, Frame, EventKind};
//!
//! let mut decoder = FrameDecoder::new();
//! assert!(decoder.push(b"data: {\"type\":\"TEXT_MESSAGE_E").is_empty());
//!
//! let frames = decoder.push(b"ND\",\"messageId\":\"m1\"}\n\n");
//! match &frames[..] {
//!     [Frame::Event(event)] => assert_eq!(event.kind(), EventKind::TextMessageEnd),
//!     other => panic!("unexpected frames: {:?}", other),
//! }
//! ```

use futures::stream::Stream;
use futures::StreamExt;

use crate::error::DecodeError;
use crate::events::AguiEvent;

/// Field prefix that marks an event record.
pub const DATA_PREFIX: &str = "data:";

/// One decoded record from the stream.
#[derive(Debug)]
pub enum Frame {
    /// A well-formed event.
    Event(AguiEvent),
    /// A `data:` line whose payload could not be decoded.
    Malformed(DecodeError),
}

/// Decode a single transport line.
///
/// Returns `Ok(None)` for lines that carry no event and `Err` only when a
/// `data:` payload fails to parse.
pub fn parse_line(line: &str) -> Result<Option<AguiEvent>, DecodeError> {
    let line = line.trim_end_matches('\r');
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(payload)
        .map(Some)
        .map_err(|source| DecodeError {
            payload: payload.to_string(),
            source,
        })
}

/// Decode a single transport line, logging and discarding malformed payloads.
///
/// Never fails: transports interleave keep-alives and comments with real
/// events, and a bad record must not end the stream.
pub fn decode_line(line: &str) -> Option<AguiEvent> {
    match parse_line(line) {
        Ok(event) => event,
        Err(err) => {
            log::warn!("Skipping malformed frame: {}", err);
            None
        }
    }
}

/// Incremental line decoder over raw byte chunks.
///
/// Lines are split at the byte level, so a multi-byte character cut by a
/// chunk boundary is reassembled before decoding.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Some(frame) = decode_frame(&self.buffer[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        frames
    }

    /// Decode whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buffer);
        decode_frame(&rest)
    }

    /// Number of buffered bytes waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_frame(bytes: &[u8]) -> Option<Frame> {
    let line = String::from_utf8_lossy(bytes);
    match parse_line(&line) {
        Ok(Some(event)) => Some(Frame::Event(event)),
        Ok(None) => None,
        Err(err) => {
            log::warn!("Skipping malformed frame: {}", err);
            Some(Frame::Malformed(err))
        }
    }
}

/// Adapt a chunked byte stream into a stream of frames.
///
/// The first transport error is yielded and ends the stream. When the input
/// ends cleanly, any buffered partial line is flushed.
pub fn decode_stream<S, B, E>(stream: S) -> impl Stream<Item = Result<Frame, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    async_stream::stream! {
        let mut decoder = FrameDecoder::new();
        futures::pin_mut!(stream);

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for frame in decoder.push(bytes.as_ref()) {
                        yield Ok(frame);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            yield Ok(frame);
        }
    }
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
