//! Frame encoding and decoding.
//!
//! # Wire Format
//!
//! ```text
//! <body_len: varint><crc32: 4, little endian><body: body_len bytes>
//! ```
//!
//! The body is the JSON encoding of an [`Envelope`]. The checksum covers the
//! body only.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::{Buf, BytesMut};

use super::varint::{read_varint, varint_size, write_varint};
use super::DEFAULT_MAX_FRAME_SIZE;
use crate::error::{MocapError, Result};
use crate::protocol::{Envelope, Header, Payload};

const CRC_SIZE: usize = 4;

/// Stateless envelope <-> frame codec
#[derive(Debug, Clone, Copy)]
pub struct WireCodec {
    max_frame_size: usize,
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl WireCodec {
    /// Create a codec with the default size limit
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Set the largest accepted body size in bytes
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Largest accepted body size in bytes
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode an envelope into one frame.
    ///
    /// Transforms with NaN or infinite components are rejected, since JSON
    /// has no representation for them.
    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        if let Some(xform) = envelope.payload.as_ref().and_then(Payload::transform) {
            if !xform.is_finite() {
                return Err(MocapError::Codec(format!(
                    "non-finite transform in message {}",
                    envelope.id()
                )));
            }
        }

        let body = serde_json::to_vec(envelope)?;
        if body.len() > self.max_frame_size {
            return Err(MocapError::FrameTooLarge {
                size: body.len(),
                limit: self.max_frame_size,
            });
        }

        let mut frame = Vec::with_capacity(varint_size(body.len() as u64) + CRC_SIZE + body.len());
        write_varint(&mut frame, body.len() as u64);
        frame.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decode exactly one complete frame
    pub fn decode(&self, data: &[u8]) -> Result<Envelope> {
        match self.locate(data)? {
            Some(bounds) if bounds.end == data.len() => {
                let body = &data[bounds.start..bounds.end];
                verify(body, bounds.crc)?;
                decode_body(body)
            },
            Some(bounds) => Err(MocapError::Codec(format!(
                "{} trailing bytes after frame",
                data.len() - bounds.end
            ))),
            None => Err(MocapError::Codec("truncated frame".to_string())),
        }
    }

    /// Encode an envelope as base64 text (for logs and the CLI)
    pub fn encode_string(&self, envelope: &Envelope) -> Result<String> {
        Ok(BASE64.encode(self.encode(envelope)?))
    }

    /// Decode a base64 text frame
    pub fn decode_string(&self, data: &str) -> Result<Envelope> {
        let bytes = BASE64.decode(data.trim())?;
        self.decode(&bytes)
    }

    /// Locate the first frame in `data`, or `None` when more data is needed.
    fn locate(&self, data: &[u8]) -> Result<Option<FrameBounds>> {
        let Some((len, prefix)) = read_varint(data)? else {
            return Ok(None);
        };

        let len = usize::try_from(len).map_err(|_| MocapError::FrameTooLarge {
            size: usize::MAX,
            limit: self.max_frame_size,
        })?;
        if len > self.max_frame_size {
            return Err(MocapError::FrameTooLarge {
                size: len,
                limit: self.max_frame_size,
            });
        }

        let total = prefix + CRC_SIZE + len;
        if data.len() < total {
            return Ok(None);
        }

        let crc_bytes = &data[prefix..prefix + CRC_SIZE];
        Ok(Some(FrameBounds {
            start: prefix + CRC_SIZE,
            end: total,
            crc: u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]),
        }))
    }
}

/// Position of one frame's body inside a buffer
#[derive(Debug, Clone, Copy)]
struct FrameBounds {
    start: usize,
    end: usize,
    crc: u32,
}

fn verify(body: &[u8], expected: u32) -> Result<()> {
    let actual = crc32fast::hash(body);
    if expected != actual {
        return Err(MocapError::Checksum { expected, actual });
    }
    Ok(())
}

/// Decode a frame body.
///
/// A body whose header is readable but whose payload is not yields an
/// envelope without payload, so the session can answer it as malformed.
pub fn decode_body(body: &[u8]) -> Result<Envelope> {
    let value: serde_json::Value = serde_json::from_slice(body)?;

    match serde_json::from_value::<Envelope>(value.clone()) {
        Ok(envelope) => Ok(envelope),
        Err(err) => {
            let header = value.get("header").cloned().ok_or_else(|| {
                MocapError::MalformedMessage(format!("message has no header: {err}"))
            })?;
            let header: Header = serde_json::from_value(header)
                .map_err(|e| MocapError::MalformedMessage(format!("unreadable header: {e}")))?;

            tracing::warn!(message_id = %header.id, error = %err, "unreadable payload");
            Ok(Envelope {
                header,
                payload: None,
            })
        },
    }
}

/// Incremental decoder for a byte stream carrying back-to-back frames
#[derive(Debug, Default)]
pub struct FrameDecoder {
    codec: WireCodec,
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a decoder using `codec`'s limits
    pub fn new(codec: WireCodec) -> Self {
        Self {
            codec,
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet decoded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete frame's body out of the buffer.
    ///
    /// A frame failing its checksum is still consumed, so the stream stays
    /// aligned on the following frame.
    pub fn next_body(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(bounds) = self.codec.locate(&self.buffer)? else {
            return Ok(None);
        };
        let body = self.buffer[bounds.start..bounds.end].to_vec();
        self.buffer.advance(bounds.end);
        verify(&body, bounds.crc)?;
        Ok(Some(body))
    }

    /// Decode the next complete frame, if one is buffered
    pub fn next_envelope(&mut self) -> Result<Option<Envelope>> {
        match self.next_body()? {
            Some(body) => decode_body(&body).map(Some),
            None => Ok(None),
        }
    }
}
