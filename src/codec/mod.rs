//! Binary wire codec for protocol envelopes.
//!
//! Envelopes travel as length-prefixed, checksummed frames so that a plain
//! byte stream (TCP, a pipe, an in-memory buffer) can carry them.
//!
//! # Wire Format
//!
//! ```text
//! ┌──────────────────┬──────────────┬─────────────────────────┐
//! │ Length (varint)  │ CRC32 (4, LE)│ Body (JSON envelope)    │
//! └──────────────────┴──────────────┴─────────────────────────┘
//! ```
//!
//! | Condition              | Result                                   |
//! |------------------------|------------------------------------------|
//! | Length > limit         | [`MocapError::FrameTooLarge`]            |
//! | CRC mismatch           | [`MocapError::Checksum`]                 |
//! | Body not JSON          | [`MocapError::Json`]                     |
//! | Header ok, payload bad | Envelope with `payload: None`            |
//!
//! [`MocapError::FrameTooLarge`]: crate::error::MocapError::FrameTooLarge
//! [`MocapError::Checksum`]: crate::error::MocapError::Checksum
//! [`MocapError::Json`]: crate::error::MocapError::Json
//!
//! # Usage
//!
//! ```rust,ignore
//! use mocap::codec::WireCodec;
//!
//! let codec = WireCodec::new();
//! let frame = codec.encode(&envelope)?;
//! let back = codec.decode(&frame)?;
//! ```

mod frame;
pub mod varint;

pub use frame::{decode_body, FrameDecoder, WireCodec};

/// Default maximum frame body size (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;
