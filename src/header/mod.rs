//! The two header packets opening an Ogg Opus stream, [RFC 7845][1].
//!
//! [1]: https://datatracker.ietf.org/doc/html/rfc7845#section-5

pub mod head;
pub mod tags;

use thiserror::Error;

pub use head::IdentificationHeader;
pub use tags::{CommentHeader, PictureStart};

pub const OPUS_HEAD: &[u8; 8] = b"OpusHead";
pub const OPUS_TAGS: &[u8; 8] = b"OpusTags";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The packet does not start with `OpusHead`.
    #[error("OpusHead signature not found")]
    MissingSignature,
    /// Fewer than the 19 mandatory bytes.
    #[error("packet of {0} bytes is too short")]
    Truncated(usize),
    /// Major version (upper nibble) is not 0.
    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),
    /// Only mono and stereo are decoded.
    #[error("channel count {0} out of range")]
    ChannelCount(u8),
    /// Only channel mapping family 0 is decoded.
    #[error("channel mapping family {0} unsupported")]
    ChannelMapping(u8),
}
