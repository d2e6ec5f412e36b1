//! Errors surfaced by the stream decoder.
//!
//! Container and header errors are fatal for the page or packet they were
//! found in; the caller decides whether to [resynchronise][1] or give up.
//! A decode-engine error only concerns the sub-frame that produced it.
//!
//! [1]: crate::decoder::StreamDecoder::resync

use thiserror::Error;

use crate::engine::EngineError;
use crate::header::HeaderError;
use crate::packet::config::Mode;
use crate::packet::parser::FrameLengthError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The input does not start with the Ogg capture pattern.
    #[error("Ogg capture pattern not found, resynchronisation required")]
    SyncLost,
    /// The identification header is missing or describes an unsupported stream.
    #[error("identification header: {0}")]
    Header(#[from] HeaderError),
    /// The packet uses a mode this decoder does not synthesise.
    #[error("{0:?} mode is not supported")]
    UnsupportedMode(Mode),
    /// A length declared on the wire exceeds the supplied input. Nothing
    /// was consumed; retry with at least `needed` bytes.
    #[error("short buffer: {needed} bytes needed, {available} available")]
    ShortBuffer { needed: usize, available: usize },
    /// The PCM output slice cannot hold the sub-frame. Nothing was consumed.
    #[error("output buffer too small: {needed} samples needed, {available} available")]
    OutputTooSmall { needed: usize, available: usize },
    /// Frame packing of the packet does not fit its length.
    #[error("malformed packet: {0}")]
    FrameLength(#[from] FrameLengthError),
    /// Returned verbatim by a SILK or CELT engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl Error {
    pub(crate) fn short(needed: usize, available: usize) -> Self {
        Error::ShortBuffer { needed, available }
    }
}
