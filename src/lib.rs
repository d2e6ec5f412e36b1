//! Ogg Opus demultiplexing and frame packing.
//!
//! Reads an Ogg Opus stream ([RFC 7845][1]) incrementally, validates its
//! headers, splits every audio packet into its compressed frames
//! ([RFC 6716, Sec 3.2][2]) and hands each frame to a SILK or CELT
//! [`FrameDecoder`]. Sample synthesis itself is left to those engines.
//!
//! [1]: https://datatracker.ietf.org/doc/html/rfc7845
//! [2]: https://datatracker.ietf.org/doc/html/rfc6716#section-3.2

pub mod decoder;
pub mod engine;
pub mod error;
pub mod header;
pub mod ogg;
pub mod options;
pub mod packet;

#[cfg(test)]
mod test_helper;

pub use decoder::{PictureRange, State, StreamDecoder};
pub use engine::{EngineError, FrameDecoder, FrameParams};
pub use error::{Error, Result};
pub use options::{DecoderOptions, HybridPolicy};
