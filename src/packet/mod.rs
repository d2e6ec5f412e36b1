//! An Opus packet is a container of multiple isoconfig Opus frames.
//!
//! Packets contain a set of frames either of same (usually CBR) or variable size.
//! For variable size frames (usually VBR), variably-sized length fields are present
//! for all but the last frame, for such it becomes non-delimiting. The
//! self-delimiting framing of [RFC 6716, Appendix B][1] is not handled, so
//! multistream packets (channel mapping families other than 0) cannot be
//! split here.
//!
//! [1]: https://datatracker.ietf.org/doc/html/rfc6716#appendix-B

pub mod config;
pub mod parser;
pub mod toc;
pub(crate) mod utils;
