//! Ogg container framing, [RFC 3533][1].
//!
//! ```text
//! - Capture Pattern: "OggS" (4 bytes)
//! - Version: 0 (1 byte)
//! - Header Type: 1=continuation, 2=bos, 4=eos (1 byte)
//! - Granule Position (8 bytes, LE)
//! - Bitstream Serial Number (4 bytes, LE)
//! - Page Sequence Number (4 bytes, LE)
//! - CRC Checksum (4 bytes, LE)
//! - Number of Page Segments (1 byte)
//! - Segment Table (variable)
//! ```
//!
//! [1]: https://www.xiph.org/ogg/doc/rfc3533.txt

pub mod page;
pub mod segment;

pub use page::{find_sync, Page, PageFlags};
pub use segment::{Segment, SegmentTable};

pub const CAPTURE_PATTERN: &[u8; 4] = b"OggS";

/// Page header length without lacing values.
pub const MIN_HEADER_LEN: usize = 27;
