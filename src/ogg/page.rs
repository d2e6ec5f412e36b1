use bitvec::prelude::*;
use nom::bytes::complete::{tag, take};
use nom::number::complete::{le_u32, le_u64, le_u8};
use nom::IResult;

use super::segment::SegmentTable;
use super::{CAPTURE_PATTERN, MIN_HEADER_LEN};
use crate::error::{Error, Result};

/// Header type flags of a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageFlags {
    /// The page starts with the rest of a packet from the previous page.
    pub continued: bool,
    /// Beginning of stream.
    pub first: bool,
    /// End of stream.
    pub last: bool,
}

impl From<u8> for PageFlags {
    fn from(byte: u8) -> Self {
        let bits = byte.view_bits::<Lsb0>();

        Self {
            continued: bits[0],
            first: bits[1],
            last: bits[2],
        }
    }
}

/// A parsed Ogg page header. The payload itself is left in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub version: u8,
    pub flags: PageFlags,
    pub granule_position: u64,
    pub serial: u32,
    pub sequence: u32,
    /// Carried as read; never verified.
    pub crc: u32,
    pub lacing: Vec<u8>,
    pub segments: SegmentTable,
    /// 27 plus the number of lacing values.
    pub header_len: usize,
}

struct RawHeader<'a> {
    version: u8,
    header_type: u8,
    granule_position: u64,
    serial: u32,
    sequence: u32,
    crc: u32,
    lacing: &'a [u8],
}

fn raw_header(input: &[u8]) -> IResult<&[u8], RawHeader<'_>> {
    let (input, _) = tag(&CAPTURE_PATTERN[..])(input)?;
    let (input, version) = le_u8(input)?;
    let (input, header_type) = le_u8(input)?;
    let (input, granule_position) = le_u64(input)?;
    let (input, serial) = le_u32(input)?;
    let (input, sequence) = le_u32(input)?;
    let (input, crc) = le_u32(input)?;
    let (input, count) = le_u8(input)?;
    let (input, lacing) = take(count)(input)?;

    Ok((
        input,
        RawHeader {
            version,
            header_type,
            granule_position,
            serial,
            sequence,
            crc,
            lacing,
        },
    ))
}

impl Page {
    /// Parses the page header at the start of `input`.
    ///
    /// Fails with [`Error::SyncLost`] when `input` does not begin with the
    /// capture pattern and with [`Error::ShortBuffer`] when the header or
    /// its lacing values are cut off. The payload need not be present.
    pub fn parse(input: &[u8]) -> Result<Self> {
        if !input.starts_with(CAPTURE_PATTERN) {
            if CAPTURE_PATTERN.starts_with(input) {
                return Err(Error::short(MIN_HEADER_LEN, input.len()));
            }
            return Err(Error::SyncLost);
        }

        if input.len() < MIN_HEADER_LEN {
            return Err(Error::short(MIN_HEADER_LEN, input.len()));
        }

        let header_len = MIN_HEADER_LEN + input[MIN_HEADER_LEN - 1] as usize;
        if input.len() < header_len {
            return Err(Error::short(header_len, input.len()));
        }

        let (_, raw) = raw_header(input).map_err(|_| Error::short(header_len, input.len()))?;

        Ok(Self {
            version: raw.version,
            flags: raw.header_type.into(),
            granule_position: raw.granule_position,
            serial: raw.serial,
            sequence: raw.sequence,
            crc: raw.crc,
            lacing: raw.lacing.to_vec(),
            segments: SegmentTable::from_lacing(raw.lacing),
            header_len,
        })
    }

    pub fn payload_len(&self) -> usize {
        self.segments.payload_len()
    }

    /// Header and payload together.
    pub fn total_len(&self) -> usize {
        self.header_len + self.payload_len()
    }
}

/// Offset of the first capture pattern in `buf`.
pub fn find_sync(buf: &[u8]) -> Option<usize> {
    buf.windows(CAPTURE_PATTERN.len())
        .position(|window| window == CAPTURE_PATTERN)
}
