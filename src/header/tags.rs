//! `OpusTags` comment header.
//!
//! ```text
//! "OpusTags" | vendor length (u32 LE) | vendor | count (u32 LE)
//!     | count x (length (u32 LE) | "KEY=value")
//! ```
//!
//! Only the artist and title are kept. An embedded `METADATA_BLOCK_PICTURE`
//! is never read: its location in the stream is reported instead, and its
//! bytes may continue over several pages.

use log::warn;
use nom::bytes::streaming::take;
use nom::number::streaming::le_u32;
use nom::IResult;

use super::OPUS_TAGS;
use crate::error::{Error, Result};

const ARTIST: &[u8] = b"artist=";
const TITLE: &[u8] = b"title=";
const PICTURE: &[u8] = b"metadata_block_picture=";

/// Where an embedded picture starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureStart {
    /// Absolute stream offset of the first picture byte.
    pub offset: u64,
    /// Picture bytes that lie inside the parsed segment.
    pub len: usize,
    /// Declared picture bytes beyond the segment.
    pub remaining: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentHeader {
    pub vendor: String,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub picture: Option<PictureStart>,
    /// Bytes of the segment that were parsed. Everything after them in the
    /// segment (the picture and whatever follows it) is left unread.
    pub parsed: usize,
    /// The comment list runs past the end of the segment.
    pub truncated: bool,
}

fn has_key(entry: &[u8], key: &[u8]) -> bool {
    entry.len() >= key.len() && entry[..key.len()].eq_ignore_ascii_case(key)
}

/// Why parsing stopped before the end of the comment list.
enum Stop {
    /// The packet continues past the end of the page.
    PageEnd,
    Short(Error),
}

/// Bounds of the segment being parsed: `segment_len` bytes belong to the
/// packet on this page, of which the first `data.len()` were supplied.
#[derive(Clone, Copy)]
struct Cursor<'a> {
    data: &'a [u8],
    segment_len: usize,
    pos: usize,
}

type Parsed<'a, T> = IResult<&'a [u8], T, nom::error::Error<&'a [u8]>>;

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Advances past a parsed field of `len` bytes. A field cut short is the
    /// end of the page when it runs past the segment, and a short buffer
    /// otherwise.
    fn advance<T>(&mut self, len: usize, parsed: Parsed<'a, T>) -> std::result::Result<T, Stop> {
        match parsed {
            Ok((rest, value)) => {
                self.pos = self.data.len() - rest.len();
                Ok(value)
            }
            Err(_) => {
                let end = self.pos.saturating_add(len);
                if end > self.segment_len {
                    Err(Stop::PageEnd)
                } else {
                    Err(Stop::Short(Error::short(end, self.data.len())))
                }
            }
        }
    }

    fn take(&mut self, len: usize) -> std::result::Result<&'a [u8], Stop> {
        let parsed: Parsed<'a, &'a [u8]> = take(len)(self.rest());
        self.advance(len, parsed)
    }

    fn peek(&self, len: usize) -> std::result::Result<&'a [u8], Stop> {
        let mut ahead = *self;
        ahead.take(len)
    }

    fn u32(&mut self) -> std::result::Result<usize, Stop> {
        let parsed: Parsed<'a, u32> = le_u32(self.rest());
        self.advance(4, parsed).map(|n| n as usize)
    }
}

impl CommentHeader {
    /// Parses the comment packet segment starting at absolute stream offset
    /// `base`. `data` holds the supplied bytes of the segment.
    ///
    /// Returns `Ok(None)` when the segment is not an `OpusTags` packet.
    pub fn parse(data: &[u8], segment_len: usize, base: u64) -> Result<Option<Self>> {
        let data = &data[..data.len().min(segment_len)];
        let mut cur = Cursor {
            data,
            segment_len,
            pos: 0,
        };

        match cur.take(OPUS_TAGS.len()) {
            Ok(signature) if signature == OPUS_TAGS => {}
            Ok(_) | Err(Stop::PageEnd) => return Ok(None),
            Err(Stop::Short(e)) => return Err(e),
        }

        let mut header = CommentHeader::default();

        match header.read_entries(&mut cur, base) {
            Ok(()) => {}
            Err(Stop::PageEnd) => {
                warn!(
                    "comment header continues past its page, {} bytes parsed",
                    cur.pos
                );
                header.truncated = true;
            }
            Err(Stop::Short(e)) => return Err(e),
        }
        header.parsed = cur.pos;

        Ok(Some(header))
    }

    fn read_entries(&mut self, cur: &mut Cursor<'_>, base: u64) -> std::result::Result<(), Stop> {
        let vendor_len = cur.u32()?;
        self.vendor = String::from_utf8_lossy(cur.take(vendor_len)?).into_owned();

        let count = cur.u32()?;
        for _ in 0..count {
            let len = cur.u32()?;

            let key = cur.peek(len.min(PICTURE.len()))?;
            if len >= PICTURE.len() && has_key(key, PICTURE) {
                let value_start = cur.pos + PICTURE.len();
                let declared = len - PICTURE.len();
                let in_segment = declared.min(cur.segment_len - value_start);

                self.picture = Some(PictureStart {
                    offset: base + value_start as u64,
                    len: in_segment,
                    remaining: declared - in_segment,
                });
                cur.pos = value_start;
                return Ok(());
            }

            let entry = cur.take(len)?;
            if has_key(entry, ARTIST) {
                self.artist = Some(String::from_utf8_lossy(&entry[ARTIST.len()..]).into_owned());
            } else if has_key(entry, TITLE) {
                self.title = Some(String::from_utf8_lossy(&entry[TITLE.len()..]).into_owned());
            }
        }

        Ok(())
    }

    /// "artist - title", or whichever of the two is present.
    pub fn stream_title(&self) -> Option<String> {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => Some(format!("{artist} - {title}")),
            (Some(artist), None) => Some(artist.clone()),
            (None, Some(title)) => Some(title.clone()),
            (None, None) => None,
        }
    }
}
