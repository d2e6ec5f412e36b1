use std::ops::Range;

use bitvec::prelude::*;
use thiserror::Error;

pub use super::config::*;
pub use super::toc::{Code, Toc};
use super::utils::parse_frame_length;
#[cfg(feature = "strict")]
use super::utils::MAX_FRAME_LEN;

/// Longest audio a single packet may carry: 120 ms at 48 kHz.
#[cfg(feature = "strict")]
const MAX_PACKET_SAMPLES: usize = 5760;

/// An error that occured during parsing, volating one of the
/// Opus packet handling rules defined in [RFC 6716, Sec 3.4][1].
///
/// [1]: https://datatracker.ietf.org/doc/html/rfc6716#section-3.4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameLengthError {
    /// No TOC exists in the packet.
    #[error("packet has no TOC byte")]
    NoToc,
    /// Frame is too big (more than 1275 bytes).
    ///
    /// Note: Only thrown if `strict` is enabled.
    #[error("frame of {0} bytes exceeds 1275 bytes")]
    FrameTooBig(usize),
    /// Odd payload length for *Code 1* packets.
    #[error("code 1 payload of {0} bytes is not even")]
    OddLength(usize),
    /// Packet ends inside its own framing header.
    #[error("packet too small for its framing header")]
    PacketTooSmall,
    /// Specified lengths overflow the packet size.
    #[error("declared lengths exceed the packet size")]
    LengthOverflow,
    /// Code 3 packet exceeding maximum duration past 120ms.
    ///
    /// Note: Only thrown if `strict` feature is enabled.
    #[error("packet carries more than 120 ms of audio")]
    TooMuchAudio,
    /// CBR payload is not an integer multiple of the frame count.
    ///
    /// Note: Only thrown if `strict` feature is enabled.
    #[error("CBR payload of {payload} bytes is not a multiple of {frames} frames")]
    NonMultipleRemainder { payload: usize, frames: usize },
    /// Code 3 packet having zero audio frames.
    #[error("code 3 packet signals zero frames")]
    NoAudio,
}

/// Location of one compressed frame inside its packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubFrame {
    pub offset: usize,
    pub len: usize,
}

impl SubFrame {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

/// Frame layout of a packet, see [RFC 6716, Section 3.2][1].
///
/// The lengths of all frames, the framing header and the padding never
/// add up to more than `packet_len`.
///
/// [1]: https://datatracker.ietf.org/doc/html/rfc6716#section-3.2
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub toc: Toc,
    /// Global configuration for all frames in the packet.
    pub config: Config,
    pub frames: Vec<SubFrame>,
    /// Usage of VBR, [`Some(true)`] if VBR or [`Some(false)`] if CBR or, [`None`] if
    /// it is not a Code 3 packet (i.e. field does not exist).
    pub is_vbr: Option<bool>,
    /// Trailing Opus padding in bytes, without the bytes signalling it.
    pub padding: usize,
    /// TOC, frame count, padding length and frame length bytes.
    pub header_len: usize,
    pub packet_len: usize,
}

impl FramePlan {
    /// Parses the framing of a non-self-delimiting Opus packet.
    pub fn parse(packet: &[u8]) -> Result<Self, FrameLengthError> {
        let toc = Toc::parse(*packet.first().ok_or(FrameLengthError::NoToc)?);
        let config = toc.mode();
        let len = packet.len();

        let mut plan = FramePlan {
            toc,
            config,
            frames: Vec::with_capacity(2),
            is_vbr: None,
            padding: 0,
            header_len: 1,
            packet_len: len,
        };

        match toc.code {
            Code::Code0 => {
                plan.frames.push(SubFrame {
                    offset: 1,
                    len: len - 1,
                });
            }

            Code::Code1 => {
                // The number of payload bytes available for compressed data,
                // N-1, MUST be even for all code 1 packets.
                let payload = len - 1;
                if payload % 2 != 0 {
                    return Err(FrameLengthError::OddLength(payload));
                }

                let half = payload / 2;
                plan.frames.push(SubFrame {
                    offset: 1,
                    len: half,
                });
                plan.frames.push(SubFrame {
                    offset: 1 + half,
                    len: half,
                });
            }

            Code::Code2 => {
                let (first_len, used) =
                    parse_frame_length(&packet[1..]).ok_or(FrameLengthError::PacketTooSmall)?;
                let header_len = 1 + used;

                let remaining = len - header_len;
                if first_len > remaining {
                    return Err(FrameLengthError::LengthOverflow);
                }

                plan.header_len = header_len;
                plan.frames.push(SubFrame {
                    offset: header_len,
                    len: first_len,
                });
                plan.frames.push(SubFrame {
                    offset: header_len + first_len,
                    len: remaining - first_len,
                });
            }

            Code::Code3 => plan.parse_code3(packet)?,
        }

        plan.check_limits()?;

        debug_assert!(
            plan.header_len + plan.padding + plan.frames.iter().map(|f| f.len).sum::<usize>()
                <= plan.packet_len
        );

        Ok(plan)
    }

    fn parse_code3(&mut self, packet: &[u8]) -> Result<(), FrameLengthError> {
        let len = packet.len();

        //  0 1 2 3 4 5 6 7
        // +-+-+-+-+-+-+-+-+
        // |v|p|     M     |
        // +-+-+-+-+-+-+-+-+
        let fcb = packet
            .get(1)
            .ok_or(FrameLengthError::PacketTooSmall)?
            .view_bits::<Msb0>();

        let is_vbr = fcb[0];
        let is_pad = fcb[1];
        let num_frames = fcb[2..].load_be::<u8>() as usize;

        if num_frames == 0 {
            return Err(FrameLengthError::NoAudio);
        }

        let mut pos = 2;
        let mut pad_len = 0;

        if is_pad {
            loop {
                // Values from 0...254 indicate that 0...254 bytes of padding are
                // included. 255 adds 254 bytes plus the value of the next byte.
                let padb = *packet.get(pos).ok_or(FrameLengthError::PacketTooSmall)? as usize;
                pos += 1;

                if padb != 255 {
                    pad_len += padb;
                    break;
                }

                pad_len += 254;
            }
        }

        let mut lengths = Vec::with_capacity(num_frames);
        if is_vbr {
            for _ in 0..num_frames - 1 {
                let (frame_len, used) =
                    parse_frame_length(&packet[pos..]).ok_or(FrameLengthError::PacketTooSmall)?;
                lengths.push(frame_len);
                pos += used;
            }
        }

        // R = N - header - P, the bytes left for compressed frames.
        let payload = len
            .checked_sub(pos + pad_len)
            .ok_or(FrameLengthError::LengthOverflow)?;

        if is_vbr {
            let declared: usize = lengths.iter().sum();
            if declared > payload {
                return Err(FrameLengthError::LengthOverflow);
            }

            // remaining bytes belong to the last VBR frame.
            lengths.push(payload - declared);
        } else {
            #[cfg(feature = "strict")]
            if payload % num_frames != 0 {
                return Err(FrameLengthError::NonMultipleRemainder {
                    payload,
                    frames: num_frames,
                });
            }

            // Without `strict` a residue is left between the last frame and
            // the padding and is skipped along with it.
            lengths.resize(num_frames, payload / num_frames);
        }

        let mut offset = pos;
        for frame_len in lengths {
            self.frames.push(SubFrame {
                offset,
                len: frame_len,
            });
            offset += frame_len;
        }

        self.is_vbr = Some(is_vbr);
        self.padding = pad_len;
        self.header_len = pos;

        Ok(())
    }

    #[cfg(feature = "strict")]
    fn check_limits(&self) -> Result<(), FrameLengthError> {
        if let Some(big) = self.frames.iter().find(|f| f.len > MAX_FRAME_LEN) {
            return Err(FrameLengthError::FrameTooBig(big.len));
        }

        // At maximum a packet can have
        //
        //  48 -- 2.5ms frames,
        //  24 --   5ms frames,
        //  12 --  10ms frames,
        //   6 --  20ms frames,
        //   3 --  40ms frames and
        //   2 --  60ms frames.
        if self.config.frame_samples * self.frames.len() > MAX_PACKET_SAMPLES {
            return Err(FrameLengthError::TooMuchAudio);
        }

        Ok(())
    }

    #[cfg(not(feature = "strict"))]
    fn check_limits(&self) -> Result<(), FrameLengthError> {
        Ok(())
    }

    /// Compressed bytes of every frame, in order.
    pub fn frames_of<'pkt>(&'pkt self, packet: &'pkt [u8]) -> impl Iterator<Item = &'pkt [u8]> {
        self.frames.iter().map(move |f| &packet[f.range()])
    }

    /// Samples per channel the whole packet decodes to at 48 kHz.
    pub fn samples(&self) -> usize {
        self.config.frame_samples * self.frames.len()
    }
}

/// Resumable cursor over the frames of one packet.
///
/// Hands out one [`SubFrame`] per call so a caller can decode a multi-frame
/// packet one frame at a time across several calls without parsing the
/// framing header again.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePacker {
    plan: FramePlan,
    next: usize,
}

impl FramePacker {
    pub fn new(plan: FramePlan) -> Self {
        Self { plan, next: 0 }
    }

    pub fn parse(packet: &[u8]) -> Result<Self, FrameLengthError> {
        FramePlan::parse(packet).map(Self::new)
    }

    /// Next frame and whether more frames follow it.
    pub fn next_frame(&mut self) -> Option<(SubFrame, bool)> {
        let next = self.peek_frame()?;
        self.next += 1;
        Some(next)
    }

    /// Like [`next_frame`](Self::next_frame) without moving the cursor.
    pub fn peek_frame(&self) -> Option<(SubFrame, bool)> {
        let frame = *self.plan.frames.get(self.next)?;
        Some((frame, self.next + 1 < self.plan.frames.len()))
    }

    /// Frames not handed out yet.
    pub fn remaining(&self) -> usize {
        self.plan.frames.len() - self.next
    }

    /// Frames handed out so far.
    pub fn produced(&self) -> usize {
        self.next
    }

    pub fn plan(&self) -> &FramePlan {
        &self.plan
    }
}
