//! TOC (Table of Contents) byte, the first byte of every Opus packet.
//!
//! ```text
//!  0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+
//! | config  |s| c |
//! +-+-+-+-+-+-+-+-+
//! ```

use bitvec::prelude::*;

use super::config::{select, Config};

/// Code or type of packet. Primarily dictates the layout of frames inside a packet.
/// And optionally padding data if any (only for Code 3 packets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// One frame.
    Code0 = 0,
    /// Two frames.
    Code1 = 1,
    /// Two frames (variable length).
    Code2 = 2,
    /// Multiple frames (upto 120 ms total).
    ///
    /// Static length per frame if CBR else variable length and VBR.
    Code3 = 3,
}

impl From<u8> for Code {
    /// Only the two low bits are looked at.
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => Code::Code0,
            1 => Code::Code1,
            2 => Code::Code2,
            _ => Code::Code3,
        }
    }
}

/// Fields of a TOC byte. Every byte value is a valid TOC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Toc {
    /// Configuration number, 0-31.
    pub config: u8,
    /// Stereophonic or monophonic signal.
    pub is_stereo: bool,
    /// Frame count code.
    pub code: Code,
}

impl Toc {
    pub fn parse(byte: u8) -> Self {
        let bits = byte.view_bits::<Msb0>();

        Self {
            config: bits[..5].load_be::<u8>(),
            is_stereo: bits[5],
            code: bits[6..].load_be::<u8>().into(),
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = 0u8;
        let bits = byte.view_bits_mut::<Msb0>();

        bits[..5].store_be(self.config & 0x1f);
        bits.set(5, self.is_stereo);
        bits[6..].store_be(self.code as u8);

        byte
    }

    /// Mode, bandwidth and frame duration of the packet.
    pub fn mode(&self) -> Config {
        select(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::config::{Bandwidth, Mode};

    #[test]
    fn fields() {
        let toc = Toc::parse(0b11111_1_01);
        assert_eq!(toc.config, 31);
        assert!(toc.is_stereo);
        assert_eq!(toc.code, Code::Code1);

        let toc = Toc::parse(0b00011_0_11);
        assert_eq!(toc.config, 3);
        assert!(!toc.is_stereo);
        assert_eq!(toc.code, Code::Code3);
    }

    #[test]
    fn roundtrip_every_byte() {
        for byte in 0..=u8::MAX {
            assert_eq!(Toc::parse(byte).to_byte(), byte);
        }
    }

    #[test]
    fn mode_of_toc() {
        let config = Toc::parse(12 << 3).mode();
        assert_eq!(config.mode, Mode::Hybrid);
        assert_eq!(config.bandwidth, Bandwidth::SuperWide);
    }
}
