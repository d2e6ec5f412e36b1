use nom::bytes::complete::tag;
use nom::number::complete::{le_i16, le_u16, le_u32, le_u8};
use nom::IResult;

use super::{HeaderError, OPUS_HEAD};

/// Mandatory part of the identification header.
pub const HEAD_LEN: usize = 19;

/// `OpusHead` packet.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      'O'      |      'p'      |      'u'      |      's'      |
/// |      'H'      |      'e'      |      'a'      |      'd'      |
/// |  Version = 1  | Channel Count |           Pre-skip            |
/// |                     Input Sample Rate (Hz)                    |
/// |   Output Gain (Q7.8 in dB)    | Mapping Family|               :
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentificationHeader {
    pub version: u8,
    pub channels: u8,
    /// Samples at 48 kHz to discard from the start of the decoded output.
    pub pre_skip: u16,
    /// Rate of the encoder's input. Informational only.
    pub input_sample_rate: u32,
    /// Q7.8 fixed point dB. Stored, not applied.
    pub output_gain: i16,
    pub mapping_family: u8,
}

fn fields(input: &[u8]) -> IResult<&[u8], IdentificationHeader> {
    let (input, _) = tag(&OPUS_HEAD[..])(input)?;
    let (input, version) = le_u8(input)?;
    let (input, channels) = le_u8(input)?;
    let (input, pre_skip) = le_u16(input)?;
    let (input, input_sample_rate) = le_u32(input)?;
    let (input, output_gain) = le_i16(input)?;
    let (input, mapping_family) = le_u8(input)?;

    Ok((
        input,
        IdentificationHeader {
            version,
            channels,
            pre_skip,
            input_sample_rate,
            output_gain,
            mapping_family,
        },
    ))
}

impl IdentificationHeader {
    pub fn parse(packet: &[u8]) -> Result<Self, HeaderError> {
        if !packet.starts_with(OPUS_HEAD) {
            return Err(HeaderError::MissingSignature);
        }

        let (_, head) = fields(packet).map_err(|_| HeaderError::Truncated(packet.len()))?;

        // Minor version changes (lower nibble) stay backwards compatible.
        if head.version >> 4 != 0 {
            return Err(HeaderError::UnsupportedVersion(head.version));
        }
        if head.channels == 0 || head.channels > 2 {
            return Err(HeaderError::ChannelCount(head.channels));
        }
        if head.mapping_family != 0 {
            return Err(HeaderError::ChannelMapping(head.mapping_family));
        }

        Ok(head)
    }

    /// Output gain in dB.
    pub fn output_gain_db(&self) -> f32 {
        self.output_gain as f32 / 256.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::opus_head;
    use rstest::rstest;

    #[test]
    fn fields_are_little_endian() {
        let mut packet = opus_head(2, 0);
        packet[10..12].copy_from_slice(&312u16.to_le_bytes());
        packet[12..16].copy_from_slice(&44_100u32.to_le_bytes());
        packet[16..18].copy_from_slice(&(-384i16).to_le_bytes());

        let head = IdentificationHeader::parse(&packet).unwrap();
        assert_eq!(head.version, 1);
        assert_eq!(head.channels, 2);
        assert_eq!(head.pre_skip, 312);
        assert_eq!(head.input_sample_rate, 44_100);
        assert_eq!(head.output_gain, -384);
        assert_eq!(head.output_gain_db(), -1.5);
    }

    #[rstest]
    #[case(0, 0, HeaderError::ChannelCount(0))]
    #[case(3, 0, HeaderError::ChannelCount(3))]
    #[case(2, 1, HeaderError::ChannelMapping(1))]
    #[case(1, 255, HeaderError::ChannelMapping(255))]
    fn unsupported_layouts(#[case] channels: u8, #[case] family: u8, #[case] err: HeaderError) {
        let packet = opus_head(channels, family);
        assert_eq!(IdentificationHeader::parse(&packet), Err(err));
    }

    #[test]
    fn version_and_length() {
        let mut packet = opus_head(1, 0);
        packet[8] = 0x10;
        assert_eq!(
            IdentificationHeader::parse(&packet),
            Err(HeaderError::UnsupportedVersion(0x10))
        );

        assert_eq!(
            IdentificationHeader::parse(&opus_head(1, 0)[..12]),
            Err(HeaderError::Truncated(12))
        );
        assert_eq!(
            IdentificationHeader::parse(b"OpusTags........."),
            Err(HeaderError::MissingSignature)
        );
    }
}
