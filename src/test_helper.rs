//! Builders for synthetic Ogg Opus streams and a recording engine.

use crate::engine::{EngineError, FrameDecoder, FrameParams};
use crate::header::{OPUS_HEAD, OPUS_TAGS};

/// Lacing values for one complete packet.
pub fn lacing_of(len: usize) -> Vec<u8> {
    let mut lacing = vec![255; len / 255];
    lacing.push((len % 255) as u8);
    lacing
}

/// A page from raw lacing values and payload.
pub fn raw_page(
    header_type: u8,
    granule: u64,
    serial: u32,
    sequence: u32,
    lacing: &[u8],
    payload: &[u8],
) -> Vec<u8> {
    let mut page = b"OggS".to_vec();
    page.push(0);
    page.push(header_type);
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&serial.to_le_bytes());
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&0u32.to_le_bytes());
    page.push(lacing.len() as u8);
    page.extend_from_slice(lacing);
    page.extend_from_slice(payload);
    page
}

/// A page holding complete `packets`.
pub fn page_bytes(
    header_type: u8,
    granule: u64,
    serial: u32,
    sequence: u32,
    packets: &[&[u8]],
) -> Vec<u8> {
    let lacing: Vec<u8> = packets.iter().flat_map(|p| lacing_of(p.len())).collect();
    let payload: Vec<u8> = packets.concat();
    raw_page(header_type, granule, serial, sequence, &lacing, &payload)
}

pub fn opus_head(channels: u8, mapping_family: u8) -> Vec<u8> {
    let mut packet = OPUS_HEAD.to_vec();
    packet.push(1);
    packet.push(channels);
    packet.extend_from_slice(&0u16.to_le_bytes());
    packet.extend_from_slice(&48_000u32.to_le_bytes());
    packet.extend_from_slice(&0i16.to_le_bytes());
    packet.push(mapping_family);
    packet
}

pub fn opus_tags(vendor: &str, comments: &[&[u8]]) -> Vec<u8> {
    let mut packet = OPUS_TAGS.to_vec();
    packet.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    packet.extend_from_slice(vendor.as_bytes());
    packet.extend_from_slice(&(comments.len() as u32).to_le_bytes());
    for comment in comments {
        packet.extend_from_slice(&(comment.len() as u32).to_le_bytes());
        packet.extend_from_slice(comment);
    }
    packet
}

/// One `FrameDecoder::decode` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub frame: Vec<u8>,
    pub params: FrameParams,
}

/// Records every call and writes the frame's first byte as every sample.
#[derive(Debug, Default)]
pub struct Recorder {
    pub resets: Vec<u8>,
    pub calls: Vec<Call>,
    /// Fail the call with this index.
    pub fail_at: Option<(usize, i32)>,
}

impl FrameDecoder for Recorder {
    fn reset(&mut self, channels: u8) -> Result<(), EngineError> {
        self.resets.push(channels);
        Ok(())
    }

    fn decode(
        &mut self,
        frame: &[u8],
        params: &FrameParams,
        out: &mut [i16],
    ) -> Result<usize, EngineError> {
        let index = self.calls.len();
        self.calls.push(Call {
            frame: frame.to_vec(),
            params: *params,
        });
        if let Some((at, code)) = self.fail_at {
            if at == index {
                return Err(EngineError(code));
            }
        }
        let fill = frame.first().copied().unwrap_or(0) as i16;
        out[..params.output_len()].fill(fill);
        Ok(params.frame_samples)
    }
}
