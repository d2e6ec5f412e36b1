//! Contract with the low-level SILK and CELT decode engines.
//!
//! The stream decoder only frames packets; sample synthesis happens behind
//! [`FrameDecoder`]. One implementation decodes SILK frames, another CELT
//! frames, and the decoder picks one per packet from the TOC configuration.

use thiserror::Error;

use crate::packet::config::{Bandwidth, Config, Mode};

/// Error code reported by an engine. Never reinterpreted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("decode engine failed with code {0}")]
pub struct EngineError(pub i32);

/// Parameters for decoding one sub-frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub mode: Mode,
    pub bandwidth: Bandwidth,
    /// Rate the engine runs at internally (SILK: 8/12/16 kHz, CELT: 48 kHz).
    pub internal_rate: u32,
    /// First CELT band to decode, non-zero only for Hybrid frames.
    pub start_band: u8,
    /// Last CELT band to decode (exclusive).
    pub end_band: u8,
    /// Channel count of the stream, i.e. of the interleaved output.
    pub channels: u8,
    /// Stereo flag of the packet's TOC byte.
    pub is_stereo: bool,
    /// Samples per channel requested at 48 kHz.
    pub frame_samples: usize,
    /// SILK payload duration in ms, never below 10.
    pub payload_ms: u16,
}

impl FrameParams {
    pub fn new(config: &Config, channels: u8, is_stereo: bool) -> Self {
        Self {
            mode: config.mode,
            bandwidth: config.bandwidth,
            internal_rate: config.internal_rate(),
            start_band: config.start_band(),
            end_band: config.end_band(),
            channels,
            is_stereo,
            frame_samples: config.frame_samples,
            payload_ms: config.payload_ms(),
        }
    }

    /// Interleaved `i16` slots one sub-frame occupies in the output.
    pub fn output_len(&self) -> usize {
        self.frame_samples * self.channels as usize
    }
}

/// A SILK or CELT engine: decodes `frame` into at most
/// `params.frame_samples` interleaved samples per channel.
pub trait FrameDecoder {
    /// (Re)initialises the engine for a stream with `channels` channels.
    fn reset(&mut self, channels: u8) -> Result<(), EngineError>;

    /// Returns the number of samples per channel written to `out`.
    fn decode(
        &mut self,
        frame: &[u8],
        params: &FrameParams,
        out: &mut [i16],
    ) -> Result<usize, EngineError>;
}

impl<D: FrameDecoder + ?Sized> FrameDecoder for &mut D {
    fn reset(&mut self, channels: u8) -> Result<(), EngineError> {
        (**self).reset(channels)
    }

    fn decode(
        &mut self,
        frame: &[u8],
        params: &FrameParams,
        out: &mut [i16],
    ) -> Result<usize, EngineError> {
        (**self).decode(frame, params, out)
    }
}

impl<D: FrameDecoder + ?Sized> FrameDecoder for Box<D> {
    fn reset(&mut self, channels: u8) -> Result<(), EngineError> {
        (**self).reset(channels)
    }

    fn decode(
        &mut self,
        frame: &[u8],
        params: &FrameParams,
        out: &mut [i16],
    ) -> Result<usize, EngineError> {
        (**self).decode(frame, params, out)
    }
}
