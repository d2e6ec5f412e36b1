//! Runtime configuration of a [`StreamDecoder`](crate::decoder::StreamDecoder).

/// What to do with Hybrid (SILK+CELT) packets, which are not synthesised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HybridPolicy {
    /// Emit silence of the frame's duration.
    #[default]
    Silence,
    /// Fail each Hybrid sub-frame with `Error::UnsupportedMode`.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    pub hybrid: HybridPolicy,
    /// Largest number of metadata bytes skipped by one decode call.
    pub skip_chunk: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            hybrid: HybridPolicy::Silence,
            skip_chunk: 8192,
        }
    }
}

impl DecoderOptions {
    pub fn with_hybrid_policy(mut self, hybrid: HybridPolicy) -> Self {
        self.hybrid = hybrid;
        self
    }

    /// A chunk of 0 is treated as 1.
    pub fn with_skip_chunk(mut self, skip_chunk: usize) -> Self {
        self.skip_chunk = skip_chunk.max(1);
        self
    }
}
