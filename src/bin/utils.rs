use oggopus_frames::{EngineError, FrameDecoder, FrameParams};

/// Stand-in engine that only counts what it is given and outputs silence.
#[derive(Debug, Default)]
pub struct Tally {
    pub channels: u8,
    pub frames: usize,
    pub bytes: usize,
}

impl FrameDecoder for Tally {
    fn reset(&mut self, channels: u8) -> Result<(), EngineError> {
        self.channels = channels;
        Ok(())
    }

    fn decode(
        &mut self,
        frame: &[u8],
        params: &FrameParams,
        out: &mut [i16],
    ) -> Result<usize, EngineError> {
        self.frames += 1;
        self.bytes += frame.len();
        out.fill(0);
        Ok(params.frame_samples)
    }
}
