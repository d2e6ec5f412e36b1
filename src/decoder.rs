//! Ogg Opus stream decoder.
//!
//! [`StreamDecoder::decode`] performs one step per call: it reads a page
//! header, parses a header packet, or hands one sub-frame of an audio packet
//! to the SILK or CELT engine. Input may be supplied in windows of any size;
//! a step that needs more bytes than given fails with
//! [`Error::ShortBuffer`] without consuming anything.
//!
//! ```text
//! AwaitingIdentification -> AwaitingComment -> CommentContinuation -> DecodingAudio
//!                                  \_____________________________________/
//! ```

use log::{debug, info, trace, warn};

use crate::engine::{FrameDecoder, FrameParams};
use crate::error::{Error, Result};
use crate::header::{CommentHeader, IdentificationHeader};
use crate::ogg::{find_sync, Page, PageFlags, Segment, SegmentTable, CAPTURE_PATTERN};
use crate::options::{DecoderOptions, HybridPolicy};
use crate::packet::config::{Mode, SAMPLE_RATE};
use crate::packet::parser::{FramePacker, FramePlan};

pub const BITS_PER_SAMPLE: u8 = 16;

/// Frame size assumed by the bitrate estimate (20 ms).
const NOMINAL_FRAME_SAMPLES: u64 = 960;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingIdentification,
    AwaitingComment,
    /// An embedded picture continues on the following pages.
    CommentContinuation,
    DecodingAudio,
}

/// Bytes of an embedded picture, located in the stream fed to the decoder.
/// Concatenating all ranges of a picture yields its base64 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureRange {
    pub offset: u64,
    pub len: usize,
}

#[derive(Debug, Default)]
struct CommentAccumulator {
    /// Declared picture bytes not located yet.
    remaining: usize,
    ranges: Vec<PictureRange>,
}

impl CommentAccumulator {
    fn record(&mut self, offset: u64, len: usize) {
        if len > 0 {
            self.ranges.push(PictureRange { offset, len });
        }
    }
}

/// Audio packet whose sub-frames are handed out over several calls.
#[derive(Debug)]
struct PacketCursor {
    packer: FramePacker,
    params: FrameParams,
    /// Packet bytes consumed so far.
    consumed: usize,
}

/// Decoder state of one logical Ogg Opus stream.
///
/// `S` decodes SILK frames and `C` CELT frames. Independent streams use
/// independent instances.
pub struct StreamDecoder<S, C> {
    silk: S,
    celt: C,
    options: DecoderOptions,

    state: State,
    segments: SegmentTable,
    page_flags: PageFlags,
    page_serial: u32,
    page_start: u64,
    page_payload: usize,
    page_lacing: usize,
    /// The bitrate estimate already covers the current page.
    page_rated: bool,
    serial: Option<u32>,
    eos_seen: bool,
    packet: Option<PacketCursor>,
    pending_skip: usize,
    position: u64,

    head: Option<IdentificationHeader>,
    vendor: Option<String>,
    picture: CommentAccumulator,
    picture_ready: Option<Vec<PictureRange>>,
    title: Option<String>,
    audio_start: Option<u64>,
    bitrate: u32,
    output_samples: usize,
    last_params: Option<FrameParams>,
    hybrid_warned: bool,
}

fn segment_bytes(segment: Segment, input: &[u8]) -> Result<&[u8]> {
    input
        .get(..segment.len)
        .ok_or(Error::short(segment.len, input.len()))
}

fn check_output(params: &FrameParams, out: &[i16]) -> Result<()> {
    if out.len() < params.output_len() {
        return Err(Error::OutputTooSmall {
            needed: params.output_len(),
            available: out.len(),
        });
    }
    Ok(())
}

impl<S: FrameDecoder, C: FrameDecoder> StreamDecoder<S, C> {
    pub fn new(silk: S, celt: C) -> Self {
        Self::with_options(silk, celt, DecoderOptions::default())
    }

    pub fn with_options(silk: S, celt: C, options: DecoderOptions) -> Self {
        Self {
            silk,
            celt,
            options,
            state: State::AwaitingIdentification,
            segments: SegmentTable::default(),
            page_flags: PageFlags::default(),
            page_serial: 0,
            page_start: 0,
            page_payload: 0,
            page_lacing: 0,
            page_rated: false,
            serial: None,
            eos_seen: false,
            packet: None,
            pending_skip: 0,
            position: 0,
            head: None,
            vendor: None,
            picture: CommentAccumulator::default(),
            picture_ready: None,
            title: None,
            audio_start: None,
            bitrate: 0,
            output_samples: 0,
            last_params: None,
            hybrid_warned: false,
        }
    }

    /// Runs one step on `input`, which must start at the first byte not yet
    /// consumed. Consumed bytes are subtracted from `bytes_left`; the next
    /// call continues right after them.
    ///
    /// Returns the samples per channel written to `out` (interleaved), 0 for
    /// steps that produce no audio. `out` must hold one frame of the stream's
    /// channel count, at most 2880 samples per channel.
    ///
    /// Errors consume as follows: `ShortBuffer`, `OutputTooSmall` and
    /// `SyncLost` nothing, `FrameLength` the whole packet, `Engine` and
    /// `UnsupportedMode` only their sub-frame, `Header` the header packet.
    pub fn decode(
        &mut self,
        input: &[u8],
        bytes_left: &mut usize,
        out: &mut [i16],
    ) -> Result<usize> {
        if input.is_empty() {
            return Err(Error::short(1, 0));
        }

        if self.pending_skip > 0 {
            self.skip(input, bytes_left);
            return Ok(0);
        }

        if self.packet.is_some() {
            return self.next_sub_frame(input, bytes_left, out);
        }

        let Some(segment) = self.segments.peek() else {
            self.read_page(input, bytes_left)?;
            return Ok(0);
        };

        match self.state {
            State::AwaitingIdentification => {
                self.read_identification(segment, input, bytes_left)?;
                Ok(0)
            }
            State::AwaitingComment => self.comment(segment, input, bytes_left, out),
            State::CommentContinuation => {
                self.picture_continuation(segment, input, bytes_left, out)
            }
            State::DecodingAudio => self.audio_packet(segment, input, bytes_left, out),
        }
    }

    /// Consumes everything before the next capture pattern in `input` and
    /// drops the page in progress. Without a capture pattern all but the
    /// last three bytes are consumed and [`Error::SyncLost`] is returned.
    pub fn resync(&mut self, input: &[u8], bytes_left: &mut usize) -> Result<()> {
        self.segments.clear();
        self.packet = None;
        self.pending_skip = 0;

        match find_sync(input) {
            Some(at) => {
                debug!("capture pattern found after {at} bytes");
                self.consume(at, bytes_left);
                Ok(())
            }
            None => {
                let keep = CAPTURE_PATTERN.len() - 1;
                self.consume(input.len().saturating_sub(keep), bytes_left);
                Err(Error::SyncLost)
            }
        }
    }

    /// Back to the state of a new instance. Engines are reset on the next
    /// identification header.
    pub fn reset(&mut self) {
        debug!("decoder reset at {}", self.position);
        self.state = State::AwaitingIdentification;
        self.segments.clear();
        self.page_flags = PageFlags::default();
        self.page_serial = 0;
        self.page_start = 0;
        self.page_payload = 0;
        self.page_lacing = 0;
        self.page_rated = false;
        self.serial = None;
        self.eos_seen = false;
        self.packet = None;
        self.pending_skip = 0;
        self.position = 0;
        self.head = None;
        self.vendor = None;
        self.picture = CommentAccumulator::default();
        self.picture_ready = None;
        self.title = None;
        self.audio_start = None;
        self.bitrate = 0;
        self.output_samples = 0;
        self.last_params = None;
        self.hybrid_warned = false;
    }

    fn consume(&mut self, n: usize, bytes_left: &mut usize) {
        self.position += n as u64;
        *bytes_left = bytes_left.saturating_sub(n);
    }

    fn skip(&mut self, input: &[u8], bytes_left: &mut usize) {
        let n = self.pending_skip.min(input.len()).min(self.options.skip_chunk);
        self.pending_skip -= n;
        self.consume(n, bytes_left);
        trace!("skipped {n} bytes, {} pending", self.pending_skip);
    }

    fn skip_segment(&mut self, segment: Segment) -> usize {
        self.segments.advance();
        self.pending_skip = segment.len;
        0
    }

    fn read_page(&mut self, input: &[u8], bytes_left: &mut usize) -> Result<()> {
        let page = Page::parse(input)?;
        trace!(
            "page {} at {}: {} packets, {} bytes",
            page.sequence,
            self.position,
            page.segments.len(),
            page.payload_len()
        );

        self.page_start = self.position;
        self.consume(page.header_len, bytes_left);

        if page.flags.first && self.eos_seen {
            info!(
                "chained stream {:#x} starts at {}",
                page.serial, self.page_start
            );
            self.restart_stream();
        }

        if let Some(serial) = self.serial {
            if serial != page.serial {
                warn!("skipping page of foreign stream {:#x}", page.serial);
                self.segments.clear();
                self.pending_skip = page.payload_len();
                return Ok(());
            }
        }

        self.page_payload = page.payload_len();
        self.page_lacing = page.lacing.len();
        self.page_rated = false;
        self.eos_seen = page.flags.last;
        self.page_flags = page.flags;
        self.page_serial = page.serial;
        self.segments = page.segments;

        Ok(())
    }

    fn restart_stream(&mut self) {
        self.state = State::AwaitingIdentification;
        self.serial = None;
        self.packet = None;
        self.picture = CommentAccumulator::default();
    }

    // ratio = 960 * 2 * lacing values / payload, bitrate = 16 * 2 * 48000 / ratio
    fn estimate_bitrate(&mut self) {
        self.page_rated = true;
        let payload = self.page_payload as u64;
        let lacing = self.page_lacing as u64;
        if payload == 0 || lacing == 0 {
            return;
        }

        let pcm_bits = BITS_PER_SAMPLE as u64 * 2 * SAMPLE_RATE as u64;
        self.bitrate = (pcm_bits * payload / (NOMINAL_FRAME_SAMPLES * 2 * lacing)) as u32;
    }

    fn read_identification(
        &mut self,
        segment: Segment,
        input: &[u8],
        bytes_left: &mut usize,
    ) -> Result<()> {
        let parsed = IdentificationHeader::parse(segment_bytes(segment, input)?);
        self.segments.advance();
        self.consume(segment.len, bytes_left);

        let head = parsed.map_err(|e| {
            warn!("no identification header: {e}");
            e
        })?;

        self.silk.reset(head.channels)?;
        self.celt.reset(head.channels)?;

        info!(
            "Opus stream {:#x}: {} channels, pre-skip {}, input rate {} Hz, gain {} dB",
            self.page_serial,
            head.channels,
            head.pre_skip,
            head.input_sample_rate,
            head.output_gain_db()
        );

        self.head = Some(head);
        self.serial = Some(self.page_serial);
        self.state = State::AwaitingComment;

        Ok(())
    }

    fn comment(
        &mut self,
        segment: Segment,
        input: &[u8],
        bytes_left: &mut usize,
        out: &mut [i16],
    ) -> Result<usize> {
        let Some(tags) = CommentHeader::parse(input, segment.len, self.position)? else {
            warn!("OpusTags header not found, decoding packet as audio");
            self.state = State::DecodingAudio;
            return self.audio_packet(segment, input, bytes_left, out);
        };

        self.segments.advance();
        self.consume(tags.parsed, bytes_left);
        self.pending_skip = segment.len - tags.parsed;

        if let Some(title) = tags.stream_title() {
            debug!("stream title: {title}");
            self.title = Some(title);
        }
        self.vendor = Some(tags.vendor);
        self.state = State::DecodingAudio;

        if let Some(picture) = tags.picture {
            self.picture = CommentAccumulator::default();
            self.picture.record(picture.offset, picture.len);
            self.picture.remaining = picture.remaining;

            if picture.remaining > 0 {
                self.state = State::CommentContinuation;
            } else {
                self.finish_picture();
            }
        }

        Ok(0)
    }

    fn picture_continuation(
        &mut self,
        segment: Segment,
        input: &[u8],
        bytes_left: &mut usize,
        out: &mut [i16],
    ) -> Result<usize> {
        if !(self.segments.at_first() && self.page_flags.continued) {
            warn!(
                "picture truncated, {} bytes missing",
                self.picture.remaining
            );
            self.picture = CommentAccumulator::default();
            self.state = State::DecodingAudio;
            return self.audio_packet(segment, input, bytes_left, out);
        }

        let len = segment.len.min(self.picture.remaining);
        self.picture.record(self.position, len);
        self.picture.remaining -= len;

        if self.picture.remaining == 0 {
            self.finish_picture();
            self.state = State::DecodingAudio;
        } else if segment.complete {
            warn!(
                "comment packet ended {} bytes short of its picture",
                self.picture.remaining
            );
            self.picture = CommentAccumulator::default();
            self.state = State::DecodingAudio;
        }

        Ok(self.skip_segment(segment))
    }

    fn finish_picture(&mut self) {
        let ranges = std::mem::take(&mut self.picture.ranges);
        if !ranges.is_empty() {
            debug!("picture located in {} ranges", ranges.len());
            self.picture_ready = Some(ranges);
        }
    }

    fn audio_packet(
        &mut self,
        segment: Segment,
        input: &[u8],
        bytes_left: &mut usize,
        out: &mut [i16],
    ) -> Result<usize> {
        if self.audio_start.is_none() {
            debug!("audio data starts at {}", self.position);
            self.audio_start = Some(self.position);
        }
        if !self.page_rated {
            self.estimate_bitrate();
        }

        if self.segments.at_first() && self.page_flags.continued {
            debug!(
                "skipping {} bytes continued from the previous page",
                segment.len
            );
            return Ok(self.skip_segment(segment));
        }
        if !segment.complete {
            warn!(
                "audio packet continues on the next page, {} bytes skipped",
                segment.len
            );
            return Ok(self.skip_segment(segment));
        }
        if segment.len == 0 {
            trace!("empty packet");
            self.segments.advance();
            return Ok(0);
        }

        let packet = segment_bytes(segment, input)?;
        let plan = match FramePlan::parse(packet) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("dropping malformed packet of {} bytes: {e}", segment.len);
                self.segments.advance();
                self.consume(segment.len, bytes_left);
                return Err(e.into());
            }
        };

        let channels = self.head.map_or(2, |head| head.channels);
        let params = FrameParams::new(&plan.config, channels, plan.toc.is_stereo);
        check_output(&params, out)?;

        trace!(
            "packet {:?}, {} frames, {} samples",
            plan.toc,
            plan.frames.len(),
            plan.samples()
        );
        self.segments.advance();
        self.packet = Some(PacketCursor {
            packer: FramePacker::new(plan),
            params,
            consumed: 0,
        });

        self.next_sub_frame(input, bytes_left, out)
    }

    fn next_sub_frame(
        &mut self,
        input: &[u8],
        bytes_left: &mut usize,
        out: &mut [i16],
    ) -> Result<usize> {
        let Some(cursor) = self.packet.as_mut() else {
            return Ok(0);
        };
        let Some((frame, more)) = cursor.packer.peek_frame() else {
            self.packet = None;
            return Ok(0);
        };

        let params = cursor.params;
        check_output(&params, out)?;

        // The last frame takes the padding with it.
        let start = frame.offset - cursor.consumed;
        let end = if more { frame.end() } else { cursor.packer.plan().packet_len };
        let span = end - cursor.consumed;
        if input.len() < span {
            return Err(Error::short(span, input.len()));
        }

        cursor.packer.next_frame();
        cursor.consumed = end;
        if !more {
            self.packet = None;
        }
        self.consume(span, bytes_left);
        self.last_params = Some(params);

        let samples = self.synthesise(&input[start..start + frame.len], &params, out)?;
        self.output_samples = samples;

        Ok(samples)
    }

    fn synthesise(
        &mut self,
        frame: &[u8],
        params: &FrameParams,
        out: &mut [i16],
    ) -> Result<usize> {
        let out = &mut out[..params.output_len()];

        let samples = match params.mode {
            Mode::SILK => self.silk.decode(frame, params, out)?,
            Mode::CELT => self.celt.decode(frame, params, out)?,
            Mode::Hybrid => match self.options.hybrid {
                HybridPolicy::Silence => {
                    if !self.hybrid_warned {
                        warn!("Hybrid mode not supported, substituting silence");
                        self.hybrid_warned = true;
                    }
                    out.fill(0);
                    params.frame_samples
                }
                HybridPolicy::Reject => return Err(Error::UnsupportedMode(Mode::Hybrid)),
            },
        };

        Ok(samples)
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Absolute offset of the next byte to consume.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// `true` while sub-frames of the current packet remain.
    pub fn has_pending_frames(&self) -> bool {
        self.packet.is_some()
    }

    /// Channel count of the stream, 0 before the identification header.
    pub fn channels(&self) -> u8 {
        self.head.map_or(0, |head| head.channels)
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    pub fn bits_per_sample(&self) -> u8 {
        BITS_PER_SAMPLE
    }

    /// Rough bitrate in bit/s from the latest page carrying audio, 0 if
    /// unknown.
    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Offset of the first audio packet.
    pub fn audio_data_start(&self) -> Option<u64> {
        self.audio_start
    }

    /// Samples per channel produced by the last decoded sub-frame.
    pub fn output_samples(&self) -> usize {
        self.output_samples
    }

    /// Parameters of the last sub-frame handed to an engine.
    pub fn frame_params(&self) -> Option<FrameParams> {
        self.last_params
    }

    pub fn identification(&self) -> Option<&IdentificationHeader> {
        self.head.as_ref()
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    /// The stream title, once after each comment header carrying one.
    pub fn take_stream_title(&mut self) -> Option<String> {
        self.title.take()
    }

    /// Ranges of a completely located picture, once.
    pub fn take_picture(&mut self) -> Option<Vec<PictureRange>> {
        self.picture_ready.take()
    }

    pub fn silk(&self) -> &S {
        &self.silk
    }

    pub fn celt(&self) -> &C {
        &self.celt
    }

    pub fn into_engines(self) -> (S, C) {
        (self.silk, self.celt)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::engine::EngineError;
    use crate::header::HeaderError;
    use crate::packet::parser::FrameLengthError;
    use crate::test_helper::{opus_head, opus_tags, page_bytes, raw_page, Recorder};

    type Decoder = StreamDecoder<Recorder, Recorder>;

    const BOS: u8 = 0x02;
    const EOS: u8 = 0x04;
    const CONTINUED: u8 = 0x01;

    fn decoder() -> Decoder {
        StreamDecoder::new(Recorder::default(), Recorder::default())
    }

    /// Runs the decoder over `stream` until it is consumed or a step makes
    /// no progress.
    fn run(dec: &mut Decoder, stream: &[u8]) -> Vec<Result<usize>> {
        let mut out = vec![0i16; 5760 * 2];
        let mut left = stream.len();
        let mut results = Vec::new();

        while left > 0 {
            let before = left;
            let result = dec.decode(&stream[stream.len() - left..], &mut left, &mut out);
            let stalled = before == left && result.is_err();
            results.push(result);
            if stalled {
                break;
            }
        }

        results
    }

    fn samples(results: &[Result<usize>]) -> Vec<usize> {
        results.iter().filter_map(|r| r.clone().ok()).filter(|&n| n > 0).collect()
    }

    fn head_page(serial: u32) -> Vec<u8> {
        page_bytes(BOS, 0, serial, 0, &[&opus_head(2, 0)])
    }

    #[test]
    fn head_then_audio_without_tags() {
        let mut stream = head_page(1);
        stream.extend(page_bytes(EOS, 960, 1, 1, &[&[0xfc, 1, 2, 3]]));

        let mut dec = decoder();
        let mut out = vec![0i16; 1920];
        let mut left = stream.len();
        let mut step = |dec: &mut Decoder, left: &mut usize| {
            let at = stream.len() - *left;
            dec.decode(&stream[at..], left, &mut out)
        };

        assert_eq!(step(&mut dec, &mut left), Ok(0));
        assert_eq!(dec.state(), State::AwaitingIdentification);
        assert_eq!(step(&mut dec, &mut left), Ok(0));
        assert_eq!(dec.state(), State::AwaitingComment);
        assert_eq!(dec.channels(), 2);
        assert_eq!(step(&mut dec, &mut left), Ok(0));
        assert_eq!(step(&mut dec, &mut left), Ok(960));
        assert_eq!(dec.state(), State::DecodingAudio);
        assert_eq!(left, 0);

        let celt = dec.celt();
        assert_eq!(celt.resets, vec![2]);
        assert_eq!(celt.calls.len(), 1);
        assert_eq!(celt.calls[0].frame, vec![1, 2, 3]);
        assert_eq!(celt.calls[0].params.channels, 2);
        assert!(celt.calls[0].params.is_stereo);
        assert!(dec.silk().calls.is_empty());
        assert_eq!(dec.output_samples(), 960);
        // Head page (47 bytes), then a 28-byte page header.
        assert_eq!(dec.audio_data_start(), Some(75));
        // 4 payload bytes over 1 lacing value.
        assert_eq!(dec.bitrate(), 3200);
        assert_eq!(dec.position(), stream.len() as u64);
    }

    #[test]
    fn tags_and_mixed_modes() {
        let mut stream = head_page(7);
        let tags = opus_tags("enc", &[b"ARTIST=A", b"title=B"]);
        stream.extend(page_bytes(0, 0, 7, 1, &[&tags]));
        let audio_at = stream.len() as u64;
        stream.extend(page_bytes(0, 1920, 7, 2, &[&[0x08, 9, 9], &[0xf8, 5]]));

        let mut dec = decoder();
        let results = run(&mut dec, &stream);
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(samples(&results), vec![960, 960]);

        assert_eq!(dec.vendor(), Some("enc"));
        assert_eq!(dec.take_stream_title().as_deref(), Some("A - B"));
        assert_eq!(dec.take_stream_title(), None);
        assert_eq!(dec.silk().calls[0].frame, vec![9, 9]);
        assert_eq!(dec.silk().calls[0].params.internal_rate, 8000);
        assert_eq!(dec.celt().calls[0].frame, vec![5]);
        assert_eq!(dec.audio_data_start(), Some(audio_at + 29));
        // 5 payload bytes over 2 lacing values.
        assert_eq!(dec.bitrate(), 2000);
        assert_eq!(dec.sample_rate(), 48_000);
        assert_eq!(dec.bits_per_sample(), 16);
    }

    #[test]
    fn code1_packet_is_split_over_calls() {
        let mut stream = head_page(1);
        stream.extend(page_bytes(0, 1920, 1, 1, &[&[0xf9, 1, 1, 2, 2]]));

        let mut dec = decoder();
        let mut out = vec![0i16; 1920];
        let mut left = stream.len();
        for _ in 0..3 {
            dec.decode(&stream[stream.len() - left..], &mut left, &mut out).unwrap();
        }

        // Only the TOC and the first frame are taken.
        let at = stream.len() - left;
        assert_eq!(dec.decode(&stream[at..], &mut left, &mut out), Ok(960));
        assert_eq!(stream.len() - left, at + 3);
        assert!(dec.has_pending_frames());
        assert!(out.iter().all(|&s| s == 1));

        assert_eq!(dec.decode(&stream[at + 3..], &mut left, &mut out), Ok(960));
        assert!(!dec.has_pending_frames());
        assert!(out.iter().all(|&s| s == 2));
        assert_eq!(left, 0);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(5)]
    #[case(64)]
    fn windowed_input_matches_whole_input(#[case] window: usize) {
        let mut stream = head_page(3);
        let tags = opus_tags("vendor string", &[b"title=T"]);
        stream.extend(page_bytes(0, 0, 3, 1, &[&tags]));
        let mixed: [&[u8]; 2] = [&[0xf9, 4, 4, 6, 6], &[0x08, 8, 8, 8]];
        stream.extend(page_bytes(0, 2880, 3, 2, &mixed));
        let code3: [u8; 11] = [0xfb, 0x42, 2, 7, 7, 7, 8, 8, 8, 0, 0];
        stream.extend(page_bytes(EOS, 3840, 3, 3, &[&code3]));

        let mut whole = decoder();
        let expected = samples(&run(&mut whole, &stream));

        let mut dec = decoder();
        let mut out = vec![0i16; 1920];
        let mut left = stream.len();
        let mut want = window;
        let mut produced = Vec::new();
        while left > 0 {
            let at = stream.len() - left;
            let end = (at + want).min(stream.len());
            let before = left;
            match dec.decode(&stream[at..end], &mut left, &mut out) {
                Ok(n) => {
                    if n > 0 {
                        produced.push(n);
                    }
                    want = window;
                }
                Err(Error::ShortBuffer { needed, .. }) => {
                    assert_eq!(left, before);
                    assert!(end < stream.len());
                    want = needed.max(want + 1);
                }
                Err(e) => panic!("unexpected {e}"),
            }
        }

        assert_eq!(produced, expected);
        assert_eq!(dec.celt().calls, whole.celt().calls);
        assert_eq!(dec.silk().calls, whole.silk().calls);
        assert_eq!(dec.take_stream_title().as_deref(), Some("T"));
    }

    fn picture_comment(value: &[u8]) -> Vec<u8> {
        let mut comment = b"METADATA_BLOCK_PICTURE=".to_vec();
        comment.extend_from_slice(value);
        comment
    }

    #[test]
    fn picture_across_pages() {
        let value = vec![b'Q'; 300];
        let comment = picture_comment(&value);
        let tags = opus_tags("v", &[b"title=T", comment.as_slice()]);
        assert_eq!(tags.len(), 355);

        let mut stream = head_page(1);
        stream.extend(raw_page(0, u64::MAX, 1, 1, &[255], &tags[..255]));
        let audio_at = stream.len() as u64;
        let mut payload = tags[255..].to_vec();
        payload.extend_from_slice(&[0xf8, 7]);
        stream.extend(raw_page(CONTINUED, 960, 1, 2, &[100, 2], &payload));

        let mut dec = decoder();
        let results = run(&mut dec, &stream);
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(samples(&results), vec![960]);

        let ranges = dec.take_picture().unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].len, 200);
        assert_eq!(
            ranges[1],
            PictureRange {
                offset: audio_at + 29,
                len: 100,
            }
        );
        let picture: Vec<u8> = ranges
            .iter()
            .flat_map(|r| &stream[r.offset as usize..r.offset as usize + r.len])
            .copied()
            .collect();
        assert_eq!(picture, value);
        assert_eq!(dec.take_picture(), None);
        assert_eq!(dec.take_stream_title().as_deref(), Some("T"));
        // After the page header and the picture's tail.
        assert_eq!(dec.audio_data_start(), Some(audio_at + 129));
        assert!(dec.bitrate() > 0);
    }

    #[test]
    fn picture_inside_one_page() {
        let value = vec![b'Z'; 40];
        let comment = picture_comment(&value);
        let tags = opus_tags("v", &[comment.as_slice(), b"title=ignored"]);

        let mut stream = head_page(1);
        stream.extend(page_bytes(0, 0, 1, 1, &[&tags]));
        stream.extend(page_bytes(0, 960, 1, 2, &[&[0xf8, 1]]));

        let mut dec = decoder();
        run(&mut dec, &stream);
        let ranges = dec.take_picture().unwrap();
        assert_eq!(ranges.len(), 1);
        let start = ranges[0].offset as usize;
        assert_eq!(&stream[start..start + ranges[0].len], value.as_slice());
        // Entries after the picture are not read.
        assert_eq!(dec.take_stream_title(), None);
        assert_eq!(dec.celt().calls.len(), 1);
    }

    #[test]
    fn truncated_picture_is_discarded() {
        let comment = picture_comment(&[b'Q'; 300]);
        let tags = opus_tags("v", &[comment.as_slice()]);

        let mut stream = head_page(1);
        stream.extend(raw_page(0, u64::MAX, 1, 1, &[255], &tags[..255]));
        stream.extend(page_bytes(0, 960, 1, 2, &[&[0xf8, 3]]));

        let mut dec = decoder();
        let results = run(&mut dec, &stream);
        assert_eq!(samples(&results), vec![960]);
        assert_eq!(dec.take_picture(), None);
        assert_eq!(dec.state(), State::DecodingAudio);
    }

    #[test]
    fn malformed_packet_is_dropped_whole() {
        let mut stream = head_page(1);
        stream.extend(page_bytes(0, 960, 1, 1, &[&[0xf9, 1, 2, 3], &[0xf8, 4]]));

        let mut dec = decoder();
        let results = run(&mut dec, &stream);
        let odd = Err(Error::FrameLength(FrameLengthError::OddLength(3)));
        assert!(results.contains(&odd));
        assert_eq!(samples(&results), vec![960]);
        assert_eq!(dec.celt().calls.len(), 1);
        assert_eq!(dec.position(), stream.len() as u64);
    }

    #[test]
    fn engine_error_only_costs_its_sub_frame() {
        let mut stream = head_page(1);
        stream.extend(page_bytes(0, 1920, 1, 1, &[&[0xf9, 1, 1, 2, 2]]));

        let celt = Recorder {
            fail_at: Some((0, -3)),
            ..Recorder::default()
        };
        let mut dec = StreamDecoder::new(Recorder::default(), celt);
        let results = run(&mut dec, &stream);

        assert!(results.contains(&Err(Error::Engine(EngineError(-3)))));
        assert_eq!(samples(&results), vec![960]);
        assert_eq!(dec.celt().calls[1].frame, vec![2, 2]);
        assert_eq!(dec.position(), stream.len() as u64);
    }

    #[rstest]
    #[case(HybridPolicy::Silence, Ok(480))]
    #[case(HybridPolicy::Reject, Err(Error::UnsupportedMode(Mode::Hybrid)))]
    fn hybrid_policy(#[case] policy: HybridPolicy, #[case] expected: Result<usize>) {
        let mut stream = head_page(1);
        stream.extend(page_bytes(0, 480, 1, 1, &[&[0x60, 1, 2, 3]]));

        let options = DecoderOptions::default().with_hybrid_policy(policy);
        let mut dec =
            StreamDecoder::with_options(Recorder::default(), Recorder::default(), options);
        let results = run(&mut dec, &stream);

        assert_eq!(results.last(), Some(&expected));
        assert!(dec.silk().calls.is_empty());
        assert!(dec.celt().calls.is_empty());
        assert_eq!(dec.position(), stream.len() as u64);
    }

    #[test]
    fn small_output_consumes_nothing() {
        let mut stream = head_page(1);
        stream.extend(page_bytes(0, 960, 1, 1, &[&[0xf8, 1]]));

        let mut dec = decoder();
        let mut left = stream.len();
        let mut big = vec![0i16; 1920];
        for _ in 0..3 {
            dec.decode(&stream[stream.len() - left..], &mut left, &mut big).unwrap();
        }

        let before = left;
        let mut small = [0i16; 10];
        assert_eq!(
            dec.decode(&stream[stream.len() - left..], &mut left, &mut small),
            Err(Error::OutputTooSmall {
                needed: 1920,
                available: 10,
            })
        );
        assert_eq!(left, before);
        let rest = &stream[stream.len() - left..];
        assert_eq!(dec.decode(rest, &mut left, &mut big), Ok(960));
    }

    #[test]
    fn missing_head_keeps_waiting() {
        let mut stream = page_bytes(BOS, 0, 1, 0, &[&[0xf8, 1]]);
        stream.extend(page_bytes(0, 0, 1, 1, &[&opus_head(1, 0)]));

        let mut dec = decoder();
        let results = run(&mut dec, &stream);
        assert_eq!(
            results[1],
            Err(Error::Header(HeaderError::MissingSignature))
        );
        assert_eq!(dec.state(), State::AwaitingComment);
        assert_eq!(dec.channels(), 1);
        assert!(dec.celt().calls.is_empty());
    }

    #[test]
    fn rejected_head() {
        let stream = page_bytes(BOS, 0, 1, 0, &[&opus_head(2, 1)]);

        let mut dec = decoder();
        let results = run(&mut dec, &stream);
        assert_eq!(
            results.last(),
            Some(&Err(Error::Header(HeaderError::ChannelMapping(1))))
        );
        assert_eq!(dec.state(), State::AwaitingIdentification);
        assert!(dec.celt().resets.is_empty());
    }

    #[test]
    fn resync_skips_garbage() {
        let mut stream = b"junk".to_vec();
        stream.extend(head_page(1));

        let mut dec = decoder();
        let mut left = stream.len();
        let mut out = [0i16; 4];
        assert_eq!(
            dec.decode(&stream, &mut left, &mut out),
            Err(Error::SyncLost)
        );
        assert_eq!(left, stream.len());

        assert_eq!(dec.resync(&stream, &mut left), Ok(()));
        assert_eq!(left, stream.len() - 4);
        assert_eq!(dec.decode(&stream[4..], &mut left, &mut out), Ok(0));
    }

    #[test]
    fn resync_without_pattern_keeps_tail() {
        let mut dec = decoder();
        let mut left = 100;
        assert_eq!(dec.resync(b"abcdefgOgg", &mut left), Err(Error::SyncLost));
        assert_eq!(left, 93);
        assert_eq!(dec.position(), 7);
    }

    #[test]
    fn foreign_pages_are_skipped() {
        let mut stream = head_page(1);
        stream.extend(page_bytes(0, 960, 2, 0, &[&[0xf8, 9]]));
        stream.extend(page_bytes(0, 960, 1, 1, &[&[0xf8, 1]]));

        let options = DecoderOptions::default().with_skip_chunk(1);
        let mut dec =
            StreamDecoder::with_options(Recorder::default(), Recorder::default(), options);
        let results = run(&mut dec, &stream);
        assert_eq!(samples(&results), vec![960]);
        assert_eq!(dec.celt().calls[0].frame, vec![1]);
    }

    #[test]
    fn chained_stream_restarts_headers() {
        let mut stream = head_page(1);
        stream.extend(page_bytes(EOS, 960, 1, 1, &[&[0xf8, 1]]));
        stream.extend(page_bytes(BOS, 0, 2, 0, &[&opus_head(1, 0)]));
        stream.extend(page_bytes(0, 960, 2, 1, &[&[0xf8, 2]]));

        let mut dec = decoder();
        let results = run(&mut dec, &stream);
        assert_eq!(samples(&results), vec![960, 960]);
        assert_eq!(dec.celt().resets, vec![2, 1]);
        assert_eq!(dec.channels(), 1);
        assert_eq!(dec.celt().calls[1].params.channels, 1);
    }

    #[test]
    fn continued_and_unfinished_packets_are_skipped() {
        let mut stream = head_page(1);
        stream.extend(page_bytes(0, 0, 1, 1, &[&opus_tags("v", &[])]));
        let mut payload = vec![0xf8; 10];
        payload.extend_from_slice(&[0xf8, 5]);
        payload.extend(vec![0xf8; 255]);
        stream.extend(raw_page(CONTINUED, 960, 1, 2, &[10, 2, 255], &payload));
        stream.extend(page_bytes(0, 1920, 1, 3, &[&[0xf8, 6]]));

        let mut dec = decoder();
        let results = run(&mut dec, &stream);
        assert!(results.iter().all(Result::is_ok));
        let frames: Vec<_> = dec.celt().calls.iter().map(|c| c.frame.clone()).collect();
        assert_eq!(frames, vec![vec![5], vec![6]]);
    }

    #[test]
    fn reset_forgets_the_stream() {
        let mut stream = head_page(1);
        stream.extend(page_bytes(0, 960, 1, 1, &[&[0xf8, 1]]));

        let mut dec = decoder();
        run(&mut dec, &stream);
        dec.reset();
        assert_eq!(dec.state(), State::AwaitingIdentification);
        assert_eq!(dec.position(), 0);
        assert_eq!(dec.channels(), 0);

        run(&mut dec, &stream);
        assert_eq!(dec.celt().calls.len(), 2);
    }
}
