//! Mode selection from the `config` field of the TOC byte.
//! The configuration picks the operating mode, the audio bandwidth and the
//! frame duration shared by every frame of a packet.
//!
//! See [RFC 6716, Section 3.1][1].
//!
//! [1]: (https://datatracker.ietf.org/doc/html/rfc6716#section-3.1)

use log::warn;

/// Output rate of every Opus decoder, in Hz.
pub const SAMPLE_RATE: u32 = 48_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Operating mode used for packet coding.
pub enum Mode {
    /// [SILK][2]-only mode for use in low bitrate with wide-band or
    /// more narrow bandwidth connections.
    ///
    /// [2]: https://en.wikipedia.org/wiki/SILK
    SILK,
    /// [CELT][3]-only mode for very low delay speech transmission as well
    /// as music transmission narrow-band to full-band.
    ///
    /// [3]: https://en.wikipedia.org/wiki/CELT
    CELT,
    /// Hybrid (SILK+CELT) mode for super-wide-band or full-band speech at
    /// medium bitrates.
    Hybrid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Bandwidth of the transmitted signal.
pub enum Bandwidth {
    /// 0-4 kHz (8 kHz samplerate).
    Narrow,
    /// 0-6 kHz (12 kHz samplerate).
    Medium,
    /// 0-8 kHz (16 kHz samplerate).
    Wide,
    /// 0-12 kHz (24 kHz samplerate).
    SuperWide,
    /// 0-20 kHz (48 kHz samplerate).
    ///
    /// Although the [sampling theorem][4] allows a bandwidth as large as half
    /// the sampling rate, Opus never codes audio above 20 kHz, as that is
    /// the generally accepted upper limit of human hearing.
    ///
    /// [4]: https://en.wikipedia.org/wiki/Nyquist%E2%80%93Shannon_sampling_theorem
    FullBand,
}

impl Bandwidth {
    /// Effective sample rate of the band.
    pub const fn sample_rate(self) -> u32 {
        match self {
            Bandwidth::Narrow => 8_000,
            Bandwidth::Medium => 12_000,
            Bandwidth::Wide => 16_000,
            Bandwidth::SuperWide => 24_000,
            Bandwidth::FullBand => 48_000,
        }
    }
}

/// TOC configuration field.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    pub mode: Mode,
    pub bandwidth: Bandwidth,
    /// Samples per channel in one frame at 48 kHz: 120/240/480/960/1920/2880
    /// for 2.5/5/10/20/40/60 ms frames.
    pub frame_samples: usize,
}

impl Config {
    /// Frame duration in microseconds.
    pub const fn duration_us(&self) -> u32 {
        (self.frame_samples as u32 * 1000) / (SAMPLE_RATE / 1000)
    }

    /// Rate the engine of this mode runs at. SILK follows the bandwidth,
    /// the SILK layer of Hybrid runs wide-band and CELT always runs at 48 kHz.
    pub const fn internal_rate(&self) -> u32 {
        match self.mode {
            Mode::SILK => self.bandwidth.sample_rate(),
            Mode::Hybrid => 16_000,
            Mode::CELT => SAMPLE_RATE,
        }
    }

    /// One past the last CELT band coded at this bandwidth, 0 for SILK.
    pub const fn end_band(&self) -> u8 {
        if let Mode::SILK = self.mode {
            return 0;
        }
        match self.bandwidth {
            Bandwidth::Narrow => 13,
            Bandwidth::Medium | Bandwidth::Wide => 17,
            Bandwidth::SuperWide => 19,
            Bandwidth::FullBand => 21,
        }
    }

    /// Hybrid frames leave the bands below 8 kHz to SILK.
    pub const fn start_band(&self) -> u8 {
        match self.mode {
            Mode::Hybrid => 17,
            _ => 0,
        }
    }

    /// SILK payload duration, rounded down to whole ms and never below 10.
    pub const fn payload_ms(&self) -> u16 {
        let ms = (self.frame_samples as u32 * 1000 / SAMPLE_RATE) as u16;
        if ms < 10 {
            10
        } else {
            ms
        }
    }
}

impl Default for Config {
    /// Default according to the reference implementation (libopus).
    ///
    /// - Full-band CELT-mode.
    /// - 20 ms frames.
    fn default() -> Self {
        Self {
            mode: Mode::CELT,
            bandwidth: Bandwidth::FullBand,
            frame_samples: 960,
        }
    }
}

/// Looks up the configuration number of a TOC byte.
///
/// Every value a TOC byte can carry (0-31) is in the table. Anything else
/// falls back to [`Config::default`].
pub fn select(config_number: u8) -> Config {
    match OPUS_CONFIG_TABLE.get(config_number as usize) {
        Some(config) => *config,
        None => {
            warn!(
                "unknown configuration {config_number}, assuming full-band CELT"
            );
            Config::default()
        }
    }
}

const fn cfg(mode: Mode, bandwidth: Bandwidth, frame_samples: usize) -> Config {
    Config {
        mode,
        bandwidth,
        frame_samples,
    }
}

/// Possible configurations according to the `config` field of the TOC byte.
pub static OPUS_CONFIG_TABLE: [Config; 32] = [
    cfg(Mode::SILK, Bandwidth::Narrow, 480),
    cfg(Mode::SILK, Bandwidth::Narrow, 960),
    cfg(Mode::SILK, Bandwidth::Narrow, 1920),
    cfg(Mode::SILK, Bandwidth::Narrow, 2880),

    cfg(Mode::SILK, Bandwidth::Medium, 480),
    cfg(Mode::SILK, Bandwidth::Medium, 960),
    cfg(Mode::SILK, Bandwidth::Medium, 1920),
    cfg(Mode::SILK, Bandwidth::Medium, 2880),

    cfg(Mode::SILK, Bandwidth::Wide, 480),
    cfg(Mode::SILK, Bandwidth::Wide, 960),
    cfg(Mode::SILK, Bandwidth::Wide, 1920),
    cfg(Mode::SILK, Bandwidth::Wide, 2880),

    cfg(Mode::Hybrid, Bandwidth::SuperWide, 480),
    cfg(Mode::Hybrid, Bandwidth::SuperWide, 960),

    cfg(Mode::Hybrid, Bandwidth::FullBand, 480),
    cfg(Mode::Hybrid, Bandwidth::FullBand, 960),

    cfg(Mode::CELT, Bandwidth::Narrow, 120),
    cfg(Mode::CELT, Bandwidth::Narrow, 240),
    cfg(Mode::CELT, Bandwidth::Narrow, 480),
    cfg(Mode::CELT, Bandwidth::Narrow, 960),

    cfg(Mode::CELT, Bandwidth::Wide, 120),
    cfg(Mode::CELT, Bandwidth::Wide, 240),
    cfg(Mode::CELT, Bandwidth::Wide, 480),
    cfg(Mode::CELT, Bandwidth::Wide, 960),

    cfg(Mode::CELT, Bandwidth::SuperWide, 120),
    cfg(Mode::CELT, Bandwidth::SuperWide, 240),
    cfg(Mode::CELT, Bandwidth::SuperWide, 480),
    cfg(Mode::CELT, Bandwidth::SuperWide, 960),

    cfg(Mode::CELT, Bandwidth::FullBand, 120),
    cfg(Mode::CELT, Bandwidth::FullBand, 240),
    cfg(Mode::CELT, Bandwidth::FullBand, 480),
    cfg(Mode::CELT, Bandwidth::FullBand, 960),
];
