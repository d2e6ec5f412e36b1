use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::warn;
use oggopus_frames::{DecoderOptions, Error, HybridPolicy, StreamDecoder};

mod utils;

use utils::Tally;

/// Prints the frame layout of an Ogg Opus file.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Ogg Opus file to inspect.
    input: PathBuf,
    /// Bytes offered to the decoder per call.
    #[clap(short, long, default_value_t = 4096)]
    chunk: usize,
    /// Stop at the first Hybrid packet instead of counting it as silence.
    #[clap(long)]
    reject_hybrid: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env("OPUSSTAT_LOG")
        .format_timestamp(None)
        .init();
    let args = Args::parse();

    let data = fs::read(&args.input)
        .with_context(|| format!("cannot read {}", args.input.display()))?;

    let policy = if args.reject_hybrid {
        HybridPolicy::Reject
    } else {
        HybridPolicy::Silence
    };
    let options = DecoderOptions::default().with_hybrid_policy(policy);
    let mut decoder =
        StreamDecoder::with_options(Tally::default(), Tally::default(), options);

    let chunk = args.chunk.max(1);
    let mut window = chunk;
    let mut out = vec![0i16; 2880 * 2];
    let mut left = data.len();
    let mut last_params = None;
    let mut num_same_conf = 0;

    while left > 0 {
        let at = data.len() - left;
        let end = (at + window).min(data.len());

        match decoder.decode(&data[at..end], &mut left, &mut out) {
            Ok(0) => window = chunk,
            Ok(_) => {
                window = chunk;
                let params = decoder.frame_params();

                if params != last_params {
                    if let Some(p) = params {
                        println!(
                            "\rmode={:?} bwidth={:?} dur={}ms ch={} stereo?={}",
                            p.mode,
                            p.bandwidth,
                            p.frame_samples as f32 / 48.0,
                            p.channels,
                            p.is_stereo
                        );
                    }
                    num_same_conf = 0;
                } else {
                    num_same_conf += 1;
                    print!("  \r... {}", num_same_conf);
                    std::io::stdout().flush()?;
                }

                last_params = params;
            }
            Err(Error::ShortBuffer { needed, .. }) => {
                if end == data.len() {
                    warn!("stream ends inside a page, {left} bytes unused");
                    break;
                }
                window = needed.max(window + 1);
            }
            Err(Error::SyncLost) => {
                if decoder.resync(&data[at..], &mut left).is_err() {
                    warn!("no further pages after offset {at}");
                    break;
                }
            }
            Err(Error::UnsupportedMode(mode)) => bail!("{mode:?} packet at offset {at}"),
            Err(e) => warn!("offset {at}: {e}"),
        }
    }
    println!();

    println!(
        "channels={} rate={} bitrate~{} audio@{:?} vendor={:?}",
        decoder.channels(),
        decoder.sample_rate(),
        decoder.bitrate(),
        decoder.audio_data_start(),
        decoder.vendor().unwrap_or("?")
    );
    if let Some(title) = decoder.take_stream_title() {
        println!("title={title}");
    }
    if let Some(ranges) = decoder.take_picture() {
        let total: usize = ranges.iter().map(|r| r.len).sum();
        println!("picture={total} bytes in {} ranges", ranges.len());
    }

    let (silk, celt) = decoder.into_engines();
    println!("silk frames={} bytes={}", silk.frames, silk.bytes);
    println!("celt frames={} bytes={}", celt.frames, celt.bytes);

    Ok(())
}
