use std::{fs::File, path::Path};

use anyhow::{anyhow, Context};
use hound::WavWriter;
use ndarray::Array2;
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::{
    error::Result,
    types::{AudioBuffer, AudioData, SampleEncoding},
};

pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path: &Path = path.as_ref();

    let file: File =
        File::open(path).with_context(|| format!("Failed to open audio file: {:?}", path))?;

    let mss: MediaSourceStream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint: Hint = Hint::new();

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format.default_track().context("No default track found")?;
    let track_id = track.id;

    let mut sample_rate: u32 = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels: u16 = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet is skipped, the rest of the stream is still usable.
            Err(SymphoniaError::DecodeError(msg)) => {
                debug!(path = %path.display(), "skipping undecodable packet: {msg}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        samples.extend_from_slice(buffer.samples());
    }

    if sample_rate == 0 || channels == 0 {
        return Err(anyhow!("Unknown sample rate or channel layout in {:?}", path).into());
    }

    debug!(
        path = %path.display(),
        sample_rate,
        channels,
        samples = samples.len(),
        "read audio"
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
    })
}

pub fn write_audio<P: AsRef<Path>>(path: P, audio: &AudioData, encoding: SampleEncoding) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: match encoding {
            SampleEncoding::Pcm16 => 16,
            SampleEncoding::Float32 => 32,
        },
        sample_format: match encoding {
            SampleEncoding::Pcm16 => hound::SampleFormat::Int,
            SampleEncoding::Float32 => hound::SampleFormat::Float,
        },
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    match encoding {
        SampleEncoding::Pcm16 => {
            for sample in &audio.samples {
                let s = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                writer.write_sample(s)?;
            }
        }
        SampleEncoding::Float32 => {
            for &sample in &audio.samples {
                writer.write_sample(sample)?;
            }
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Builds the 2-channel `[frames, 2]` buffer the chain works on.
/// Mono is duplicated into both channels; more than two channels is rejected.
pub fn to_stereo_buffer(audio: &AudioData) -> Result<AudioBuffer> {
    let samples = &audio.samples;
    let arr = match audio.channels {
        1 => Array2::from_shape_fn((samples.len(), 2), |(i, _)| samples[i]),
        2 => {
            let frames = samples.len() / 2;
            Array2::from_shape_vec((frames, 2), samples[..frames * 2].to_vec())
                .map_err(|e| anyhow!("bad stereo layout: {e}"))?
        }
        n => return Err(anyhow!("Unsupported channel count {n}, expected mono or stereo").into()),
    };
    Ok(AudioBuffer::new(arr, audio.sample_rate))
}

/// Flattens a `[frames, channels]` buffer back to interleaved samples.
pub fn to_interleaved(buffer: &AudioBuffer) -> AudioData {
    AudioData {
        samples: buffer.samples.iter().copied().collect(),
        sample_rate: buffer.sample_rate,
        channels: buffer.channels() as u16,
    }
}
