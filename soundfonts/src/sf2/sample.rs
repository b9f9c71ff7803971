use std::path::Path;

use hound::{SampleFormat, WavReader};

use super::Sf2WriteError;

/// PCM data of a WAV file, quantized to 16 bits and split per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavSample {
    pub sample_rate: u32,
    pub channels: Vec<Vec<i16>>,
}

fn quantize_int(value: i32, bits_per_sample: u16) -> i16 {
    if bits_per_sample > 16 {
        (value >> (bits_per_sample - 16)) as i16
    } else {
        (value << (16 - bits_per_sample)) as i16
    }
}

fn quantize_float(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Reads a mono or stereo WAV file.
pub fn load_wav(path: &Path) -> Result<WavSample, Sf2WriteError> {
    let read_error = |source: hound::Error| Sf2WriteError::FailedToReadSample {
        path: path.to_owned(),
        source,
    };

    let mut reader = WavReader::open(path).map_err(read_error)?;
    let spec = reader.spec();

    if !(1..=2).contains(&spec.channels) {
        return Err(Sf2WriteError::UnsupportedChannels {
            path: path.to_owned(),
            channels: spec.channels,
        });
    }

    let points: Vec<i16> = match spec.sample_format {
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| quantize_int(v, spec.bits_per_sample)))
            .collect::<Result<_, _>>(),
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(quantize_float))
            .collect::<Result<_, _>>(),
    }
    .map_err(read_error)?;

    let channel_count = spec.channels as usize;
    let mut channels = vec![Vec::with_capacity(points.len() / channel_count); channel_count];
    for (i, point) in points.into_iter().enumerate() {
        channels[i % channel_count].push(point);
    }

    Ok(WavSample {
        sample_rate: spec.sample_rate,
        channels,
    })
}
