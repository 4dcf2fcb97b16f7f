use hound::{SampleFormat, WavReader};
use std::io::Read;
use std::path::Path;

#[derive(Clone, Debug, PartialEq)]
pub struct WavAudio {
    pub sample_rate_hz: u32,
    /// Mono samples in [-1, 1].
    pub samples: Vec<f32>,
}

#[derive(thiserror::Error, Debug)]
pub enum WavError {
    #[error("wav read failed: {0}")]
    Read(#[from] hound::Error),

    #[error("unsupported wav format: {bits}-bit {format:?}")]
    UnsupportedFormat { bits: u16, format: SampleFormat },
}

pub fn read_wav(path: impl AsRef<Path>) -> Result<WavAudio, WavError> {
    let reader = WavReader::open(path.as_ref())?;
    decode(reader)
}

pub fn read_wav_from<R: Read>(source: R) -> Result<WavAudio, WavError> {
    decode(WavReader::new(source)?)
}

fn decode<R: Read>(reader: WavReader<R>) -> Result<WavAudio, WavError> {
    let spec = reader.spec();
    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 8..=32) => {
            let scale = (1u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => return Err(WavError::UnsupportedFormat { bits, format }),
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    tracing::debug!(
        sample_rate_hz = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        samples = samples.len(),
        "wav decoded"
    );

    Ok(WavAudio {
        sample_rate_hz: spec.sample_rate,
        samples,
    })
}
