mod wav;

use crate::config::{AnalysisWindow, DEFAULT_WINDOW_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use wav::{read_wav, read_wav_from, WavAudio, WavError};

/// Shortest lag tried by the pitch estimator (1.2 kHz at 24 kHz).
pub const MIN_PITCH_PERIOD: usize = 20;

/// Audio features for one analysis window.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioChunk {
    /// Offset of the window from the start of the buffer.
    pub timestamp: Duration,
    pub duration: Duration,
    /// RMS of the window.
    pub amplitude: f32,
    /// Estimated fundamental in Hz, 0 when nothing periodic was found.
    pub frequency: f32,
    /// Phoneme label from an upstream aligner, when one is available.
    pub phoneme: Option<String>,
}

impl AudioChunk {
    pub fn new(amplitude: f32, frequency: f32) -> Self {
        Self {
            amplitude,
            frequency,
            ..Default::default()
        }
    }

    pub fn silence(timestamp: Duration) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_phoneme(mut self, phoneme: impl Into<String>) -> Self {
        self.phoneme = Some(phoneme.into());
        self
    }
}

/// Splits `samples` into 50 ms windows at `sample_rate_hz`.
///
/// A zero sample rate yields no chunks.
pub fn audio_to_chunks(samples: &[f32], sample_rate_hz: u32) -> Vec<AudioChunk> {
    match AnalysisWindow::new(sample_rate_hz, DEFAULT_WINDOW_MS) {
        Ok(window) => audio_to_chunks_with(samples, &window),
        Err(e) => {
            tracing::warn!(error = %e, "cannot chunk audio");
            Vec::new()
        }
    }
}

/// Splits `samples` into fixed windows and extracts amplitude and pitch.
///
/// The trailing window may be shorter than the rest; it is kept and its
/// `duration` reflects its real length.
pub fn audio_to_chunks_with(samples: &[f32], window: &AnalysisWindow) -> Vec<AudioChunk> {
    let sr = window.sample_rate_hz;
    samples
        .chunks(window.samples_per_window())
        .enumerate()
        .map(|(i, frame)| AudioChunk {
            timestamp: duration_from_samples(sr, i * window.samples_per_window()),
            duration: duration_from_samples(sr, frame.len()),
            amplitude: calculate_rms(frame),
            frequency: estimate_fundamental_frequency(frame, sr),
            phoneme: None,
        })
        .collect()
}

pub fn calculate_rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = buffer.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / buffer.len() as f64).sqrt() as f32
}

/// Brute-force autocorrelation pitch estimate.
///
/// Tries every lag from [`MIN_PITCH_PERIOD`] up to (not including) half the
/// buffer and keeps the one with the largest raw correlation sum. This is
/// quadratic in the buffer length and makes no accuracy promises: the result
/// is only good enough to sort a window into a low, mid or high band.
/// Returns 0 when no lag correlates positively or the buffer is too short to
/// hold a single candidate period.
pub fn estimate_fundamental_frequency(buffer: &[f32], sample_rate_hz: u32) -> f32 {
    let mut best_correlation = 0.0f64;
    let mut best_period = 0usize;

    let mut period = MIN_PITCH_PERIOD;
    while period * 2 < buffer.len() {
        let correlation: f64 = buffer[..buffer.len() - period]
            .iter()
            .zip(&buffer[period..])
            .map(|(&a, &b)| f64::from(a) * f64::from(b))
            .sum();
        if correlation > best_correlation {
            best_correlation = correlation;
            best_period = period;
        }
        period += 1;
    }

    if best_period == 0 {
        return 0.0;
    }
    sample_rate_hz as f32 / best_period as f32
}

fn duration_from_samples(sample_rate_hz: u32, samples: usize) -> Duration {
    if sample_rate_hz == 0 {
        return Duration::from_secs(0);
    }
    let micros = (u128::from(samples as u64) * 1_000_000u128) / u128::from(sample_rate_hz);
    Duration::from_micros(micros.min(u128::from(u64::MAX)) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq_hz: f32, amplitude: f32, sample_rate_hz: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq_hz * i as f32 / sample_rate_hz as f32).sin())
            .collect()
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(calculate_rms(&[0.0, 0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_square_is_one() {
        assert_eq!(calculate_rms(&[1.0, -1.0, 1.0, -1.0]), 1.0);
    }

    #[test]
    fn rms_of_empty_buffer_is_zero() {
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn pitch_needs_at_least_one_candidate_period() {
        let short = sine(1000.0, 0.5, 24_000, 39);
        assert_eq!(estimate_fundamental_frequency(&short, 24_000), 0.0);
        let exactly_40 = sine(1000.0, 0.5, 24_000, 40);
        assert_eq!(estimate_fundamental_frequency(&exactly_40, 24_000), 0.0);
        assert_eq!(estimate_fundamental_frequency(&[], 24_000), 0.0);
    }

    #[test]
    fn pitch_of_silence_is_zero() {
        let silence = vec![0.0f32; 1_200];
        assert_eq!(estimate_fundamental_frequency(&silence, 24_000), 0.0);
    }

    #[test]
    fn pitch_finds_low_tone() {
        let tone = sine(200.0, 0.5, 24_000, 1_200);
        let f = estimate_fundamental_frequency(&tone, 24_000);
        assert!((f - 200.0).abs() < 5.0, "estimated {f} Hz");
    }

    #[test]
    fn pitch_finds_mid_tone() {
        let tone = sine(1000.0, 0.5, 24_000, 1_200);
        let f = estimate_fundamental_frequency(&tone, 24_000);
        assert!((f - 1000.0).abs() < 50.0, "estimated {f} Hz");
    }

    #[test]
    fn chunks_cover_buffer_with_trailing_partial_window() {
        // 125 ms at 24 kHz: two full 50 ms windows and a 25 ms tail.
        let samples = sine(200.0, 0.5, 24_000, 3_000);
        let chunks = audio_to_chunks(&samples, 24_000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].timestamp, Duration::ZERO);
        assert_eq!(chunks[1].timestamp, Duration::from_millis(50));
        assert_eq!(chunks[2].timestamp, Duration::from_millis(100));
        assert_eq!(chunks[0].duration, Duration::from_millis(50));
        assert_eq!(chunks[2].duration, Duration::from_millis(25));
        for c in &chunks {
            assert!((c.amplitude - 0.5 / 2f32.sqrt()).abs() < 0.01);
            assert!(c.phoneme.is_none());
        }
    }

    #[test]
    fn chunks_of_empty_buffer_or_zero_rate_are_empty() {
        assert!(audio_to_chunks(&[], 24_000).is_empty());
        assert!(audio_to_chunks(&[0.5; 100], 0).is_empty());
    }

    #[test]
    fn silent_chunks_have_no_pitch() {
        let chunks = audio_to_chunks(&[0.0; 2_400], 24_000);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.amplitude == 0.0 && c.frequency == 0.0));
    }
}
