use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 24_000;
pub const DEFAULT_WINDOW_MS: u64 = 50;
pub const DEFAULT_TRANSITION_SPEED: f32 = 0.1;
pub const DEFAULT_BLINK_MIN_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_BLINK_JITTER_MS: u64 = 4_000;
pub const DEFAULT_BLINK_DURATION_MS: u64 = 300;

pub const ENV_SILENCE_AMPLITUDE: &str = "CLARA_SILENCE_AMPLITUDE";
pub const ENV_OPEN_VOWEL_AMPLITUDE: &str = "CLARA_OPEN_VOWEL_AMPLITUDE";
pub const ENV_LOW_FREQUENCY_HZ: &str = "CLARA_LOW_FREQUENCY_HZ";
pub const ENV_MID_FREQUENCY_HZ: &str = "CLARA_MID_FREQUENCY_HZ";
pub const ENV_SIBILANT_AMPLITUDE: &str = "CLARA_SIBILANT_AMPLITUDE";
pub const ENV_TRANSITION_SPEED: &str = "CLARA_TRANSITION_SPEED";

/// Cut-off values for the amplitude/frequency viseme fallback.
///
/// These are hand-tuned constants, not linguistically derived boundaries.
/// They only need to split audio into a coarse silent / low / mid / high band.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawThresholds")]
pub struct VisemeThresholds {
    /// Below this RMS the mouth is closed.
    pub silence_amplitude: f32,
    /// Low-band audio louder than this opens wide (`a`), otherwise rounds (`o`).
    pub open_vowel_amplitude: f32,
    pub low_frequency_hz: f32,
    pub mid_frequency_hz: f32,
    /// High-band audio louder than this hisses (`s`), otherwise taps (`t`).
    pub sibilant_amplitude: f32,
}

impl VisemeThresholds {
    pub fn new(
        silence_amplitude: f32,
        open_vowel_amplitude: f32,
        low_frequency_hz: f32,
        mid_frequency_hz: f32,
        sibilant_amplitude: f32,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("silence_amplitude", silence_amplitude),
            ("open_vowel_amplitude", open_vowel_amplitude),
            ("low_frequency_hz", low_frequency_hz),
            ("mid_frequency_hz", mid_frequency_hz),
            ("sibilant_amplitude", sibilant_amplitude),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if low_frequency_hz >= mid_frequency_hz {
            return Err(ConfigError::FrequencyBandsOverlap {
                low: low_frequency_hz,
                mid: mid_frequency_hz,
            });
        }
        Ok(Self {
            silence_amplitude,
            open_vowel_amplitude,
            low_frequency_hz,
            mid_frequency_hz,
            sibilant_amplitude,
        })
    }

    /// Defaults with any `CLARA_*` threshold variables applied on top.
    pub fn from_env(env: &impl Env) -> Result<Self, ConfigError> {
        let d = Self::default();
        Self::new(
            resolve_parsed(None, ENV_SILENCE_AMPLITUDE, env)?.unwrap_or(d.silence_amplitude),
            resolve_parsed(None, ENV_OPEN_VOWEL_AMPLITUDE, env)?
                .unwrap_or(d.open_vowel_amplitude),
            resolve_parsed(None, ENV_LOW_FREQUENCY_HZ, env)?.unwrap_or(d.low_frequency_hz),
            resolve_parsed(None, ENV_MID_FREQUENCY_HZ, env)?.unwrap_or(d.mid_frequency_hz),
            resolve_parsed(None, ENV_SIBILANT_AMPLITUDE, env)?.unwrap_or(d.sibilant_amplitude),
        )
    }
}

#[derive(Deserialize)]
struct RawThresholds {
    silence_amplitude: f32,
    open_vowel_amplitude: f32,
    low_frequency_hz: f32,
    mid_frequency_hz: f32,
    sibilant_amplitude: f32,
}

impl TryFrom<RawThresholds> for VisemeThresholds {
    type Error = ConfigError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        Self::new(
            raw.silence_amplitude,
            raw.open_vowel_amplitude,
            raw.low_frequency_hz,
            raw.mid_frequency_hz,
            raw.sibilant_amplitude,
        )
    }
}

impl Default for VisemeThresholds {
    fn default() -> Self {
        Self {
            silence_amplitude: 0.01,
            open_vowel_amplitude: 0.5,
            low_frequency_hz: 500.0,
            mid_frequency_hz: 1500.0,
            sibilant_amplitude: 0.3,
        }
    }
}

/// Fraction of a viseme transition covered per processed chunk.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "f32")]
pub struct TransitionSpeed(f32);

impl TransitionSpeed {
    pub fn new(value: f32) -> Result<Self, ConfigError> {
        if !value.is_finite() || value <= 0.0 || value > 1.0 {
            return Err(ConfigError::InvalidTransitionSpeed(value));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> f32 {
        self.0
    }
}

impl TryFrom<f32> for TransitionSpeed {
    type Error = ConfigError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Default for TransitionSpeed {
    fn default() -> Self {
        Self(DEFAULT_TRANSITION_SPEED)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub sample_rate_hz: u32,
    pub window_ms: u64,
}

impl AnalysisWindow {
    pub fn new(sample_rate_hz: u32, window_ms: u64) -> Result<Self, ConfigError> {
        if sample_rate_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if window_ms == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Self {
            sample_rate_hz,
            window_ms,
        })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Samples per window, never less than one.
    pub fn samples_per_window(&self) -> usize {
        let sr = u64::from(self.sample_rate_hz);
        let n = self.window_ms.saturating_mul(sr).saturating_div(1000).max(1);
        usize::try_from(n).unwrap_or(usize::MAX)
    }
}

impl Default for AnalysisWindow {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawBlink")]
pub struct BlinkConfig {
    pub min_interval_ms: u64,
    pub jitter_ms: u64,
    pub blink_ms: u64,
    /// Fixed seed for reproducible blinking; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl BlinkConfig {
    pub fn new(min_interval_ms: u64, jitter_ms: u64, blink_ms: u64) -> Result<Self, ConfigError> {
        if blink_ms == 0 || blink_ms >= min_interval_ms {
            return Err(ConfigError::InvalidBlink {
                min_interval_ms,
                blink_ms,
            });
        }
        Ok(Self {
            min_interval_ms,
            jitter_ms,
            blink_ms,
            seed: None,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[derive(Deserialize)]
struct RawBlink {
    min_interval_ms: u64,
    jitter_ms: u64,
    blink_ms: u64,
    #[serde(default)]
    seed: Option<u64>,
}

impl TryFrom<RawBlink> for BlinkConfig {
    type Error = ConfigError;

    fn try_from(raw: RawBlink) -> Result<Self, Self::Error> {
        let config = Self::new(raw.min_interval_ms, raw.jitter_ms, raw.blink_ms)?;
        Ok(match raw.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        })
    }
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_BLINK_MIN_INTERVAL_MS,
            jitter_ms: DEFAULT_BLINK_JITTER_MS,
            blink_ms: DEFAULT_BLINK_DURATION_MS,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AvatarConfig {
    pub thresholds: VisemeThresholds,
    pub transition_speed: TransitionSpeed,
    pub blink: BlinkConfig,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("threshold {name} must be finite and >= 0, got {value}")]
    InvalidThreshold { name: &'static str, value: f32 },
    #[error("low frequency band ({low} Hz) must end below the mid band ({mid} Hz)")]
    FrequencyBandsOverlap { low: f32, mid: f32 },
    #[error("transition speed must be in (0, 1], got {0}")]
    InvalidTransitionSpeed(f32),
    #[error("sample rate must be > 0 Hz")]
    ZeroSampleRate,
    #[error("analysis window must be > 0 ms")]
    ZeroWindow,
    #[error("blink of {blink_ms} ms must be non-zero and shorter than the {min_interval_ms} ms interval")]
    InvalidBlink { min_interval_ms: u64, blink_ms: u64 },
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnvValue { key: String, value: String },
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// CLI value if given, else the parsed environment variable, else `None`.
pub fn resolve_parsed<T: FromStr>(
    cli_value: Option<T>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<T>, ConfigError> {
    if cli_value.is_some() {
        return Ok(cli_value);
    }
    match env.var(env_key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvValue {
                key: env_key.to_owned(),
                value: raw,
            }),
        None => Ok(None),
    }
}
