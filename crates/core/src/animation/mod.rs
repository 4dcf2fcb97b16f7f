mod controller;
mod mixer;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

pub use controller::{AnimationController, CROSSFADE_WINDOW};
pub use mixer::{AnimationMixer, ClipBindings, ClipId, NullMixer};

/// What the avatar's body is doing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AnimationState {
    Idle,
    Listening,
    Speaking,
    Greeting,
    Thinking,
    Gesturing,
    Goodbye,
}

/// Static behaviour of an [`AnimationState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimationConfig {
    /// `None` for states that run until replaced.
    pub duration: Option<Duration>,
    pub looping: bool,
    /// Entered once `duration` has elapsed.
    pub auto_transition: Option<AnimationState>,
    /// Higher values interrupt lower ones.
    pub priority: u8,
}

impl AnimationState {
    pub const ALL: [AnimationState; 7] = [
        AnimationState::Idle,
        AnimationState::Listening,
        AnimationState::Speaking,
        AnimationState::Greeting,
        AnimationState::Thinking,
        AnimationState::Gesturing,
        AnimationState::Goodbye,
    ];

    pub const fn config(self) -> AnimationConfig {
        match self {
            AnimationState::Idle => AnimationConfig {
                duration: None,
                looping: true,
                auto_transition: None,
                priority: 0,
            },
            AnimationState::Listening => AnimationConfig {
                duration: None,
                looping: true,
                auto_transition: None,
                priority: 1,
            },
            AnimationState::Speaking => AnimationConfig {
                duration: None,
                looping: true,
                auto_transition: None,
                priority: 2,
            },
            AnimationState::Greeting => AnimationConfig {
                duration: Some(Duration::from_millis(3_000)),
                looping: false,
                auto_transition: Some(AnimationState::Listening),
                priority: 3,
            },
            AnimationState::Thinking => AnimationConfig {
                duration: Some(Duration::from_millis(2_000)),
                looping: true,
                auto_transition: None,
                priority: 1,
            },
            AnimationState::Gesturing => AnimationConfig {
                duration: Some(Duration::from_millis(1_500)),
                looping: false,
                auto_transition: Some(AnimationState::Speaking),
                priority: 2,
            },
            AnimationState::Goodbye => AnimationConfig {
                duration: Some(Duration::from_millis(2_500)),
                looping: false,
                auto_transition: Some(AnimationState::Idle),
                priority: 3,
            },
        }
    }

    pub const fn priority(self) -> u8 {
        self.config().priority
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnimationState::Idle => "idle",
            AnimationState::Listening => "listening",
            AnimationState::Speaking => "speaking",
            AnimationState::Greeting => "greeting",
            AnimationState::Thinking => "thinking",
            AnimationState::Gesturing => "gesturing",
            AnimationState::Goodbye => "goodbye",
        }
    }

    /// State a renderer clip drives, judged by its name. Unknown clips are `None`.
    pub fn from_clip_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "idle" | "breathing" => Some(AnimationState::Idle),
            "listening" | "attention" => Some(AnimationState::Listening),
            "talking" | "speaking" => Some(AnimationState::Speaking),
            "wave" | "hello" => Some(AnimationState::Greeting),
            "thinking" | "pondering" => Some(AnimationState::Thinking),
            "gesture" | "explaining" => Some(AnimationState::Gesturing),
            "goodbye" | "farewell" => Some(AnimationState::Goodbye),
            _ => None,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AnimationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown animation state: {0:?}")]
pub struct UnknownState(pub String);

impl FromStr for AnimationState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnimationState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownState(s.to_owned()))
    }
}
