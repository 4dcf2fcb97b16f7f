mod blink;

use crate::animation::{AnimationController, AnimationMixer, AnimationState, ClipBindings, NullMixer};
use crate::audio::AudioChunk;
use crate::config::AvatarConfig;
use crate::util::{Clock, SystemClock};
use crate::viseme::{
    apply_viseme_to_model, MorphBindings, MorphChannel, MorphTargets, Viseme, VisemeProcessor,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

pub use blink::BlinkScheduler;

/// Conversation-level signals that steer the avatar's body.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AvatarEvent {
    Greeting,
    UserSpeaking,
    UserSilent,
    AssistantSpeaking,
    AssistantSilent,
    Thinking,
    Gesture,
    Goodbye,
    /// The session dropped; wave goodbye whatever is going on.
    Disconnected,
}

impl AvatarEvent {
    pub const ALL: [AvatarEvent; 9] = [
        AvatarEvent::Greeting,
        AvatarEvent::UserSpeaking,
        AvatarEvent::UserSilent,
        AvatarEvent::AssistantSpeaking,
        AvatarEvent::AssistantSilent,
        AvatarEvent::Thinking,
        AvatarEvent::Gesture,
        AvatarEvent::Goodbye,
        AvatarEvent::Disconnected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AvatarEvent::Greeting => "greeting",
            AvatarEvent::UserSpeaking => "user-speaking",
            AvatarEvent::UserSilent => "user-silent",
            AvatarEvent::AssistantSpeaking => "assistant-speaking",
            AvatarEvent::AssistantSilent => "assistant-silent",
            AvatarEvent::Thinking => "thinking",
            AvatarEvent::Gesture => "gesture",
            AvatarEvent::Goodbye => "goodbye",
            AvatarEvent::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for AvatarEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AvatarEvent {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AvatarEvent::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EventError::UnknownEvent(s.to_owned()))
    }
}

/// An event due at a fixed offset, written `<ms>=<event>`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub at: Duration,
    pub event: AvatarEvent,
}

impl FromStr for ScheduledEvent {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (at, event) = s
            .split_once('=')
            .ok_or_else(|| EventError::MissingSeparator(s.to_owned()))?;
        let ms: u64 = at
            .trim()
            .parse()
            .map_err(|_| EventError::InvalidTime(at.trim().to_owned()))?;
        Ok(Self {
            at: Duration::from_millis(ms),
            event: event.parse()?,
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("expected <ms>=<event>, got {0:?}")]
    MissingSeparator(String),
    #[error("invalid event time {0:?}")]
    InvalidTime(String),
    #[error("unknown avatar event {0:?}")]
    UnknownEvent(String),
}

/// What a renderer needs to draw one frame.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AvatarFrame {
    pub at_ms: u64,
    pub state: AnimationState,
    pub transition_progress: f32,
    pub viseme: Viseme,
    pub blinking: bool,
}

/// Body animation, lip-sync and blinking for one avatar.
pub struct Avatar<C = SystemClock, M = NullMixer> {
    clock: C,
    animation: AnimationController<C, M>,
    visemes: VisemeProcessor,
    morphs: MorphBindings,
    blink: BlinkScheduler,
}

impl<C: Clock + Clone> Avatar<C, NullMixer> {
    pub fn new(clock: C, config: &AvatarConfig, morphs: MorphBindings) -> Self {
        Self::with_mixer(clock, NullMixer, ClipBindings::new(), config, morphs)
    }
}

impl<C: Clock + Clone, M: AnimationMixer> Avatar<C, M> {
    pub fn with_mixer(
        clock: C,
        mixer: M,
        clips: ClipBindings,
        config: &AvatarConfig,
        morphs: MorphBindings,
    ) -> Self {
        let blink = BlinkScheduler::new(config.blink, clock.now());
        Self {
            animation: AnimationController::with_mixer(clock.clone(), mixer, clips),
            visemes: VisemeProcessor::new(config.transition_speed, config.thresholds),
            clock,
            morphs,
            blink,
        }
    }

    /// Applies `event`. Returns whether the body state changed.
    ///
    /// The silent events only release the state their speaker put the avatar
    /// in; they never end a greeting, thought or goodbye early.
    pub fn handle(&mut self, event: AvatarEvent) -> bool {
        let current = self.animation.current_state();
        let (state, force) = match event {
            AvatarEvent::Greeting => (AnimationState::Greeting, false),
            AvatarEvent::UserSpeaking => (AnimationState::Listening, false),
            AvatarEvent::AssistantSpeaking => (AnimationState::Speaking, false),
            AvatarEvent::Thinking => (AnimationState::Thinking, false),
            AvatarEvent::Gesture => (AnimationState::Gesturing, false),
            AvatarEvent::Goodbye => (AnimationState::Goodbye, false),
            AvatarEvent::Disconnected => (AnimationState::Goodbye, true),
            AvatarEvent::UserSilent if current == AnimationState::Listening => {
                (AnimationState::Idle, true)
            }
            AvatarEvent::AssistantSilent
                if matches!(current, AnimationState::Speaking | AnimationState::Gesturing) =>
            {
                (AnimationState::Idle, true)
            }
            AvatarEvent::UserSilent | AvatarEvent::AssistantSilent => return false,
        };
        tracing::debug!(%event, %state, force, "avatar event");
        self.animation.set_state(state, force)
    }

    /// Renders one frame onto `model`.
    ///
    /// `chunk` is the assistant audio for this frame. It only moves the mouth
    /// in states where the assistant talks; otherwise, or when `None`, the
    /// mouth settles closed.
    pub fn tick<T: MorphTargets + ?Sized>(
        &mut self,
        delta: Duration,
        chunk: Option<&AudioChunk>,
        model: &mut T,
    ) -> AvatarFrame {
        self.animation.update(delta);
        let now = self.clock.now();

        let viseme = match chunk {
            Some(chunk) if mouth_follows_audio(self.animation.current_state()) => {
                self.visemes.process_audio_chunk(chunk)
            }
            _ => self.visemes.process_audio_chunk(&AudioChunk::silence(now)),
        };
        apply_viseme_to_model(&viseme, &self.morphs, model);

        let blinking = self.blink.update(now);
        self.morphs.set(model, MorphChannel::EyesClosed, if blinking { 1.0 } else { 0.0 });

        let frame = AvatarFrame {
            at_ms: u64::try_from(now.as_millis()).unwrap_or(u64::MAX),
            state: self.animation.current_state(),
            transition_progress: self.animation.transition_progress(),
            viseme,
            blinking,
        };
        tracing::trace!(
            at_ms = frame.at_ms,
            state = %frame.state,
            viseme = %frame.viseme.id,
            "frame"
        );
        frame
    }

    pub fn animation(&self) -> &AnimationController<C, M> {
        &self.animation
    }

    pub fn visemes(&self) -> &VisemeProcessor {
        &self.visemes
    }

    pub fn morphs(&self) -> &MorphBindings {
        &self.morphs
    }
}

/// States in which the assistant's voice drives the mouth. Greeting and
/// goodbye are spoken lines, so they lip-sync too.
fn mouth_follows_audio(state: AnimationState) -> bool {
    matches!(
        state,
        AnimationState::Speaking
            | AnimationState::Gesturing
            | AnimationState::Greeting
            | AnimationState::Goodbye
    )
}
