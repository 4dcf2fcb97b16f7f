use crate::animation::{AnimationMixer, AnimationState, ClipBindings, NullMixer};
use crate::util::{Clock, SystemClock};
use std::time::Duration;

/// Length of the crossfade between two state animations.
pub const CROSSFADE_WINDOW: Duration = Duration::from_millis(300);

/// Priority-arbitrated state machine for the avatar's body animation.
///
/// A state can only be displaced by one of equal or higher priority unless the
/// caller forces it, so idle chatter cannot cut a greeting or goodbye short.
/// Transition progress and auto-transition timers are read off the [`Clock`]
/// on every update.
pub struct AnimationController<C = SystemClock, M = NullMixer> {
    clock: C,
    mixer: M,
    clips: ClipBindings,
    current: AnimationState,
    previous: AnimationState,
    started_at: Duration,
    transition_progress: f32,
}

impl<C: Clock> AnimationController<C, NullMixer> {
    pub fn new(clock: C) -> Self {
        Self::with_mixer(clock, NullMixer, ClipBindings::new())
    }
}

impl<C: Clock, M: AnimationMixer> AnimationController<C, M> {
    pub fn with_mixer(clock: C, mixer: M, clips: ClipBindings) -> Self {
        let started_at = clock.now();
        Self {
            clock,
            mixer,
            clips,
            current: AnimationState::Idle,
            previous: AnimationState::Idle,
            started_at,
            transition_progress: 1.0,
        }
    }

    /// Requests `next`. Returns whether the current state changed.
    ///
    /// Unforced requests for a lower-priority state are ignored. Requesting
    /// the current state is a no-op and does not restart its timer.
    pub fn set_state(&mut self, next: AnimationState, force: bool) -> bool {
        if !force && next.priority() < self.current.priority() {
            tracing::debug!(current = %self.current, requested = %next, "state change outranked");
            return false;
        }
        if next == self.current {
            return false;
        }

        self.previous = self.current;
        self.current = next;
        self.started_at = self.clock.now();
        self.transition_progress = 0.0;
        tracing::debug!(from = %self.previous, to = %self.current, force, "animation state changed");

        self.start_animation();
        true
    }

    /// Advances the mixer and re-evaluates transition progress and timers.
    pub fn update(&mut self, delta: Duration) {
        self.mixer.update(delta);

        let elapsed = self.elapsed();
        self.transition_progress =
            (elapsed.as_secs_f32() / CROSSFADE_WINDOW.as_secs_f32()).min(1.0);

        let cfg = self.current.config();
        if let (Some(next), Some(duration)) = (cfg.auto_transition, cfg.duration) {
            if elapsed >= duration {
                // The expiring state gives up its own claim, so its successor
                // is entered regardless of priority.
                self.set_state(next, true);
            }
        }
    }

    pub fn current_state(&self) -> AnimationState {
        self.current
    }

    pub fn previous_state(&self) -> AnimationState {
        self.previous
    }

    pub fn transition_progress(&self) -> f32 {
        self.transition_progress
    }

    /// Time spent in the current state.
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started_at)
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    fn start_animation(&mut self) {
        let looping = self.current.config().looping;
        let Some(clip) = self.clips.clip_for(self.current) else {
            return;
        };
        match self.clips.clip_for(self.previous) {
            Some(from) if from != clip => {
                self.mixer.crossfade(from, clip, CROSSFADE_WINDOW, looping)
            }
            _ => self.mixer.play(clip, looping),
        }
    }
}
