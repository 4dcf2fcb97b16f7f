use crate::animation::AnimationState;
use std::time::Duration;

/// Renderer-side handle for an animation clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClipId(pub usize);

/// The renderer's animation mixer, as seen by the controller.
pub trait AnimationMixer: Send {
    /// Advance playback by `delta`.
    fn update(&mut self, delta: Duration);

    /// Restart `clip` from its first frame at full weight.
    fn play(&mut self, clip: ClipId, looping: bool);

    /// Restart `to` at full weight, fading `from` out over `window`.
    fn crossfade(&mut self, from: ClipId, to: ClipId, window: Duration, looping: bool);
}

/// Mixer for headless use or avatars without skeletal clips.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullMixer;

impl AnimationMixer for NullMixer {
    fn update(&mut self, _delta: Duration) {}

    fn play(&mut self, _clip: ClipId, _looping: bool) {}

    fn crossfade(&mut self, _from: ClipId, _to: ClipId, _window: Duration, _looping: bool) {}
}

/// Which clip plays for each state, resolved once when the model loads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipBindings {
    clips: [Option<ClipId>; AnimationState::ALL.len()],
}

impl ClipBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds clips by name; `names[i]` becomes `ClipId(i)`.
    ///
    /// Unrecognised names are skipped. When two clips claim the same state
    /// the later one wins.
    pub fn from_clip_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut bindings = Self::new();
        for (i, name) in names.iter().enumerate() {
            let name = name.as_ref();
            match AnimationState::from_clip_name(name) {
                Some(state) => {
                    if let Some(ClipId(prev)) = bindings.bind(state, ClipId(i)) {
                        tracing::debug!(clip = name, %state, replaced = prev, "clip rebound");
                    }
                }
                None => tracing::debug!(clip = name, "clip ignored"),
            }
        }
        bindings
    }

    /// Returns the clip previously bound to `state`, if any.
    pub fn bind(&mut self, state: AnimationState, clip: ClipId) -> Option<ClipId> {
        self.clips[state.index()].replace(clip)
    }

    pub fn clip_for(&self, state: AnimationState) -> Option<ClipId> {
        self.clips[state.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.clips.iter().all(Option::is_none)
    }
}
