use crate::viseme::Viseme;
use serde::Serialize;
use std::fmt;

/// Logical face channels driven by lip-sync and blinking.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Hash)]
pub enum MorphChannel {
    JawOpen,
    MouthSmile,
    MouthFrown,
    MouthPucker,
    TongueOut,
    EyesClosed,
}

impl MorphChannel {
    /// Canonical order; also the positional layout of [`MorphBindings::positional`].
    pub const ALL: [MorphChannel; 6] = [
        MorphChannel::JawOpen,
        MorphChannel::MouthSmile,
        MorphChannel::MouthFrown,
        MorphChannel::MouthPucker,
        MorphChannel::TongueOut,
        MorphChannel::EyesClosed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MorphChannel::JawOpen => "jawOpen",
            MorphChannel::MouthSmile => "mouthSmile",
            MorphChannel::MouthFrown => "mouthFrown",
            MorphChannel::MouthPucker => "mouthPucker",
            MorphChannel::TongueOut => "tongueOut",
            MorphChannel::EyesClosed => "eyesClosed",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MorphChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RigError {
    #[error("morph target {name:?} appears at both index {first} and {second}")]
    DuplicateMorphTarget {
        name: String,
        first: usize,
        second: usize,
    },
}

/// Renderer-side morph target weights.
pub trait MorphTargets {
    fn morph_count(&self) -> usize;

    /// Indices past `morph_count` are ignored.
    fn set_influence(&mut self, index: usize, value: f32);
}

impl MorphTargets for [f32] {
    fn morph_count(&self) -> usize {
        self.len()
    }

    fn set_influence(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.get_mut(index) {
            *slot = value;
        }
    }
}

impl MorphTargets for Vec<f32> {
    fn morph_count(&self) -> usize {
        self.len()
    }

    fn set_influence(&mut self, index: usize, value: f32) {
        self.as_mut_slice().set_influence(index, value)
    }
}

/// Where each [`MorphChannel`] lives in a particular model.
///
/// Built once when the model loads and reused every frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MorphBindings {
    indices: [Option<usize>; MorphChannel::ALL.len()],
}

impl MorphBindings {
    /// No channels bound; applying visemes does nothing.
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Channel `i` of [`MorphChannel::ALL`] at morph index `i`.
    pub fn positional() -> Self {
        let mut bindings = Self::default();
        for channel in MorphChannel::ALL {
            bindings.indices[channel.index()] = Some(channel.index());
        }
        bindings
    }

    /// Binds channels to a model's morph target names.
    ///
    /// Names match exactly, ignoring ASCII case. Targets with no matching
    /// channel are skipped, repeats included. A channel name that appears
    /// twice is rejected since either index could be the intended one.
    pub fn from_target_names<S: AsRef<str>>(names: &[S]) -> Result<Self, RigError> {
        let mut bindings = Self::default();
        for (i, name) in names.iter().enumerate() {
            let key = name.as_ref().trim();
            let Some(channel) = MorphChannel::ALL
                .into_iter()
                .find(|c| c.name().eq_ignore_ascii_case(key))
            else {
                continue;
            };
            if let Some(first) = bindings.indices[channel.index()] {
                return Err(RigError::DuplicateMorphTarget {
                    name: name.as_ref().to_owned(),
                    first,
                    second: i,
                });
            }
            bindings.indices[channel.index()] = Some(i);
        }
        if bindings.is_empty() {
            tracing::warn!(targets = names.len(), "model has no lip-sync morph targets");
        }
        Ok(bindings)
    }

    pub fn index_of(&self, channel: MorphChannel) -> Option<usize> {
        self.indices[channel.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.indices.iter().all(Option::is_none)
    }

    /// Smallest morph array that holds every bound channel.
    pub fn required_len(&self) -> usize {
        self.indices.iter().flatten().map(|i| i + 1).max().unwrap_or(0)
    }

    /// Writes `value` to `channel` if both the binding and the slot exist.
    pub fn set<M: MorphTargets + ?Sized>(&self, model: &mut M, channel: MorphChannel, value: f32) {
        if let Some(index) = self.index_of(channel) {
            if index < model.morph_count() {
                model.set_influence(index, value);
            }
        }
    }
}

/// Weights a viseme puts on each channel.
///
/// Smile and frown stay at zero to keep a neutral, professional face; the
/// tongue only shows for strongly back-tongued shapes. Eyes are left open
/// here and handled by the blink scheduler.
pub fn viseme_weights(viseme: &Viseme) -> [(MorphChannel, f32); 6] {
    [
        (MorphChannel::JawOpen, viseme.jaw_openness),
        (MorphChannel::MouthSmile, 0.0),
        (MorphChannel::MouthFrown, 0.0),
        (MorphChannel::MouthPucker, viseme.lip_rounding),
        (
            MorphChannel::TongueOut,
            if viseme.tongue_position > 0.8 { 0.3 } else { 0.0 },
        ),
        (MorphChannel::EyesClosed, 0.0),
    ]
}

/// Pushes `viseme` onto `model` through `bindings`.
///
/// Missing channels are skipped, so a model without morph targets is left
/// untouched.
pub fn apply_viseme_to_model<M: MorphTargets + ?Sized>(
    viseme: &Viseme,
    bindings: &MorphBindings,
    model: &mut M,
) {
    for (channel, value) in viseme_weights(viseme) {
        bindings.set(model, channel, value);
    }
}
