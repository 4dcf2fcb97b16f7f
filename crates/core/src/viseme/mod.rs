//! Mouth shapes for lip-sync.
//!
//! The table covers the five Spanish vowels, silence, and the consonant groups
//! with a clearly distinct mouth posture. Entries are constants; the
//! processor only ever copies them.

mod morph;
mod processor;

use serde::Serialize;
use std::fmt;

pub use morph::{
    apply_viseme_to_model, viseme_weights, MorphBindings, MorphChannel, MorphTargets, RigError,
};
pub use processor::VisemeProcessor;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VisemeId {
    Sil,
    A,
    E,
    I,
    O,
    U,
    P,
    F,
    T,
    R,
    S,
}

impl VisemeId {
    pub const ALL: [VisemeId; 11] = [
        VisemeId::Sil,
        VisemeId::A,
        VisemeId::E,
        VisemeId::I,
        VisemeId::O,
        VisemeId::U,
        VisemeId::P,
        VisemeId::F,
        VisemeId::T,
        VisemeId::R,
        VisemeId::S,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VisemeId::Sil => "sil",
            VisemeId::A => "a",
            VisemeId::E => "e",
            VisemeId::I => "i",
            VisemeId::O => "o",
            VisemeId::U => "u",
            VisemeId::P => "p",
            VisemeId::F => "f",
            VisemeId::T => "t",
            VisemeId::R => "r",
            VisemeId::S => "s",
        }
    }

    /// Table lookup by phoneme key, e.g. `"a"` or `"sil"`.
    pub fn from_phoneme(key: &str) -> Option<Self> {
        VisemeId::ALL.into_iter().find(|id| id.as_str() == key)
    }

    pub fn viseme(self) -> Viseme {
        VISEMES[self as usize]
    }
}

impl fmt::Display for VisemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MouthShape {
    Closed,
    Open,
    MidOpen,
    Narrow,
    Rounded,
    VeryRounded,
    ClosedLips,
    TeethLip,
    TongueTeeth,
    TongueRoll,
    Hiss,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct Viseme {
    pub id: VisemeId,
    pub name: &'static str,
    pub mouth_shape: MouthShape,
    /// 0 = closed, 1 = fully open.
    pub jaw_openness: f32,
    pub lip_rounding: f32,
    pub tongue_position: f32,
}

impl Viseme {
    const fn entry(
        id: VisemeId,
        name: &'static str,
        mouth_shape: MouthShape,
        jaw_openness: f32,
        lip_rounding: f32,
        tongue_position: f32,
    ) -> Self {
        Self {
            id,
            name,
            mouth_shape,
            jaw_openness,
            lip_rounding,
            tongue_position,
        }
    }
}

/// Indexed by `VisemeId as usize`.
pub static VISEMES: [Viseme; 11] = [
    Viseme::entry(VisemeId::Sil, "Silence", MouthShape::Closed, 0.0, 0.0, 0.5),
    Viseme::entry(VisemeId::A, "A", MouthShape::Open, 0.8, 0.0, 0.5),
    Viseme::entry(VisemeId::E, "E", MouthShape::MidOpen, 0.5, 0.0, 0.3),
    Viseme::entry(VisemeId::I, "I", MouthShape::Narrow, 0.2, 0.0, 0.1),
    Viseme::entry(VisemeId::O, "O", MouthShape::Rounded, 0.6, 0.8, 0.7),
    Viseme::entry(VisemeId::U, "U", MouthShape::VeryRounded, 0.3, 1.0, 0.8),
    Viseme::entry(VisemeId::P, "P/B", MouthShape::ClosedLips, 0.0, 0.0, 0.5),
    Viseme::entry(VisemeId::F, "F/V", MouthShape::TeethLip, 0.1, 0.0, 0.5),
    Viseme::entry(VisemeId::T, "T/D/N/L", MouthShape::TongueTeeth, 0.3, 0.0, 0.2),
    Viseme::entry(VisemeId::R, "R/RR", MouthShape::TongueRoll, 0.4, 0.0, 0.3),
    Viseme::entry(VisemeId::S, "S/Z", MouthShape::Hiss, 0.2, 0.0, 0.4),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_id() {
        for id in VisemeId::ALL {
            assert_eq!(id.viseme().id, id);
        }
    }

    #[test]
    fn table_values_are_normalised() {
        for v in &VISEMES {
            for x in [v.jaw_openness, v.lip_rounding, v.tongue_position] {
                assert!((0.0..=1.0).contains(&x), "{} out of range", v.name);
            }
        }
    }

    #[test]
    fn phoneme_lookup() {
        assert_eq!(VisemeId::from_phoneme("sil"), Some(VisemeId::Sil));
        assert_eq!(VisemeId::from_phoneme("o"), Some(VisemeId::O));
        assert_eq!(VisemeId::from_phoneme("x"), None);
        assert_eq!(VisemeId::from_phoneme("A"), None);
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_value(VisemeId::U.viseme()).expect("serialize");
        assert_eq!(json["id"], "u");
        assert_eq!(json["mouth_shape"], "very-rounded");
        assert_eq!(json["name"], "U");
    }
}
