use crate::audio::AudioChunk;
use crate::config::{TransitionSpeed, VisemeThresholds};
use crate::viseme::{Viseme, VisemeId};

/// Turns audio chunks into smoothly interpolated mouth shapes.
///
/// Each processed chunk moves the mouth a fixed step from where it was
/// towards the latest target. Retargeting mid-transition starts from the
/// shape currently on screen, so the mouth never jumps.
#[derive(Clone, Debug)]
pub struct VisemeProcessor {
    current: Viseme,
    target: Viseme,
    transition_progress: f32,
    transition_speed: TransitionSpeed,
    thresholds: VisemeThresholds,
}

impl Default for VisemeProcessor {
    fn default() -> Self {
        Self::new(TransitionSpeed::default(), VisemeThresholds::default())
    }
}

impl VisemeProcessor {
    pub fn new(transition_speed: TransitionSpeed, thresholds: VisemeThresholds) -> Self {
        let sil = VisemeId::Sil.viseme();
        Self {
            current: sil,
            target: sil,
            transition_progress: 0.0,
            transition_speed,
            thresholds,
        }
    }

    /// Retargets from `chunk` and returns the next interpolated shape.
    ///
    /// A known phoneme label wins. Without one the shape is guessed from
    /// amplitude and pitch; see [`VisemeProcessor::classify`].
    pub fn process_audio_chunk(&mut self, chunk: &AudioChunk) -> Viseme {
        let id = chunk
            .phoneme
            .as_deref()
            .and_then(VisemeId::from_phoneme)
            .unwrap_or_else(|| self.classify(chunk.amplitude, chunk.frequency));
        self.set_target_viseme(id.viseme());
        self.step()
    }

    /// Coarse amplitude/pitch guess at a mouth shape.
    ///
    /// This is not a phoneme classifier. Quiet audio closes the mouth, low
    /// pitch opens it (wide when loud, rounded when soft), mid pitch gives a
    /// half-open `e`, and high pitch is treated as a consonant. It is wrong
    /// often; it only has to look plausible while someone talks.
    pub fn classify(&self, amplitude: f32, frequency: f32) -> VisemeId {
        let t = &self.thresholds;
        if amplitude < t.silence_amplitude {
            VisemeId::Sil
        } else if frequency < t.low_frequency_hz {
            if amplitude > t.open_vowel_amplitude {
                VisemeId::A
            } else {
                VisemeId::O
            }
        } else if frequency < t.mid_frequency_hz {
            VisemeId::E
        } else if amplitude > t.sibilant_amplitude {
            VisemeId::S
        } else {
            VisemeId::T
        }
    }

    /// Starts a transition to `viseme` from the shape currently shown.
    ///
    /// Retargeting to the same id leaves the running transition alone.
    pub fn set_target_viseme(&mut self, viseme: Viseme) {
        if viseme.id == self.target.id {
            return;
        }
        tracing::trace!(
            from = %self.target.id,
            to = %viseme.id,
            progress = self.transition_progress,
            "viseme retargeted"
        );
        self.current = self.interpolated();
        self.target = viseme;
        self.transition_progress = 0.0;
    }

    /// Shape at the current progress, without advancing.
    ///
    /// Identity and mouth shape come from the target; the continuous fields
    /// blend between the transition start and the target.
    pub fn interpolated(&self) -> Viseme {
        let t = self.transition_progress;
        Viseme {
            jaw_openness: lerp(self.current.jaw_openness, self.target.jaw_openness, t),
            lip_rounding: lerp(self.current.lip_rounding, self.target.lip_rounding, t),
            tongue_position: lerp(self.current.tongue_position, self.target.tongue_position, t),
            ..self.target
        }
    }

    pub fn current_viseme(&self) -> &Viseme {
        &self.current
    }

    pub fn target_viseme(&self) -> &Viseme {
        &self.target
    }

    pub fn transition_progress(&self) -> f32 {
        self.transition_progress
    }

    fn step(&mut self) -> Viseme {
        self.transition_progress =
            (self.transition_progress + self.transition_speed.get()).min(1.0);
        self.interpolated()
    }
}

/// Exact at both ends: `t == 0` gives `start`, `t == 1` gives `end`.
fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start * (1.0 - t) + end * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_same_pose(a: &Viseme, b: &Viseme) {
        assert_eq!(a.jaw_openness, b.jaw_openness);
        assert_eq!(a.lip_rounding, b.lip_rounding);
        assert_eq!(a.tongue_position, b.tongue_position);
    }

    #[test]
    fn fallback_ladder_scenarios() {
        let cases = [
            (AudioChunk::new(0.005, 0.0), VisemeId::Sil),
            (AudioChunk::new(0.6, 300.0), VisemeId::A),
            (AudioChunk::new(0.2, 300.0), VisemeId::O),
            (AudioChunk::new(0.5, 1000.0), VisemeId::E),
            (AudioChunk::new(0.4, 2000.0), VisemeId::S),
            (AudioChunk::new(0.1, 2000.0), VisemeId::T),
        ];
        for (chunk, expected) in cases {
            let mut p = VisemeProcessor::default();
            let v = p.process_audio_chunk(&chunk);
            assert_eq!(v.id, expected, "chunk {chunk:?}");
            assert_eq!(p.target_viseme().id, expected);
        }
    }

    #[test]
    fn silence_check_runs_before_pitch() {
        let p = VisemeProcessor::default();
        assert_eq!(p.classify(0.005, 300.0), VisemeId::Sil);
        assert_eq!(p.classify(0.005, 3000.0), VisemeId::Sil);
    }

    #[test]
    fn band_edges_fall_upwards() {
        let p = VisemeProcessor::default();
        assert_eq!(p.classify(0.2, 500.0), VisemeId::E);
        assert_eq!(p.classify(0.2, 1500.0), VisemeId::T);
        assert_eq!(p.classify(0.5, 300.0), VisemeId::O);
        assert_eq!(p.classify(0.3, 2000.0), VisemeId::T);
    }

    #[test]
    fn custom_thresholds_shift_the_ladder() {
        let thresholds = VisemeThresholds::new(0.1, 0.5, 200.0, 800.0, 0.3).expect("valid");
        let p = VisemeProcessor::new(TransitionSpeed::default(), thresholds);
        assert_eq!(p.classify(0.05, 300.0), VisemeId::Sil);
        assert_eq!(p.classify(0.2, 300.0), VisemeId::E);
        assert_eq!(p.classify(0.2, 1000.0), VisemeId::T);
    }

    #[test]
    fn phoneme_label_overrides_audio() {
        let mut p = VisemeProcessor::default();
        let v = p.process_audio_chunk(&AudioChunk::new(0.9, 300.0).with_phoneme("u"));
        assert_eq!(v.id, VisemeId::U);
    }

    #[test]
    fn unknown_phoneme_falls_back_to_ladder() {
        let mut p = VisemeProcessor::default();
        let v = p.process_audio_chunk(&AudioChunk::new(0.9, 300.0).with_phoneme("zh"));
        assert_eq!(v.id, VisemeId::A);
    }

    #[test]
    fn steady_target_converges_exactly() {
        let mut p = VisemeProcessor::default();
        let chunk = AudioChunk::new(0.2, 300.0);
        let mut last = 0.0;
        for _ in 0..20 {
            p.process_audio_chunk(&chunk);
            assert!(p.transition_progress() >= last);
            last = p.transition_progress();
        }
        assert_eq!(p.transition_progress(), 1.0);
        assert_same_pose(&p.interpolated(), &VisemeId::O.viseme());
    }

    #[test]
    fn first_step_moves_by_transition_speed() {
        let mut p = VisemeProcessor::default();
        let v = p.process_audio_chunk(&AudioChunk::new(0.6, 300.0));
        assert!((p.transition_progress() - 0.1).abs() < 1e-6);
        assert!((v.jaw_openness - 0.08).abs() < 1e-6);
        assert_eq!(v.mouth_shape, VisemeId::A.viseme().mouth_shape);
    }

    #[test]
    fn retargeting_mid_transition_is_continuous() {
        let mut p = VisemeProcessor::default();
        for _ in 0..3 {
            p.process_audio_chunk(&AudioChunk::new(0.6, 300.0));
        }
        let on_screen = p.interpolated();

        p.set_target_viseme(VisemeId::O.viseme());
        assert_eq!(p.transition_progress(), 0.0);
        assert_same_pose(p.current_viseme(), &on_screen);
        assert_same_pose(&p.interpolated(), &on_screen);
        assert_eq!(p.target_viseme().id, VisemeId::O);
    }

    #[test]
    fn rapid_retargets_never_jump() {
        let mut p = VisemeProcessor::default();
        let chunks = [
            AudioChunk::new(0.6, 300.0),
            AudioChunk::new(0.4, 2000.0),
            AudioChunk::new(0.2, 300.0),
            AudioChunk::new(0.005, 0.0),
            AudioChunk::new(0.5, 1000.0),
        ];
        let mut prev = p.interpolated();
        for chunk in chunks.iter().cycle().take(25) {
            let v = p.process_audio_chunk(chunk);
            // One step never moves a channel by more than the speed times the
            // full [0, 1] range.
            for (a, b) in [
                (prev.jaw_openness, v.jaw_openness),
                (prev.lip_rounding, v.lip_rounding),
                (prev.tongue_position, v.tongue_position),
            ] {
                assert!((a - b).abs() <= 0.1 + 1e-6, "jumped from {a} to {b}");
            }
            prev = v;
        }
    }

    #[test]
    fn same_target_does_not_restart_transition() {
        let mut p = VisemeProcessor::default();
        p.process_audio_chunk(&AudioChunk::new(0.6, 300.0));
        p.process_audio_chunk(&AudioChunk::new(0.7, 200.0));
        assert!((p.transition_progress() - 0.2).abs() < 1e-6);
    }
}
