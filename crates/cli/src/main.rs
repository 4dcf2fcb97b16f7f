#![deny(warnings)]

use anyhow::Context;
use clap::Parser;
use clara_avatar_core::audio::{audio_to_chunks_with, read_wav};
use clara_avatar_core::avatar::{Avatar, AvatarFrame, ScheduledEvent};
use clara_avatar_core::config::{
    resolve_parsed, AnalysisWindow, AvatarConfig, BlinkConfig, StdEnv, TransitionSpeed,
    VisemeThresholds, DEFAULT_WINDOW_MS, ENV_TRANSITION_SPEED,
};
use clara_avatar_core::util::ManualClock;
use clara_avatar_core::viseme::MorphBindings;
use serde_json::json;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clara-avatar")]
#[command(about = "Render avatar lip-sync and body animation frames from a WAV file")]
struct Args {
    /// Assistant speech to lip-sync (16/24/32-bit PCM or 32-bit float WAV).
    #[arg(long)]
    input: PathBuf,

    /// Conversation event at a time offset, e.g. `0=greeting` or `3200=assistant-speaking`.
    #[arg(long = "event", value_name = "MS=EVENT")]
    events: Vec<ScheduledEvent>,

    #[arg(long, default_value_t = DEFAULT_WINDOW_MS)]
    window_ms: u64,

    /// Fraction of a mouth transition covered per frame [env: CLARA_TRANSITION_SPEED].
    #[arg(long)]
    transition_speed: Option<f32>,

    /// Comma-separated morph target names of the model, in index order.
    /// Defaults to the positional layout.
    #[arg(long, value_delimiter = ',')]
    morph_targets: Option<Vec<String>>,

    /// Seed for reproducible blinking.
    #[arg(long, env = "CLARA_BLINK_SEED")]
    blink_seed: Option<u64>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let config = build_config(&args, &env)?;
    let morphs = match &args.morph_targets {
        Some(names) => MorphBindings::from_target_names(names.as_slice())?,
        None => MorphBindings::positional(),
    };

    tracing::info!(
        input = %args.input.display(),
        transition_speed = config.transition_speed.get(),
        events = args.events.len(),
        "config loaded"
    );

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let frames = render(&args, &config, morphs, |frame, weights| {
        let line = json!({ "frame": frame, "morphs": weights });
        serde_json::to_writer(&mut out, &line)?;
        out.write_all(b"\n")?;
        Ok(())
    })?;
    out.flush()?;

    tracing::info!(frames, "done");
    Ok(())
}

/// Plays the input through an avatar on a simulated clock, one frame per
/// analysis window. Returns the number of frames emitted.
fn render(
    args: &Args,
    config: &AvatarConfig,
    morphs: MorphBindings,
    mut emit: impl FnMut(&AvatarFrame, &[f32]) -> anyhow::Result<()>,
) -> anyhow::Result<usize> {
    let audio = read_wav(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let window = AnalysisWindow::new(audio.sample_rate_hz, args.window_ms)?;
    let chunks = audio_to_chunks_with(&audio.samples, &window);

    let mut events = args.events.clone();
    events.sort_by_key(|e| e.at);
    let mut pending = events.into_iter().peekable();

    let clock = ManualClock::new();
    let mut model = vec![0.0f32; morphs.required_len()];
    let mut avatar = Avatar::new(clock.clone(), config, morphs);
    let mut last = Duration::ZERO;

    for chunk in &chunks {
        clock.set(chunk.timestamp);
        while let Some(scheduled) = pending.next_if(|e| e.at <= chunk.timestamp) {
            avatar.handle(scheduled.event);
        }
        let frame = avatar.tick(chunk.timestamp - last, Some(chunk), &mut model);
        last = chunk.timestamp;
        emit(&frame, &model)?;
    }

    let skipped = pending.count();
    if skipped > 0 {
        tracing::warn!(skipped, "events scheduled after the end of the audio were ignored");
    }
    Ok(chunks.len())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(
    args: &Args,
    env: &impl clara_avatar_core::config::Env,
) -> anyhow::Result<AvatarConfig> {
    let transition_speed = resolve_parsed(args.transition_speed, ENV_TRANSITION_SPEED, env)?
        .map(TransitionSpeed::new)
        .transpose()?
        .unwrap_or_default();
    let thresholds = VisemeThresholds::from_env(env)?;

    let mut blink = BlinkConfig::default();
    if let Some(seed) = args.blink_seed {
        blink = blink.with_seed(seed);
    }

    Ok(AvatarConfig {
        thresholds,
        transition_speed,
        blink,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clara_avatar_core::animation::AnimationState;
    use clara_avatar_core::avatar::AvatarEvent;
    use clara_avatar_core::config::{MapEnv, ENV_SILENCE_AMPLITUDE};
    use clara_avatar_core::viseme::VisemeId;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["clara-avatar", "--input", "speech.wav"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("valid args")
    }

    #[test]
    fn parses_repeated_events() {
        let args = parse(&["--event", "0=greeting", "--event", "3200=assistant-speaking"]);
        assert_eq!(args.events.len(), 2);
        assert_eq!(args.events[1].at, Duration::from_millis(3_200));
        assert_eq!(args.events[1].event, AvatarEvent::AssistantSpeaking);
    }

    #[test]
    fn rejects_bad_event() {
        let argv = ["clara-avatar", "--input", "a.wav", "--event", "0=dance"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn splits_morph_target_list() {
        let args = parse(&["--morph-targets", "jawOpen,mouthPucker"]);
        assert_eq!(
            args.morph_targets,
            Some(vec!["jawOpen".to_owned(), "mouthPucker".to_owned()])
        );
    }

    #[test]
    fn cli_transition_speed_beats_env() {
        let env = MapEnv::default().with_var(ENV_TRANSITION_SPEED, "0.5");
        let cfg = build_config(&parse(&["--transition-speed", "0.25"]), &env).expect("valid");
        assert_eq!(cfg.transition_speed.get(), 0.25);
        let cfg = build_config(&parse(&[]), &env).expect("valid");
        assert_eq!(cfg.transition_speed.get(), 0.5);
    }

    #[test]
    fn env_thresholds_are_applied() {
        let env = MapEnv::default().with_var(ENV_SILENCE_AMPLITUDE, "0.2");
        let cfg = build_config(&parse(&[]), &env).expect("valid");
        assert_eq!(cfg.thresholds.silence_amplitude, 0.2);
    }

    #[test]
    fn out_of_range_transition_speed_is_an_error() {
        let env = MapEnv::default();
        assert!(build_config(&parse(&["--transition-speed", "2"]), &env).is_err());
    }

    #[test]
    fn blink_seed_is_carried() {
        let cfg = build_config(&parse(&["--blink-seed", "9"]), &MapEnv::default()).expect("valid");
        assert_eq!(cfg.blink.seed, Some(9));
    }

    /// 3.23 s of a 100 Hz tone at 1 kHz: 64 full 50 ms windows and a 30 ms tail.
    fn write_tone(path: &std::path::Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 1_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for i in 0..3_230 {
            let t = i as f32 / 1_000.0;
            let s = 0.5 * (2.0 * std::f32::consts::PI * 100.0 * t).sin();
            writer.write_sample((s * f32::from(i16::MAX)) as i16).expect("sample");
        }
        writer.finalize().expect("finalize");
    }

    #[test]
    fn render_applies_due_events_before_each_frame() {
        let dir = tempfile::tempdir().expect("tempdir");
        let wav = dir.path().join("speech.wav");
        write_tone(&wav);
        let input = wav.to_str().expect("utf-8 path");

        // Out of order on purpose; the goodbye lands after the audio ends.
        let args = Args::try_parse_from([
            "clara-avatar",
            "--input",
            input,
            "--event",
            "3050=assistant-speaking",
            "--event",
            "9000=goodbye",
            "--event",
            "0=greeting",
            "--blink-seed",
            "1",
        ])
        .expect("valid args");
        let config = build_config(&args, &MapEnv::default()).expect("valid config");

        let mut frames = Vec::new();
        let count = render(&args, &config, MorphBindings::positional(), |frame, morphs| {
            assert_eq!(morphs.len(), 6);
            frames.push(frame.clone());
            Ok(())
        })
        .expect("render");

        assert_eq!(count, 65);
        assert_eq!(frames.len(), 65);
        assert_eq!(frames[0].at_ms, 0);
        assert_eq!(frames[64].at_ms, 3_200);

        let states: Vec<AnimationState> = frames.iter().map(|f| f.state).collect();
        assert!(states[..60].iter().all(|&s| s == AnimationState::Greeting));
        // Greeting runs out at 3000 ms and hands over to listening.
        assert_eq!(states[60], AnimationState::Listening);
        assert!(states[61..].iter().all(|&s| s == AnimationState::Speaking));

        assert_eq!(frames[60].viseme.id, VisemeId::Sil);
        assert!(frames[61..].iter().all(|f| f.viseme.id != VisemeId::Sil));
    }

    #[test]
    fn render_reports_missing_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.wav");
        let input = missing.to_str().expect("utf-8 path");
        let args = Args::try_parse_from(["clara-avatar", "--input", input]).expect("valid args");
        let config = build_config(&args, &MapEnv::default()).expect("valid config");
        let err = render(&args, &config, MorphBindings::positional(), |_, _| Ok(())).unwrap_err();
        assert!(err.to_string().contains("failed to read"), "{err:#}");
    }
}
