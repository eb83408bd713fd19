//! # Six-String Host
//!
//! Small driver around `sixstring-core`: picks a key and mode, prints the
//! tuning and chord catalog, and optionally strums a chord or listens to the
//! microphone.
//!
//! ## Architecture
//! - **Main thread**: argument handling, printing, playback control
//! - **Audio threads**: owned by the core (`Player` output callback and the
//!   `PitchDetector` detection thread)
//! - **Communication**: detector events arrive on a crossbeam channel

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use sixstring_core::chords::{self, ChordMatch, StringMask};
use sixstring_core::config::{DetectorConfig, StrumConfig, StrumDirection};
use sixstring_core::detector::{DetectorEvent, DetectorState, PitchDetector};
use sixstring_core::modes::MODES;
use sixstring_core::notes::PitchClass;
use sixstring_core::pitch::{self, PitchSmoother};
use sixstring_core::playback::Player;
use sixstring_core::strum::{self, ScheduledPluck};
use sixstring_core::tuning::{TUNINGS, TunedMode};
use sixstring_core::PitchEvent;
use std::time::{Duration, Instant};

/// Weight of the newest frame in the displayed frequency.
const SMOOTHING_ALPHA: f32 = 0.3;

#[derive(Parser)]
#[command(name = "sixstring", about = "Tunings, chord shapes, strums and pitch detection for a six-string")]
struct Cli {
    /// Key, e.g. "D", "F#" or "Bb"
    #[arg(default_value = "C")]
    key: PitchClass,

    /// Mode identifier
    #[arg(default_value = "major")]
    mode: String,

    /// Open (1) / muted (0) state per string, low string first, e.g. 101010
    #[arg(short, long)]
    pattern: Option<String>,

    /// Strum the pattern (or the first catalog chord) on the default output
    #[arg(short, long)]
    strum: bool,

    /// Strum from the highest string down
    #[arg(long)]
    up: bool,

    /// Listen to the microphone for this many seconds
    #[arg(short, long, value_name = "SECONDS")]
    listen: Option<u64>,

    /// Print machine-readable JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"));
    let cli = Cli::parse();

    let tuned = TUNINGS.get(&cli.mode, cli.key).ok_or_else(|| {
        let known: Vec<&str> = MODES.iter().map(|m| m.name()).collect();
        anyhow!("unknown mode `{}` (known: {})", cli.mode, known.join(", "))
    })?;
    print_tuning(&tuned, cli.json)?;

    let mask = cli.pattern.as_deref().map(parse_pattern).transpose()?;
    if let Some(mask) = &mask {
        let found = chords::match_chord(&tuned.catalog, mask);
        print_match(found.as_ref(), cli.json)?;
    }

    if cli.strum {
        let mask = match mask {
            Some(mask) => mask,
            None => tuned
                .catalog
                .entries
                .first()
                .map(|entry| StringMask::new(entry.pattern))
                .context("mode has no chord shapes to strum")?,
        };
        let config = StrumConfig {
            direction: if cli.up { StrumDirection::Up } else { StrumDirection::Down },
            ..StrumConfig::default()
        };
        play_strum(&strum::plan_strum(&tuned.tuning.strum_events(&mask), &config), &config)?;
    }

    if let Some(seconds) = cli.listen {
        listen(Duration::from_secs(seconds))?;
    }
    Ok(())
}

fn parse_pattern(text: &str) -> Result<StringMask> {
    let states = text
        .chars()
        .filter(|c| !matches!(c, ',' | ' '))
        .map(|c| match c {
            '0' => Ok(0),
            '1' => Ok(1),
            other => Err(anyhow!("invalid string state `{other}` in pattern `{text}`")),
        })
        .collect::<Result<Vec<u8>>>()?;
    Ok(StringMask::try_from(states.as_slice())?)
}

fn print_tuning(tuned: &TunedMode, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tuned)?);
        return Ok(());
    }

    let tuning = &tuned.tuning;
    println!("{} {}", tuning.key, tuning.mode);
    let strings: Vec<String> = tuning
        .strings
        .iter()
        .map(|s| format!("{}{} ({:.2} Hz)", s.pitch_class, s.octave, s.frequency))
        .collect();
    println!("  strings: {}", strings.join("  "));
    for entry in &tuned.catalog.entries {
        let pattern: String = entry.pattern.iter().map(|&open| if open { '1' } else { '0' }).collect();
        println!("  {pattern}  {:<6} {}", entry.name, entry.degree);
    }
    Ok(())
}

fn print_match(found: Option<&ChordMatch>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }
    match found {
        Some(ChordMatch::Chord(chord)) => println!("match: {} ({}, {})", chord.name, chord.degree, chord.quality),
        Some(ChordMatch::AllMuted) => println!("match: all strings muted"),
        None => println!("match: none"),
    }
    Ok(())
}

fn play_strum(plan: &[ScheduledPluck], config: &StrumConfig) -> Result<()> {
    if plan.is_empty() {
        bail!("no open strings to strum");
    }
    let player = Player::new()?;
    log::info!(
        "Strumming {} string(s) {:?} at {} Hz",
        plan.len(),
        config.direction,
        player.sample_rate()
    );
    player.play_strum(plan)?;

    // Keep the stream alive until the last voice has rung out.
    let last_onset = plan.iter().map(|p| p.onset).max().unwrap_or_default();
    let ring = Duration::try_from_secs_f32(config.duration).unwrap_or_default();
    std::thread::sleep(last_onset.saturating_add(ring));
    log::debug!("Strum finished");
    Ok(())
}

fn listen(duration: Duration) -> Result<()> {
    let mut detector = PitchDetector::new(DetectorConfig::default());
    let events = detector.events();
    detector.start()?;
    log::info!("Listening for {:.1} s", duration.as_secs_f32());

    let mut smoother = PitchSmoother::new(SMOOTHING_ALPHA);
    let mut last_label = String::new();
    let deadline = Instant::now() + duration;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(DetectorEvent::Pitch(event)) => {
                if let Some(pitch) = smoother.update(&event) {
                    let label = pitch::note_label(&pitch);
                    if label != last_label {
                        println!("{label:<4} {:8.2} Hz {:+6.1} cents", pitch.frequency, pitch.cents);
                        last_label = label;
                    }
                } else if matches!(event, PitchEvent::Silence { .. }) {
                    last_label.clear();
                }
            }
            Ok(DetectorEvent::State(DetectorState::Error(err))) => {
                log::error!("Detector failed: {err}");
                detector.stop();
                return Err(err.into());
            }
            Ok(DetectorEvent::State(state)) => {
                log::debug!("Detector state: {state:?}");
                smoother.reset();
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    detector.stop();
    log::info!("Stopped listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_accept_separators() {
        let mask = parse_pattern("1,0 1,0 1,0").unwrap();
        assert_eq!(mask, StringMask::new([true, false, true, false, true, false]));
        assert!(parse_pattern("10101x").is_err());
        assert!(parse_pattern("101").is_err());
    }

    #[test]
    fn empty_strum_fails_before_opening_a_device() {
        let err = play_strum(&[], &StrumConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "no open strings to strum");
    }
}
