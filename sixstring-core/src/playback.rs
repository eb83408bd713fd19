//! # Audio Playback Module
//!
//! Plays synthesized voices through the default output device.
//!
//! ## Architecture
//! - **Caller thread**: renders voices and hands them to the [`Player`]
//! - **Audio callback**: owns a [`VoiceMixer`] and sums every active voice
//! - **Communication**: a crossbeam channel carries new voices into the
//!   callback, so the callback never waits on a lock

use crate::error::PlaybackError;
use crate::strum::ScheduledPluck;
use crate::synth::{PluckRequest, synthesize_pluck};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

/// A rendered voice waiting `delay` samples before it sounds.
#[derive(Debug, Clone)]
struct Voice {
    samples: Vec<f32>,
    delay: usize,
    position: usize,
}

impl Voice {
    fn is_finished(&self) -> bool {
        self.delay == 0 && self.position >= self.samples.len()
    }
}

/// Sums scheduled voices sample by sample.
#[derive(Debug, Clone, Default)]
pub struct VoiceMixer {
    voices: Vec<Voice>,
}

impl VoiceMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `samples` to start after `delay` more output samples.
    pub fn add(&mut self, samples: Vec<f32>, delay: usize) {
        if samples.is_empty() {
            return;
        }
        self.voices.push(Voice {
            samples,
            delay,
            position: 0,
        });
    }

    /// Voices that are waiting or still sounding.
    pub fn active(&self) -> usize {
        self.voices.len()
    }

    /// Next mixed sample, clipped to [-1, 1]. Finished voices are dropped.
    pub fn next_sample(&mut self) -> f32 {
        let mut sum = 0.0;
        for voice in &mut self.voices {
            if voice.delay > 0 {
                voice.delay -= 1;
            } else if let Some(&sample) = voice.samples.get(voice.position) {
                sum += sample;
                voice.position += 1;
            }
        }
        self.voices.retain(|v| !v.is_finished());
        sum.clamp(-1.0, 1.0)
    }

    /// Fills an interleaved buffer, writing the same sample to every channel.
    pub fn fill<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        for frame in data.chunks_mut(channels.max(1)) {
            frame.fill(T::from_sample(self.next_sample()));
        }
    }
}

/// A voice on its way to the audio callback.
struct PendingVoice {
    samples: Vec<f32>,
    delay: usize,
}

/// Output stream on the default device.
///
/// Dropping the player stops the stream.
pub struct Player {
    _stream: cpal::Stream,
    voices: Sender<PendingVoice>,
    sample_rate: u32,
}

impl Player {
    /// Opens the default output device with its default configuration.
    pub fn new() -> Result<Self, PlaybackError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(PlaybackError::NoOutputDevice)?;

        log::info!(
            "[PLAYBACK] Using audio output device: {}",
            device.name().unwrap_or_else(|_| "unknown".into())
        );

        let supported = device
            .default_output_config()
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        log::info!(
            "[PLAYBACK] Output config: {} Hz, {} channel(s), {sample_format}",
            config.sample_rate.0,
            config.channels
        );

        let (tx, rx) = crossbeam_channel::unbounded();
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, rx),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, rx),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, rx),
            other => return Err(PlaybackError::UnsupportedFormat(other.to_string())),
        }?;
        stream
            .play()
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            voices: tx,
            sample_rate: config.sample_rate.0,
        })
    }

    /// Device sample rate; voices should be rendered at this rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Starts playing `samples` immediately, on top of anything already sounding.
    pub fn play(&self, samples: Vec<f32>) -> Result<(), PlaybackError> {
        self.schedule(samples, 0)
    }

    /// Synthesizes and plays a single pluck.
    pub fn play_pluck(&self, request: &PluckRequest) -> Result<(), PlaybackError> {
        self.play(synthesize_pluck(self.sample_rate, request))
    }

    /// Synthesizes every pluck of a strum and schedules it at its onset.
    pub fn play_strum(&self, plan: &[ScheduledPluck]) -> Result<(), PlaybackError> {
        for pluck in plan {
            let samples = synthesize_pluck(self.sample_rate, &pluck.request);
            self.schedule(samples, pluck.onset_samples(self.sample_rate))?;
        }
        log::debug!("[PLAYBACK] Scheduled strum of {} voice(s)", plan.len());
        Ok(())
    }

    fn schedule(&self, samples: Vec<f32>, delay: usize) -> Result<(), PlaybackError> {
        self.voices
            .send(PendingVoice { samples, delay })
            .map_err(|_| PlaybackError::Stream("output stream has stopped".into()))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    voices: Receiver<PendingVoice>,
) -> Result<cpal::Stream, PlaybackError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut mixer = VoiceMixer::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                while let Ok(voice) = voices.try_recv() {
                    mixer.add(voice.samples, voice.delay);
                }
                mixer.fill(data, channels);
            },
            |err| log::error!("[PLAYBACK] An error occurred on the output stream: {err}"),
            None,
        )
        .map_err(|e| PlaybackError::Stream(e.to_string()))
}
