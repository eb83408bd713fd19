//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! It selects an input device and configuration, streams samples out of the
//! device callback, and classifies setup failures.
//!
//! ## Features
//! - Automatic audio device selection
//! - Preference for mono 32-bit float input near the target sample rate
//! - Down-mixing of multi-channel input to mono
//! - Permission / missing-device / other error classification

use crate::error::CaptureError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, TryRecvError};
use std::collections::VecDeque;

/// Sample rate requested from the device when it supports it.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Number of callback chunks buffered between the device and the detector.
const CHUNK_QUEUE: usize = 64;

/// A live source of mono samples, owned by the detection thread.
pub trait FrameSource {
    fn sample_rate(&self) -> u32;

    /// Fills `frame` with the most recent samples, oldest first.
    ///
    /// Before enough audio has arrived the front of the frame is zero.
    fn read_frame(&mut self, frame: &mut [f32]) -> Result<(), CaptureError>;
}

/// Opens a [`FrameSource`].
///
/// `open` runs on the detection thread, because device streams generally
/// cannot move between threads.
pub trait CaptureBackend: Send + Sync + 'static {
    fn open(&self, frame_len: usize) -> Result<Box<dyn FrameSource>, CaptureError>;
}

/// Keeps the latest `capacity` samples of a stream.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, chunk: &[f32]) {
        let skip = chunk.len().saturating_sub(self.capacity);
        self.samples.extend(&chunk[skip..]);
        let excess = self.samples.len().saturating_sub(self.capacity);
        self.samples.drain(..excess);
    }

    /// Copies the window into the tail of `frame`, zeroing whatever is left in front.
    pub fn copy_latest(&self, frame: &mut [f32]) {
        let available = self.samples.len().min(frame.len());
        let offset = frame.len() - available;
        frame[..offset].fill(0.0);
        let skip = self.samples.len() - available;
        for (dst, &src) in frame[offset..].iter_mut().zip(self.samples.iter().skip(skip)) {
            *dst = src;
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Captures from the host's default input device.
#[derive(Debug, Clone)]
pub struct CpalBackend {
    pub target_sample_rate: u32,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self {
            target_sample_rate: TARGET_SAMPLE_RATE,
        }
    }
}

/// A running cpal input stream. Dropping it releases the device.
pub struct CpalSource {
    _stream: cpal::Stream,
    chunks: Receiver<Vec<f32>>,
    window: SlidingWindow,
    sample_rate: u32,
}

impl FrameSource for CpalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_frame(&mut self, frame: &mut [f32]) -> Result<(), CaptureError> {
        loop {
            match self.chunks.try_recv() {
                Ok(chunk) => self.window.push(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(CaptureError::Other("capture stream closed".into()));
                }
            }
        }
        self.window.copy_latest(frame);
        Ok(())
    }
}

impl CaptureBackend for CpalBackend {
    /// Starts capture from the default input device.
    ///
    /// This function:
    /// 1. Selects the default audio input device
    /// 2. Picks an f32 configuration, preferring mono near the target rate
    /// 3. Sets up a callback that forwards mono chunks to the detection thread
    fn open(&self, frame_len: usize) -> Result<Box<dyn FrameSource>, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::DeviceNotFound)?;

        log::info!(
            "[CAPTURE] Using audio input device: {}",
            device.name().unwrap_or_else(|_| "unknown".into())
        );

        let configs = device
            .supported_input_configs()
            .map_err(CaptureError::from)?
            .collect::<Vec<_>>();
        let supported = match find_supported_config(configs, self.target_sample_rate) {
            Some(range) => {
                let rate = self
                    .target_sample_rate
                    .clamp(range.min_sample_rate().0, range.max_sample_rate().0);
                range.with_sample_rate(cpal::SampleRate(rate))
            }
            None => {
                let fallback = device.default_input_config().map_err(CaptureError::from)?;
                if fallback.sample_format() != cpal::SampleFormat::F32 {
                    return Err(CaptureError::Other(format!(
                        "no f32 input format (device default is {})",
                        fallback.sample_format()
                    )));
                }
                fallback
            }
        };

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels().max(1) as usize;
        let config: cpal::StreamConfig = supported.into();
        log::info!("[CAPTURE] Selected sample rate: {sample_rate} Hz, {channels} channel(s)");

        let (tx, rx) = crossbeam_channel::bounded::<Vec<f32>>(CHUNK_QUEUE);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = downmix(data, channels);
                    // Drop the chunk if the detector is behind.
                    let _ = tx.try_send(mono);
                },
                |err| log::error!("[CAPTURE] An error occurred on the audio stream: {err}"),
                None,
            )
            .map_err(CaptureError::from)?;

        stream.play().map_err(CaptureError::from)?;

        Ok(Box::new(CpalSource {
            _stream: stream,
            chunks: rx,
            window: SlidingWindow::new(frame_len),
            sample_rate,
        }))
    }
}

/// Averages interleaved frames down to one channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Finds the best f32 input configuration for the target sample rate.
///
/// Mono configurations win over multi-channel ones; among equals the one
/// whose rate range lies closest to `target_rate` is chosen.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let distance = if target_rate < min {
                min - target_rate
            } else {
                target_rate.saturating_sub(max)
            };
            (c.channels() != 1, distance)
        })
}

/// Sorts a backend message into the permission bucket when it reads like one.
fn classify_message(description: String) -> CaptureError {
    let lower = description.to_lowercase();
    let permission = ["permission", "denied", "not authorized", "unauthorized", "not permitted"]
        .iter()
        .any(|needle| lower.contains(needle));
    if permission {
        CaptureError::PermissionDenied(description)
    } else {
        CaptureError::Other(description)
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceNotFound,
            cpal::BuildStreamError::BackendSpecific { err } => classify_message(err.description),
            other => CaptureError::Other(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(err: cpal::PlayStreamError) -> Self {
        match err {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceNotFound,
            cpal::PlayStreamError::BackendSpecific { err } => classify_message(err.description),
            #[allow(unreachable_patterns)]
            other => CaptureError::Other(other.to_string()),
        }
    }
}

impl From<cpal::SupportedStreamConfigsError> for CaptureError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        match err {
            cpal::SupportedStreamConfigsError::DeviceNotAvailable => CaptureError::DeviceNotFound,
            cpal::SupportedStreamConfigsError::BackendSpecific { err } => {
                classify_message(err.description)
            }
            other => CaptureError::Other(other.to_string()),
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        match err {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::DeviceNotFound,
            cpal::DefaultStreamConfigError::BackendSpecific { err } => {
                classify_message(err.description)
            }
            other => CaptureError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_error(description: &str) -> cpal::BackendSpecificError {
        cpal::BackendSpecificError {
            description: description.into(),
        }
    }

    #[test]
    fn classifies_missing_device() {
        assert_eq!(
            CaptureError::from(cpal::BuildStreamError::DeviceNotAvailable),
            CaptureError::DeviceNotFound
        );
        assert_eq!(
            CaptureError::from(cpal::PlayStreamError::DeviceNotAvailable),
            CaptureError::DeviceNotFound
        );
    }

    #[test]
    fn classifies_permission_messages() {
        let err = cpal::BuildStreamError::BackendSpecific {
            err: backend_error("Microphone access Permission Denied by user"),
        };
        assert!(matches!(CaptureError::from(err), CaptureError::PermissionDenied(_)));

        let err = cpal::PlayStreamError::BackendSpecific {
            err: backend_error("device busy"),
        };
        assert_eq!(CaptureError::from(err), CaptureError::Other("device busy".into()));
    }

    #[test]
    fn other_build_errors_stay_other() {
        let err = CaptureError::from(cpal::BuildStreamError::StreamConfigNotSupported);
        assert!(matches!(err, CaptureError::Other(_)));
    }

    #[test]
    fn window_keeps_latest_samples() {
        let mut window = SlidingWindow::new(4);
        window.push(&[1.0, 2.0]);
        let mut frame = [9.0; 4];
        window.copy_latest(&mut frame);
        assert_eq!(frame, [0.0, 0.0, 1.0, 2.0]);

        window.push(&[3.0, 4.0, 5.0]);
        window.copy_latest(&mut frame);
        assert_eq!(frame, [2.0, 3.0, 4.0, 5.0]);
        assert_eq!(window.len(), 4);

        window.push(&[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        window.copy_latest(&mut frame);
        assert_eq!(frame, [8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn downmix_averages_channels() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }
}
