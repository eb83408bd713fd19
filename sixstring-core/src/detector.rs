//! # Pitch Detector Lifecycle
//!
//! Owns the capture device and the detection thread:
//!
//! ```text
//! Idle -> Requesting -> Listening -> Stopped
//!             |             |
//!             +---> Error <-+        (Error and Stopped may start again)
//! ```
//!
//! ## Architecture
//! - **Caller thread**: `start()` / `stop()` and the event receiver
//! - **Detection thread**: opens the capture source, then runs one analysis
//!   pass per tick until told to shut down
//! - **Communication**: crossbeam channels for events, shutdown and the
//!   start handshake

use crate::audio::{CaptureBackend, CpalBackend};
use crate::config::DetectorConfig;
use crate::error::{CaptureError, DetectorError};
use crate::pitch;
use crate::PitchEvent;
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// Lifecycle state of a [`PitchDetector`].
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorState {
    Idle,
    /// Waiting for the capture device (and its permission prompt).
    Requesting,
    Listening { sample_rate: u32 },
    Stopped,
    Error(CaptureError),
}

/// Everything a detector reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorEvent {
    State(DetectorState),
    Pitch(PitchEvent),
}

/// Detection thread management structure.
#[derive(Debug)]
struct Worker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

/// Restartable microphone pitch detector.
pub struct PitchDetector<B: CaptureBackend = CpalBackend> {
    backend: Arc<B>,
    config: DetectorConfig,
    state: Arc<Mutex<DetectorState>>,
    events_tx: Sender<DetectorEvent>,
    events_rx: Receiver<DetectorEvent>,
    worker: Option<Worker>,
}

impl PitchDetector<CpalBackend> {
    /// Detector reading from the default input device.
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_backend(CpalBackend::default(), config)
    }
}

impl<B: CaptureBackend> PitchDetector<B> {
    pub fn with_backend(backend: B, config: DetectorConfig) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            backend: Arc::new(backend),
            config,
            state: Arc::new(Mutex::new(DetectorState::Idle)),
            events_tx,
            events_rx,
            worker: None,
        }
    }

    pub fn state(&self) -> DetectorState {
        lock(&self.state).clone()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Receiver for state changes and per-frame pitch events.
    pub fn events(&self) -> Receiver<DetectorEvent> {
        self.events_rx.clone()
    }

    /// Opens the capture device and starts detection.
    ///
    /// Blocks until the device is open or has failed. A failure leaves the
    /// detector in [`DetectorState::Error`] and is returned classified.
    /// Calling this while requesting or listening is refused; `stop()` first.
    ///
    /// # Returns
    /// * `Ok(())` - Listening; events follow on [`events()`](Self::events)
    /// * `Err(DetectorError::AlreadyRunning)` - A detection thread is active
    /// * `Err(DetectorError::Capture(_))` - The device could not be opened
    pub fn start(&mut self) -> Result<(), DetectorError> {
        if matches!(
            self.state(),
            DetectorState::Requesting | DetectorState::Listening { .. }
        ) {
            return Err(DetectorError::AlreadyRunning);
        }

        // A worker that ended on a stream failure is reaped before restarting.
        self.join_worker();
        transition(&self.state, &self.events_tx, DetectorState::Requesting);

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let events = self.events_tx.clone();

        let spawned = thread::Builder::new()
            .name("pitch-detector".into())
            .spawn(move || run_worker(&*backend, config, state, events, ready_tx, shutdown_rx));
        let thread_handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let err = CaptureError::Other(format!("failed to spawn detection thread: {e}"));
                transition(&self.state, &self.events_tx, DetectorState::Error(err.clone()));
                return Err(err.into());
            }
        };
        self.worker = Some(Worker {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.join_worker();
                Err(err.into())
            }
            Err(_) => {
                self.join_worker();
                let err = CaptureError::Other("detection thread exited during start".into());
                transition(&self.state, &self.events_tx, DetectorState::Error(err.clone()));
                Err(err.into())
            }
        }
    }

    /// Stops detection and releases the device.
    ///
    /// Idempotent. When it returns the detection thread has exited, so no
    /// further pitch events are produced.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.as_ref() {
            log::info!("[DETECTOR] Shutting down detection thread...");
            let _ = worker.shutdown_tx.send(());
        }
        self.join_worker();
        if self.state() != DetectorState::Stopped {
            transition(&self.state, &self.events_tx, DetectorState::Stopped);
        }
    }

    fn join_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            if let Some(handle) = worker.thread_handle.take() {
                if handle.join().is_err() {
                    log::error!("[DETECTOR] Detection thread panicked");
                }
            }
        }
    }
}

impl<B: CaptureBackend> Drop for PitchDetector<B> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

fn lock(state: &Mutex<DetectorState>) -> MutexGuard<'_, DetectorState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn transition(state: &Mutex<DetectorState>, events: &Sender<DetectorEvent>, next: DetectorState) {
    log::info!("[DETECTOR] State -> {next:?}");
    *lock(state) = next.clone();
    let _ = events.send(DetectorEvent::State(next));
}

/// Body of the detection thread.
fn run_worker(
    backend: &dyn CaptureBackend,
    config: DetectorConfig,
    state: Arc<Mutex<DetectorState>>,
    events: Sender<DetectorEvent>,
    ready_tx: Sender<Result<(), CaptureError>>,
    shutdown_rx: Receiver<()>,
) {
    log::info!("[DETECTOR] Opening capture source...");
    let mut source = match backend.open(config.frame_len) {
        Ok(source) => source,
        Err(err) => {
            log::warn!("[DETECTOR] Capture failed to start: {err}");
            transition(&state, &events, DetectorState::Error(err.clone()));
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    let sample_rate = source.sample_rate();
    transition(&state, &events, DetectorState::Listening { sample_rate });
    let _ = ready_tx.send(Ok(()));

    let ticker = crossbeam_channel::tick(config.tick_interval);
    let mut frame = vec![0.0; config.frame_len];
    loop {
        crossbeam_channel::select! {
            recv(shutdown_rx) -> _ => break,
            recv(ticker) -> _ => {
                if let Err(err) = source.read_frame(&mut frame) {
                    log::error!("[DETECTOR] Capture source failed: {err}");
                    transition(&state, &events, DetectorState::Error(err));
                    break;
                }
                let event = pitch::analyze_frame(&frame, sample_rate, &config);
                log::trace!("[DETECTOR] {event:?}");
                if events.send(DetectorEvent::Pitch(event)).is_err() {
                    break;
                }
            }
        }
    }

    // Dropping the source releases the device.
    drop(source);
    log::info!("[DETECTOR] Detection thread finished");
}
