// src/capture/mod.rs

pub mod chunker;
pub mod duration;
pub mod input;
pub mod level;
pub mod source;

pub use source::{CaptureConfig, CaptureSource};

use crate::buffer::{AudioChunk, CapturedBuffer};
use crate::capture::{chunker::Chunker, input::MicInput, level::LevelMeter};
use crate::effects::SourceBinding;
use crate::error::{CoreError, DeviceError};
use log::{debug, info, warn};
use ringbuf::traits::Split;
use ringbuf::{HeapProd, HeapRb};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One capture device in the whole process. A session that fails to claim it
/// fails fast instead of stealing the device from the active one.
static DEVICE_CLAIM: AtomicBool = AtomicBool::new(false);

const RING_CAPACITY: usize = 192_000;
const METER_CAPACITY: usize = 48_000;

/// Recording lifecycle. Recording and Paused are freely reversible; Stopped
/// is terminal for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

/// Owns the microphone for one recording: device handle, chunk collection
/// and level telemetry. Produces a [`CapturedBuffer`] on stop.
pub struct CaptureSession {
    state: RecordingState,
    paused: Arc<AtomicBool>,
    source: Option<Box<dyn CaptureSource>>,
    chunker: Option<Chunker>,
    meter: Option<LevelMeter>,
    sample_rate: u32,
    channels: usize,
    final_samples: u64,
    holds_claim: bool,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            paused: Arc::new(AtomicBool::new(false)),
            source: None,
            chunker: None,
            meter: None,
            sample_rate: 0,
            channels: 0,
            final_samples: 0,
            holds_claim: false,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Start recording from the default microphone.
    pub fn start(&mut self, config: CaptureConfig) -> Result<(), CoreError> {
        self.start_with(move |paused, rec, meter| {
            MicInput::open(&config, paused, rec, meter)
                .map(|(mic, ch, sr)| (Box::new(mic) as Box<dyn CaptureSource>, ch, sr))
        })
    }

    /// Start recording from an arbitrary source. The factory receives the
    /// session's pause flag and the two sample producers, and returns the
    /// live source handle plus its negotiated channel count and sample rate.
    pub fn start_with<F>(&mut self, open: F) -> Result<(), CoreError>
    where
        F: FnOnce(
            Arc<AtomicBool>,
            HeapProd<f32>,
            HeapProd<f32>,
        ) -> Result<(Box<dyn CaptureSource>, usize, u32), CoreError>,
    {
        if self.state != RecordingState::Idle {
            return Err(CoreError::InvalidState("start requires an idle session"));
        }
        if DEVICE_CLAIM
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DeviceError::AlreadyInUse.into());
        }

        let rb_rec = HeapRb::<f32>::new(RING_CAPACITY);
        let (prod_rec, cons_rec) = rb_rec.split();
        let rb_meter = HeapRb::<f32>::new(METER_CAPACITY);
        let (prod_meter, cons_meter) = rb_meter.split();

        self.paused.store(false, Ordering::Relaxed);

        match open(self.paused.clone(), prod_rec, prod_meter) {
            Ok((source, channels, sample_rate)) => {
                self.chunker = Some(Chunker::spawn(cons_rec));
                self.meter = Some(LevelMeter::spawn(cons_meter, self.paused.clone()));
                self.source = Some(source);
                self.channels = channels;
                self.sample_rate = sample_rate;
                self.holds_claim = true;
                self.state = RecordingState::Recording;
                info!("recording started: {channels} ch @ {sample_rate} Hz");
                Ok(())
            }
            Err(e) => {
                DEVICE_CLAIM.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Halt chunking and metering without releasing the device. A no-op
    /// unless currently recording.
    pub fn pause(&mut self) {
        if self.state == RecordingState::Recording {
            self.paused.store(true, Ordering::Relaxed);
            self.state = RecordingState::Paused;
            debug!("recording paused");
        }
    }

    /// A no-op unless currently paused.
    pub fn resume(&mut self) {
        if self.state == RecordingState::Paused {
            self.paused.store(false, Ordering::Relaxed);
            self.state = RecordingState::Recording;
            debug!("recording resumed");
        }
    }

    /// Finalize the recording, release the device and resolve the buffer's
    /// duration. An unresolved duration is left as `None` on the buffer and
    /// logged; it is never defaulted to zero.
    pub fn stop(&mut self) -> Result<CapturedBuffer, CoreError> {
        if !matches!(
            self.state,
            RecordingState::Recording | RecordingState::Paused
        ) {
            return Err(CoreError::InvalidState("stop requires an active recording"));
        }
        let (chunks, samples) = self.teardown_pipeline();
        self.state = RecordingState::Stopped;
        info!(
            "recording stopped: {} chunks, {} samples",
            chunks.len(),
            samples
        );

        let mut buffer =
            CapturedBuffer::from_chunks(&chunks, self.sample_rate, self.channels as u16);
        let wav = buffer.to_wav_bytes()?;
        match duration::resolve(&wav) {
            Ok((secs, strategy)) => {
                debug!("duration {secs:.3}s via {strategy:?}");
                buffer.set_duration(secs);
            }
            Err(_) => {
                warn!("duration unresolved after all strategies; re-attempt capture");
            }
        }
        Ok(buffer)
    }

    /// Stop if active, discard any collected audio and return to Idle.
    pub fn reset(&mut self) {
        if matches!(
            self.state,
            RecordingState::Recording | RecordingState::Paused
        ) {
            let _ = self.teardown_pipeline();
        }
        self.paused.store(false, Ordering::Relaxed);
        self.state = RecordingState::Idle;
        self.sample_rate = 0;
        self.channels = 0;
        self.final_samples = 0;
    }

    /// Recording time based on collected samples and the input format, so it
    /// naturally halts while paused. After stop the final count is retained,
    /// so the readout stays valid in the Stopped state.
    pub fn elapsed(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let samples = match &self.chunker {
            Some(chunker) => chunker.samples_written(),
            None => self.final_samples,
        };
        let frames = samples as f64 / self.channels as f64;
        Duration::from_secs_f64(frames / self.sample_rate as f64)
    }

    /// Current input level in [0, 1]; 0 when no metering is running.
    pub fn level(&self) -> f32 {
        self.meter.as_ref().map(|m| m.level()).unwrap_or(0.0)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunker.as_ref().map(|c| c.chunk_count()).unwrap_or(0)
    }

    /// The live-source description an effects graph binds to, available while
    /// the device is held.
    pub fn source_binding(&self) -> Option<SourceBinding> {
        self.source.as_ref().map(|s| SourceBinding {
            sample_rate: s.sample_rate(),
            channels: s.channels(),
        })
    }

    fn teardown_pipeline(&mut self) -> (Vec<AudioChunk>, u64) {
        // Dropping the source stops the device callback before the collector
        // threads drain their buffers.
        self.source = None;
        if let Some(mut meter) = self.meter.take() {
            meter.stop();
        }
        let out = match self.chunker.take() {
            Some(chunker) => chunker.stop(),
            None => (Vec::new(), 0),
        };
        self.final_samples = out.1;
        if self.holds_claim {
            DEVICE_CLAIM.store(false, Ordering::Release);
            self.holds_claim = false;
        }
        out
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if matches!(
            self.state,
            RecordingState::Recording | RecordingState::Paused
        ) {
            let _ = self.teardown_pipeline();
        }
    }
}
