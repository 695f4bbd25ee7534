// src/capture/level.rs

use log::debug;
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Visual refresh cadence for the level readout (~60 Hz).
pub const METER_INTERVAL_MS: u64 = 16;

/// Instantaneous input level, published lock-free as f32 bits so the UI
/// thread can poll it while the metering thread writes it.
pub struct LevelMeter {
    level_bits: Arc<AtomicU32>,
    alive: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LevelMeter {
    pub fn spawn(mut consumer: HeapCons<f32>, paused: Arc<AtomicBool>) -> Self {
        let level_bits = Arc::new(AtomicU32::new(0.0f32.to_bits()));
        let alive = Arc::new(AtomicBool::new(true));

        let bits = level_bits.clone();
        let alive_flag = alive.clone();
        let handle = thread::spawn(move || {
            while alive_flag.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(METER_INTERVAL_MS));
                // A tick scheduled before stop must do nothing after teardown.
                if !alive_flag.load(Ordering::Relaxed) {
                    break;
                }

                if paused.load(Ordering::Relaxed) {
                    // Keep the buffer empty while paused so resuming does not
                    // meter a backlog of stale audio.
                    while consumer.try_pop().is_some() {}
                    continue;
                }

                let mut peak = 0.0f32;
                let mut seen = false;
                while let Some(s) = consumer.try_pop() {
                    // A single bad reading is cosmetic; skip it.
                    if !s.is_finite() {
                        continue;
                    }
                    peak = peak.max(s.abs());
                    seen = true;
                }
                if seen {
                    bits.store(peak.min(1.0).to_bits(), Ordering::Relaxed);
                }
            }
            debug!("level meter stopped");
        });

        Self {
            level_bits,
            alive,
            handle: Some(handle),
        }
    }

    /// Current normalized level in [0, 1].
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    pub fn stop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
        self.level_bits.store(0.0f32.to_bits(), Ordering::Relaxed);
    }
}

impl Drop for LevelMeter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Producer, Split};
    use ringbuf::HeapRb;

    #[test]
    fn publishes_peak_and_skips_bad_readings() {
        let rb = HeapRb::<f32>::new(1024);
        let (mut prod, cons) = rb.split();
        let paused = Arc::new(AtomicBool::new(false));
        let mut meter = LevelMeter::spawn(cons, paused);

        prod.push_slice(&[0.1, f32::NAN, -0.6, 0.3]);
        thread::sleep(Duration::from_millis(60));
        let level = meter.level();
        assert!((level - 0.6).abs() < 1e-6, "level was {level}");

        meter.stop();
        assert_eq!(meter.level(), 0.0);
    }

    #[test]
    fn stale_tick_after_stop_is_a_noop() {
        let rb = HeapRb::<f32>::new(64);
        let (mut prod, cons) = rb.split();
        let paused = Arc::new(AtomicBool::new(false));
        let mut meter = LevelMeter::spawn(cons, paused);
        meter.stop();
        // Samples arriving after teardown must not resurrect the reading.
        prod.push_slice(&[0.9, 0.9]);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(meter.level(), 0.0);
    }
}
