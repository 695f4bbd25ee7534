// src/capture/chunker.rs

use crate::buffer::AudioChunk;
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Chunk emission cadence during recording.
pub const CHUNK_INTERVAL_MS: u64 = 100;

const POLL_MS: u64 = 5;

/// Collector thread: drains the capture ring buffer, quantizes to s16le and
/// emits one immutable chunk per interval. Runs independently of the level
/// meter's refresh loop.
pub struct Chunker {
    chunks: Arc<Mutex<Vec<AudioChunk>>>,
    samples_written: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Chunker {
    pub fn spawn(mut consumer: HeapCons<f32>) -> Self {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let samples_written = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));

        let chunks_out = chunks.clone();
        let counter = samples_written.clone();
        let run_flag = running.clone();
        let handle = thread::spawn(move || {
            let mut tmp = vec![0.0f32; 8192];
            let mut pending: Vec<u8> = Vec::new();
            let mut start_sample = 0u64;
            let mut last_emit = Instant::now();

            loop {
                let stopping = !run_flag.load(Ordering::Relaxed);

                loop {
                    let popped = consumer.pop_slice(tmp.as_mut_slice());
                    if popped == 0 {
                        break;
                    }
                    for &s in &tmp[..popped] {
                        let v = if s.is_finite() {
                            (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                        } else {
                            0i16
                        };
                        pending.extend_from_slice(&v.to_le_bytes());
                    }
                    counter.fetch_add(popped as u64, Ordering::Relaxed);
                }

                let due = last_emit.elapsed().as_millis() as u64 >= CHUNK_INTERVAL_MS;
                if (due || stopping) && !pending.is_empty() {
                    let bytes = std::mem::take(&mut pending);
                    let emitted = (bytes.len() / 2) as u64;
                    if let Ok(mut out) = chunks_out.lock() {
                        out.push(AudioChunk::new(bytes, start_sample));
                    }
                    start_sample += emitted;
                    last_emit = Instant::now();
                }

                if stopping {
                    break;
                }
                thread::sleep(Duration::from_millis(POLL_MS));
            }
        });

        Self {
            chunks,
            samples_written,
            running,
            handle: Some(handle),
        }
    }

    /// Interleaved samples collected so far; drives the elapsed-time readout.
    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::Relaxed)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Stop collection, flush the final partial chunk and hand back the
    /// ordered chunk sequence.
    pub fn stop(mut self) -> (Vec<AudioChunk>, u64) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
        let chunks = self
            .chunks
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default();
        let samples = self.samples_written.load(Ordering::Relaxed);
        (chunks, samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Producer, Split};
    use ringbuf::HeapRb;

    #[test]
    fn emits_ordered_chunks_and_counts_samples() {
        let rb = HeapRb::<f32>::new(65536);
        let (mut prod, cons) = rb.split();
        let chunker = Chunker::spawn(cons);

        // Three bursts ~100 ms apart.
        for _ in 0..3 {
            let block = vec![0.25f32; 800];
            prod.push_slice(&block);
            thread::sleep(Duration::from_millis(110));
        }

        assert!(chunker.chunk_count() >= 2);
        let (chunks, samples) = chunker.stop();
        assert_eq!(samples, 2400);
        assert!(chunks.len() >= 3);

        let total_bytes: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total_bytes, 2400 * 2);

        // Chunk start offsets are contiguous in arrival order.
        let mut expected = 0u64;
        for c in &chunks {
            assert_eq!(c.start_sample, expected);
            expected += (c.len() / 2) as u64;
        }
    }

    #[test]
    fn stop_flushes_partial_chunk() {
        let rb = HeapRb::<f32>::new(4096);
        let (mut prod, cons) = rb.split();
        let chunker = Chunker::spawn(cons);
        prod.push_slice(&[0.5f32; 100]);
        thread::sleep(Duration::from_millis(20));
        let (chunks, samples) = chunker.stop();
        assert_eq!(samples, 100);
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 200);
    }
}
