// src/buffer.rs

use crate::error::CoreError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Remote AI transformation accepts inputs in this window only. The check is
/// enforced by the caller submitting to that service; the core just reports.
pub const TRANSFORM_MIN_SECS: f64 = 0.5;
pub const TRANSFORM_MAX_SECS: f64 = 10.1;

/// One slice of raw PCM (s16le interleaved) emitted on the 100 ms chunk
/// timer during recording. Chunks are immutable once emitted; concatenating
/// them in arrival order reconstructs the full recording.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    bytes: Vec<u8>,
    /// Interleaved sample index at which this chunk starts.
    pub start_sample: u64,
}

impl AudioChunk {
    pub fn new(bytes: Vec<u8>, start_sample: u64) -> Self {
        Self { bytes, start_sample }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A completed recording: the concatenation of all chunks plus the capture
/// format and the resolved duration.
///
/// `duration` stays `None` until one of the resolution strategies succeeds.
/// An unresolved duration is a distinct state; it is never defaulted to zero
/// for downstream duration-gated logic.
#[derive(Debug, Clone)]
pub struct CapturedBuffer {
    pcm: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    duration: Option<f64>,
}

impl CapturedBuffer {
    pub fn from_chunks(chunks: &[AudioChunk], sample_rate: u32, channels: u16) -> Self {
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        let mut pcm = Vec::with_capacity(total);
        for chunk in chunks {
            pcm.extend_from_slice(chunk.bytes());
        }
        Self {
            pcm,
            sample_rate,
            channels,
            duration: None,
        }
    }

    /// Raw s16le interleaved PCM without any container framing.
    pub fn pcm_bytes(&self) -> &[u8] {
        &self.pcm
    }

    /// Resolved duration in seconds, or `None` when all resolution
    /// strategies failed.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub(crate) fn set_duration(&mut self, secs: f64) {
        self.duration = Some(secs);
    }

    /// Whether a resolved duration satisfies the remote transformation
    /// service's input window. `None` means the duration is unresolved and
    /// the caller cannot make this decision yet.
    pub fn transform_eligible(&self) -> Option<bool> {
        self.duration
            .map(|d| (TRANSFORM_MIN_SECS..=TRANSFORM_MAX_SECS).contains(&d))
    }

    /// Number of per-channel frames in the recording.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.pcm.len() / 2 / self.channels as usize
    }

    /// Wraps the PCM in a standard WAV container so the buffer can be fed to
    /// any decoder (waveform analysis, duration probing, export).
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut out = Vec::with_capacity(44 + self.pcm.len());
        {
            let cursor = Cursor::new(&mut out);
            let mut writer =
                WavWriter::new(cursor, spec).map_err(|e| CoreError::Decode(e.to_string()))?;
            for pair in self.pcm.chunks_exact(2) {
                let sample = i16::from_le_bytes([pair[0], pair[1]]);
                writer
                    .write_sample(sample)
                    .map_err(|e| CoreError::Decode(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| CoreError::Decode(e.to_string()))?;
        }
        Ok(out)
    }
}
