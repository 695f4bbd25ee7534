// src/capture/source.rs

use serde::{Deserialize, Serialize};

/// Parameters requested from the capture device. The processing toggles are
/// hints to the host audio stack; the device reports the format it actually
/// negotiated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Seam between the session and whatever feeds it samples.
///
/// A source is constructed with the session's shared `paused` flag and two
/// sample producers (chunking and metering); it pushes interleaved f32 while
/// unpaused and stops feeding when dropped. The session keeps the boxed
/// source alive for the lifetime of the recording.
pub trait CaptureSource {
    fn channels(&self) -> usize;
    fn sample_rate(&self) -> u32;
}
