// src/lib.rs

pub mod buffer;
pub mod capture;
pub mod decode;
pub mod effects;
pub mod error;
pub mod export;
pub mod waveform;

pub use buffer::{AudioChunk, CapturedBuffer};
pub use capture::{CaptureConfig, CaptureSession, RecordingState};
pub use effects::{EffectKind, EffectNode, EffectsGraph};
pub use error::{CoreError, DeviceError};
pub use export::{ExportPipeline, ExportSettings};
pub use waveform::WaveformData;
