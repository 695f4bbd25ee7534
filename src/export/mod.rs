// src/export/mod.rs
//
// Job-oriented offline export: each submission runs on its own worker thread
// through decode, resample, normalize, fade and encode, reporting progress
// into a shared job history.

pub mod dsp;
pub mod encode;

use crate::buffer::CapturedBuffer;
use crate::decode;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use dsp::PcmBuffer;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
        }
    }

    /// Only WAV has a native encoder; the rest degrade to the uncompressed
    /// container with a warning on the job.
    pub fn natively_encodable(&self) -> bool {
        matches!(self, Self::Wav)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
    Lossless,
}

/// Per-format quality presets. Bitrate applies to the compressed formats,
/// bit depth to the PCM ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    pub sample_rate: u32,
    pub bit_depth: Option<u16>,
    pub bitrate_kbps: Option<u32>,
}

pub fn quality_preset(format: ExportFormat, tier: QualityTier) -> QualityPreset {
    use ExportFormat::*;
    use QualityTier::*;

    let (sample_rate, bit_depth, bitrate_kbps) = match (format, tier) {
        (Mp3, Low) => (44100, None, Some(128)),
        (Mp3, Medium) => (44100, None, Some(192)),
        (Mp3, High) => (44100, None, Some(320)),
        (Mp3, Lossless) => (48000, None, Some(320)),
        (Wav | Flac, Low) => (44100, Some(16), None),
        (Wav | Flac, Medium) => (48000, Some(16), None),
        (Wav | Flac, High) => (48000, Some(24), None),
        (Wav | Flac, Lossless) => (96000, Some(24), None),
        (Ogg, Low) => (44100, None, Some(128)),
        (Ogg, Medium) => (44100, None, Some(192)),
        (Ogg, High) => (48000, None, Some(256)),
        (Ogg, Lossless) => (48000, None, Some(320)),
    };
    QualityPreset {
        sample_rate,
        bit_depth,
        bitrate_kbps,
    }
}

/// Descriptive tags carried with a job. Never validated against anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub format: ExportFormat,
    pub quality: QualityTier,
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub normalize: bool,
    pub fade_in_secs: f32,
    pub fade_out_secs: f32,
    pub metadata: ExportMetadata,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Mp3,
            quality: QualityTier::High,
            sample_rate: 44100,
            bit_depth: 16,
            normalize: true,
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
            metadata: ExportMetadata::default(),
        }
    }
}

impl ExportSettings {
    /// Settings with sample rate and bit depth taken from the quality table.
    pub fn from_preset(format: ExportFormat, quality: QualityTier) -> Self {
        let preset = quality_preset(format, quality);
        Self {
            format,
            quality,
            sample_rate: preset.sample_rate,
            bit_depth: preset.bit_depth.unwrap_or(16),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Finished output: encoded bytes plus a filename suggestion. The extension
/// reflects the requested format even when the bytes are the uncompressed
/// fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

#[derive(Debug, Clone)]
pub struct ExportJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub settings: ExportSettings,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub artifact: Option<ExportArtifact>,
    pub error: Option<String>,
    pub fallback_applied: bool,
}

/// Job queue and history. Each submitted job runs on its own thread; a slow
/// job never blocks submission or progress reporting of another.
#[derive(Default)]
pub struct ExportPipeline {
    jobs: Arc<Mutex<Vec<ExportJob>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ExportPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a job for an encoded source buffer and return immediately.
    pub fn submit(&self, encoded: Vec<u8>, settings: ExportSettings) -> Uuid {
        let id = Uuid::new_v4();
        let job = ExportJob {
            id,
            status: JobStatus::Pending,
            progress: 0,
            settings: settings.clone(),
            created_at: Utc::now(),
            completed_at: None,
            artifact: None,
            error: None,
            fallback_applied: false,
        };
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(0, job);
        }
        info!("export job {id} submitted ({:?})", settings.format);

        let jobs = self.jobs.clone();
        let handle = thread::spawn(move || run_job(jobs, id, encoded, settings));
        if let Ok(mut handles) = self.handles.lock() {
            // Long-lived pipelines submit indefinitely; drop the handles of
            // workers that already exited so the list stays bounded.
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }
        id
    }

    /// Submit a completed capture, wrapping its PCM in the native container
    /// so the worker can decode it.
    pub fn submit_capture(
        &self,
        buffer: &CapturedBuffer,
        settings: ExportSettings,
    ) -> Result<Uuid, CoreError> {
        let encoded = buffer.to_wav_bytes()?;
        Ok(self.submit(encoded, settings))
    }

    /// Snapshot of one job.
    pub fn job(&self, id: Uuid) -> Option<ExportJob> {
        self.jobs
            .lock()
            .ok()
            .and_then(|jobs| jobs.iter().find(|j| j.id == id).cloned())
    }

    /// Snapshot of the whole history, newest first.
    pub fn jobs(&self) -> Vec<ExportJob> {
        self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
    }

    /// Remove a job from history, releasing its artifact. Removal of an
    /// in-flight job is best-effort cancellation: the worker notices at its
    /// next checkpoint and discards its output.
    pub fn remove_job(&self, id: Uuid) -> bool {
        let Ok(mut jobs) = self.jobs.lock() else {
            return false;
        };
        let before = jobs.len();
        jobs.retain(|j| j.id != id);
        before != jobs.len()
    }

    /// Drop every Completed and Failed job, keeping pending and in-flight
    /// ones.
    pub fn clear_completed(&self) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.retain(|j| matches!(j.status, JobStatus::Pending | JobStatus::Processing));
        }
    }

    /// Block until every worker spawned so far has finished.
    pub fn wait_idle(&self) {
        let handles = match self.handles.lock() {
            Ok(mut h) => std::mem::take(&mut *h),
            Err(_) => return,
        };
        for handle in handles {
            let _ = handle.join();
        }
    }
}

/// Record a progress checkpoint. Returns false if the job has been removed,
/// which tells the worker to stop and discard its work.
fn checkpoint(jobs: &Arc<Mutex<Vec<ExportJob>>>, id: Uuid, progress: u8) -> bool {
    let Ok(mut jobs) = jobs.lock() else {
        return false;
    };
    match jobs.iter_mut().find(|j| j.id == id) {
        Some(job) => {
            job.status = JobStatus::Processing;
            // Progress only moves forward.
            job.progress = job.progress.max(progress);
            true
        }
        None => false,
    }
}

fn fail(jobs: &Arc<Mutex<Vec<ExportJob>>>, id: Uuid, message: String) {
    warn!("export job {id} failed: {message}");
    if let Ok(mut jobs) = jobs.lock() {
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
            job.status = JobStatus::Failed;
            job.error = Some(message);
            job.completed_at = Some(Utc::now());
        }
    }
}

fn run_job(jobs: Arc<Mutex<Vec<ExportJob>>>, id: Uuid, encoded: Vec<u8>, settings: ExportSettings) {
    if !checkpoint(&jobs, id, 10) {
        return;
    }

    let decoded = match decode::decode_bytes(&encoded) {
        Ok(d) => d,
        Err(e) => return fail(&jobs, id, e.to_string()),
    };
    if !checkpoint(&jobs, id, 30) {
        return;
    }

    let mut pcm = PcmBuffer::from_decoded(&decoded).resample_linear(settings.sample_rate);
    if settings.normalize {
        pcm.normalize();
    }
    pcm.apply_fades(settings.fade_in_secs, settings.fade_out_secs);
    if !checkpoint(&jobs, id, 60) {
        return;
    }

    let fallback = !settings.format.natively_encodable();
    // Compressed targets take the 16-bit PCM path; WAV keeps the requested
    // depth.
    let bit_depth = match settings.format {
        ExportFormat::Wav | ExportFormat::Flac => settings.bit_depth,
        ExportFormat::Mp3 | ExportFormat::Ogg => 16,
    };
    if fallback {
        warn!(
            "export job {id}: no {} encoder, writing uncompressed audio instead",
            settings.format.extension()
        );
    }

    let bytes = match encode::encode_wav(&pcm, bit_depth) {
        Ok(b) => b,
        Err(e) => return fail(&jobs, id, e.to_string()),
    };
    if !checkpoint(&jobs, id, 90) {
        return;
    }

    let Ok(mut jobs) = jobs.lock() else { return };
    if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
        let file_name = format!(
            "export-{}.{}",
            job.created_at.timestamp_millis(),
            settings.format.extension()
        );
        job.artifact = Some(ExportArtifact { bytes, file_name });
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.fallback_applied = fallback;
        job.completed_at = Some(Utc::now());
    }
}
