// src/waveform/mod.rs

use crate::decode;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Fixed number of peak bars in every waveform.
pub const WAVEFORM_BARS: usize = 200;

/// Fraction of the raw level used as the base height of live bars.
const LIVE_BASE_SCALE: f32 = 0.8;
const LIVE_VARIATION: f32 = 0.2;

/// Static waveform summary: one peak per bar plus the decoded duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformData {
    pub peaks: Vec<f32>,
    pub duration: f64,
}

/// Reduce a decodable buffer to [`WAVEFORM_BARS`] peak bars.
///
/// Channel 0 is partitioned into equal-width blocks and each bar is the
/// maximum absolute sample in its block. Pure function of the input bytes.
pub fn compute_static_waveform(encoded: &[u8]) -> Result<WaveformData, CoreError> {
    let decoded = decode::decode_bytes(encoded)?;
    let channels = decoded.channels.max(1);
    let frames = decoded.frames();

    let mut peaks = Vec::with_capacity(WAVEFORM_BARS);
    for bar in 0..WAVEFORM_BARS {
        let start = bar * frames / WAVEFORM_BARS;
        let end = (bar + 1) * frames / WAVEFORM_BARS;
        let mut max = 0.0f32;
        for frame in start..end {
            let s = decoded.samples[frame * channels].abs();
            if s > max {
                max = s;
            }
        }
        peaks.push(max.min(1.0));
    }

    Ok(WaveformData {
        peaks,
        duration: decoded.duration_secs(),
    })
}

/// Synthesize animated bars from the instantaneous level while no decoded
/// signal exists yet. `phase_ms` is the caller's clock reading, so the output
/// is a pure function of its inputs. Cosmetic only; never persist or export
/// these bars.
pub fn synthesize_live_bars(level: f32, phase_ms: f64) -> Vec<f32> {
    let base = level.clamp(0.0, 1.0) * LIVE_BASE_SCALE;
    (0..WAVEFORM_BARS)
        .map(|i| {
            let variation = ((phase_ms / 100.0) + i as f64 * 0.1).sin() as f32 * LIVE_VARIATION;
            (base + variation).clamp(0.0, 1.0)
        })
        .collect()
}

/// Shade of one drawn bar relative to the playhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarShade {
    Played,
    Unplayed,
    Recording,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawBar {
    pub index: usize,
    pub height: f32,
    pub shade: BarShade,
}

/// Draw instructions for one frame: the bars plus an optional playhead
/// position as a fraction of the total width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawList {
    pub bars: Vec<DrawBar>,
    pub playhead: Option<f32>,
}

/// Map peaks and a playback position to draw instructions. Side-effect-free
/// with respect to audio state.
pub fn render(peaks: &[f32], playhead_secs: f64, total_secs: f64, recording: bool) -> DrawList {
    let progress = if total_secs > 0.0 {
        (playhead_secs / total_secs).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let bars = peaks
        .iter()
        .enumerate()
        .map(|(index, &peak)| {
            let shade = if recording {
                BarShade::Recording
            } else if (index as f64) / (peaks.len().max(1) as f64) <= progress {
                BarShade::Played
            } else {
                BarShade::Unplayed
            };
            DrawBar {
                index,
                height: peak.clamp(0.0, 1.0),
                shade,
            }
        })
        .collect();

    let playhead = (!recording && total_secs > 0.0).then_some(progress as f32);

    DrawList { bars, playhead }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::io::Cursor;

    fn wav_from_samples(samples: &[f32], sample_rate: u32) -> Vec<u8> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut out = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut out), spec).unwrap();
            for &s in samples {
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        out
    }

    #[test]
    fn static_waveform_is_deterministic_with_fixed_length() {
        let samples: Vec<f32> = (0..8000)
            .map(|i| ((i as f32 / 8000.0) * 2.0 - 1.0) * 0.7)
            .collect();
        let wav = wav_from_samples(&samples, 8000);

        let a = compute_static_waveform(&wav).unwrap();
        let b = compute_static_waveform(&wav).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.peaks.len(), WAVEFORM_BARS);
        assert!((a.duration - 1.0).abs() < 1e-6);
    }

    #[test]
    fn peaks_follow_signal_envelope() {
        // Silence in the first half, loud in the second.
        let mut samples = vec![0.0f32; 4000];
        samples.extend(std::iter::repeat(0.9).take(4000));
        let wav = wav_from_samples(&samples, 8000);

        let data = compute_static_waveform(&wav).unwrap();
        assert!(data.peaks[10] < 0.05);
        assert!(data.peaks[150] > 0.8);
    }

    #[test]
    fn invalid_audio_is_a_decode_error() {
        assert!(matches!(
            compute_static_waveform(&[0u8; 64]),
            Err(CoreError::Decode(_))
        ));
    }

    #[test]
    fn live_bars_are_pure_and_clamped() {
        let a = synthesize_live_bars(0.5, 1234.0);
        let b = synthesize_live_bars(0.5, 1234.0);
        assert_eq!(a, b);
        assert_eq!(a.len(), WAVEFORM_BARS);
        assert!(a.iter().all(|&v| (0.0..=1.0).contains(&v)));

        // Phase moves the animation.
        let c = synthesize_live_bars(0.5, 1534.0);
        assert_ne!(a, c);
    }

    #[test]
    fn render_splits_bars_at_playhead() {
        let peaks = vec![0.5f32; 10];
        let list = render(&peaks, 5.0, 10.0, false);
        let played = list
            .bars
            .iter()
            .filter(|b| b.shade == BarShade::Played)
            .count();
        assert_eq!(played, 6); // indices 0..=5
        assert!((list.playhead.unwrap() - 0.5).abs() < 1e-6);

        let live = render(&peaks, 0.0, 0.0, true);
        assert!(live.bars.iter().all(|b| b.shade == BarShade::Recording));
        assert!(live.playhead.is_none());
    }
}
