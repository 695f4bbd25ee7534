// src/capture/duration.rs

use crate::decode;
use crate::error::CoreError;

/// Nominal bitrate assumed by the size-based estimate (last resort only).
pub const NOMINAL_BITRATE_BPS: f64 = 128_000.0;

/// Size-based estimates outside (0, 3600] seconds are rejected.
const MAX_ESTIMATE_SECS: f64 = 3600.0;

/// Which strategy produced the resolved duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationStrategy {
    ContainerMetadata,
    FullDecode,
    BitrateEstimate,
}

/// Resolve the duration of an encoded buffer, trying three strategies in
/// order: container metadata, full decode, then a byte-size estimate at the
/// nominal bitrate. Exhausting all three yields `DurationUnresolved`; the
/// result is never coerced to zero.
pub fn resolve(encoded: &[u8]) -> Result<(f64, DurationStrategy), CoreError> {
    if let Some(secs) = decode::probe_duration_secs(encoded) {
        return Ok((secs, DurationStrategy::ContainerMetadata));
    }

    if let Ok(decoded) = decode::decode_bytes(encoded) {
        let secs = decoded.duration_secs();
        if secs.is_finite() && secs > 0.0 {
            return Ok((secs, DurationStrategy::FullDecode));
        }
    }

    let estimate = encoded.len() as f64 * 8.0 / NOMINAL_BITRATE_BPS;
    if estimate > 0.0 && estimate <= MAX_ESTIMATE_SECS {
        return Ok((estimate, DurationStrategy::BitrateEstimate));
    }

    Err(CoreError::DurationUnresolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::io::Cursor;

    fn sine_wav(secs: f64, sample_rate: u32) -> Vec<u8> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut out = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut out), spec).unwrap();
            for i in 0..(secs * sample_rate as f64) as usize {
                let t = i as f32 / sample_rate as f32;
                let s = (2.0 * std::f32::consts::PI * 220.0 * t).sin() * 0.4;
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        out
    }

    #[test]
    fn container_metadata_resolves_within_five_percent() {
        for secs in [0.5, 2.0, 7.5] {
            let wav = sine_wav(secs, 8000);
            let (resolved, strategy) = resolve(&wav).unwrap();
            assert_eq!(strategy, DurationStrategy::ContainerMetadata);
            assert!((resolved - secs).abs() / secs < 0.05, "{resolved} vs {secs}");
        }
    }

    #[test]
    fn sub_second_durations_are_accepted() {
        let wav = sine_wav(0.2, 8000);
        let (resolved, _) = resolve(&wav).unwrap();
        assert!(resolved > 0.0 && resolved < 0.3);
    }

    #[test]
    fn undecodable_bytes_fall_through_to_bitrate_estimate() {
        let opaque = vec![0x55u8; 16_000]; // 16 kB at 128 kbps ~= 1 s
        let (resolved, strategy) = resolve(&opaque).unwrap();
        assert_eq!(strategy, DurationStrategy::BitrateEstimate);
        assert!((resolved - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_is_unresolved() {
        assert!(matches!(
            resolve(&[]),
            Err(CoreError::DurationUnresolved)
        ));
    }
}
