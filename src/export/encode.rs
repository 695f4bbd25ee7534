// src/export/encode.rs

use crate::error::CoreError;
use crate::export::dsp::PcmBuffer;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

const I24_MAX: f32 = 8_388_607.0;

/// Encode planar PCM into an in-memory WAV container at the requested bit
/// depth: 16-bit signed, 24-bit signed packed, or 32-bit float.
pub fn encode_wav(pcm: &PcmBuffer, bit_depth: u16) -> Result<Vec<u8>, CoreError> {
    let sample_format = match bit_depth {
        16 | 24 => SampleFormat::Int,
        32 => SampleFormat::Float,
        other => {
            return Err(CoreError::ExportFailed(format!(
                "unsupported bit depth {other}"
            )))
        }
    };

    let spec = WavSpec {
        channels: pcm.channels.len() as u16,
        sample_rate: pcm.sample_rate,
        bits_per_sample: bit_depth,
        sample_format,
    };

    let mut out = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut out), spec)
            .map_err(|e| CoreError::ExportFailed(e.to_string()))?;

        for sample in pcm.interleave() {
            let clamped = sample.clamp(-1.0, 1.0);
            let result = match bit_depth {
                16 => writer.write_sample((clamped * i16::MAX as f32).round() as i16),
                24 => writer.write_sample((clamped * I24_MAX).round() as i32),
                _ => writer.write_sample(clamped),
            };
            result.map_err(|e| CoreError::ExportFailed(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| CoreError::ExportFailed(e.to_string()))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;

    fn ramp_buffer(sample_rate: u32) -> PcmBuffer {
        let samples: Vec<f32> = (0..256).map(|i| (i as f32 / 128.0) - 1.0).collect();
        PcmBuffer {
            channels: vec![samples],
            sample_rate,
        }
    }

    #[test]
    fn sixteen_bit_round_trip_within_quantization_error() {
        let pcm = ramp_buffer(8000);
        let wav = encode_wav(&pcm, 16).unwrap();

        let decoded = decode::decode_bytes(&wav).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.frames(), 256);
        for (orig, out) in pcm.channels[0].iter().zip(&decoded.samples) {
            assert!((orig - out).abs() < 2.0 / 32768.0, "{orig} vs {out}");
        }
    }

    #[test]
    fn header_declares_requested_bit_depth() {
        let pcm = ramp_buffer(44100);
        for depth in [16u16, 24, 32] {
            let wav = encode_wav(&pcm, depth).unwrap();
            assert_eq!(&wav[..4], b"RIFF");
            assert_eq!(&wav[8..12], b"WAVE");
            // Bits-per-sample field at offset 34.
            assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), depth);
        }
    }

    #[test]
    fn unsupported_bit_depth_is_an_export_error() {
        let pcm = ramp_buffer(8000);
        assert!(matches!(
            encode_wav(&pcm, 12),
            Err(CoreError::ExportFailed(_))
        ));
    }

    #[test]
    fn stereo_frames_stay_interleaved() {
        let pcm = PcmBuffer {
            channels: vec![vec![0.5; 64], vec![-0.5; 64]],
            sample_rate: 8000,
        };
        let wav = encode_wav(&pcm, 16).unwrap();
        let decoded = decode::decode_bytes(&wav).unwrap();
        assert_eq!(decoded.channels, 2);
        for frame in decoded.samples.chunks(2) {
            assert!(frame[0] > 0.0 && frame[1] < 0.0);
        }
    }
}
