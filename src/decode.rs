// src/decode.rs

use crate::error::CoreError;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::default::{get_codecs, get_probe};

/// Fully decoded PCM, interleaved f32 in [-1, 1].
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Probe the container for a declared duration without decoding the signal.
/// Returns `None` when the container does not declare frame count and rate.
pub fn probe_duration_secs(bytes: &[u8]) -> Option<f64> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let probed = get_probe()
        .format(
            &Default::default(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;
    let track = probed.format.default_track()?;
    let n_frames = track.codec_params.n_frames?;
    let rate = track.codec_params.sample_rate?;
    if rate == 0 {
        return None;
    }
    let secs = n_frames as f64 / rate as f64;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

/// Decode an encoded byte buffer to interleaved f32 PCM.
///
/// Packets whose channel layout differs from the first decoded packet are
/// up/down-mixed for the mono/stereo cases and skipped otherwise.
pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedAudio, CoreError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let probed = get_probe()
        .format(
            &Default::default(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| CoreError::Decode(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| CoreError::Decode("no audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut sample_rate = codec_params.sample_rate.unwrap_or(44100);
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);
    let mut decoder = get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| CoreError::Decode(e.to_string()))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut first_packet = true;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break,
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };

        let spec = decoded.spec();
        let current_channels = spec.channels.count();
        if first_packet {
            if decoded.frames() == 0 {
                continue;
            }
            sample_rate = spec.rate;
            channels = current_channels;
            first_packet = false;
        }

        if sample_buf.is_none()
            || sample_buf.as_ref().map(|b| b.capacity()).unwrap_or(0) < decoded.capacity()
        {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, *spec));
        }
        let buf = match sample_buf.as_mut() {
            Some(b) => b,
            None => continue,
        };
        buf.copy_interleaved_ref(decoded);
        let packet_samples = buf.samples();

        if current_channels == channels {
            samples.extend_from_slice(packet_samples);
        } else if current_channels == 1 && channels == 2 {
            for &s in packet_samples {
                samples.push(s);
                samples.push(s);
            }
        } else if current_channels == 2 && channels == 1 {
            for pair in packet_samples.chunks_exact(2) {
                samples.push((pair[0] + pair[1]) * 0.5);
            }
        }
    }

    if samples.is_empty() {
        return Err(CoreError::Decode("no decodable audio".into()));
    }

    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::io::Cursor;

    fn sine_wav_bytes(secs: f64, sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut out = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut out), spec).unwrap();
            let frames = (secs * sample_rate as f64) as usize;
            for i in 0..frames {
                let t = i as f32 / sample_rate as f32;
                let s = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
                for _ in 0..channels {
                    writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        out
    }

    #[test]
    fn decodes_wav_round_trip() {
        let bytes = sine_wav_bytes(0.25, 8000, 1);
        let decoded = decode_bytes(&bytes).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.frames(), 2000);
        assert!((decoded.duration_secs() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn probe_reads_declared_duration() {
        let bytes = sine_wav_bytes(1.5, 8000, 2);
        let secs = probe_duration_secs(&bytes).unwrap();
        assert!((secs - 1.5).abs() < 0.01);
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let garbage = vec![0xABu8; 1024];
        assert!(matches!(
            decode_bytes(&garbage),
            Err(CoreError::Decode(_))
        ));
        assert!(probe_duration_secs(&garbage).is_none());
    }
}
