// src/export/dsp.rs
//
// Offline sample processing for export jobs: resample, normalize, fade.
// Planar layout so each stage walks one channel at a time.

use crate::decode::DecodedAudio;

/// Normalization target peak.
const NORMALIZE_PEAK: f32 = 0.95;

/// De-interleaved PCM with one `Vec<f32>` per channel.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl PcmBuffer {
    pub fn from_decoded(decoded: &DecodedAudio) -> Self {
        let ch = decoded.channels.max(1);
        let frames = decoded.frames();
        let mut channels = vec![Vec::with_capacity(frames); ch];
        for frame in decoded.samples.chunks(ch) {
            for (c, &s) in frame.iter().enumerate() {
                channels[c].push(s);
            }
        }
        Self {
            channels,
            sample_rate: decoded.sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Resample every channel to the target rate by linear interpolation:
    /// each output sample is blended from the two nearest source samples at
    /// the scaled index. Same rate is an identity copy.
    pub fn resample_linear(&self, target_rate: u32) -> PcmBuffer {
        if target_rate == self.sample_rate || self.frames() == 0 {
            return PcmBuffer {
                channels: self.channels.clone(),
                sample_rate: target_rate,
            };
        }

        let in_len = self.frames();
        let out_len =
            ((in_len as f64 * target_rate as f64 / self.sample_rate as f64) as usize).max(1);
        let ratio = in_len as f64 / out_len as f64;

        let channels = self
            .channels
            .iter()
            .map(|input| {
                let mut output = Vec::with_capacity(out_len);
                for i in 0..out_len {
                    let source_index = i as f64 * ratio;
                    let index = source_index as usize;
                    let fraction = (source_index - index as f64) as f32;

                    let sample = if index + 1 < input.len() {
                        input[index] * (1.0 - fraction) + input[index + 1] * fraction
                    } else {
                        input.get(index).copied().unwrap_or(0.0)
                    };
                    output.push(sample);
                }
                output
            })
            .collect();

        PcmBuffer {
            channels,
            sample_rate: target_rate,
        }
    }

    /// Scale every channel so the global peak lands at 0.95. Silence is left
    /// untouched.
    pub fn normalize(&mut self) {
        let mut peak = 0.0f32;
        for channel in &self.channels {
            for &s in channel {
                peak = peak.max(s.abs());
            }
        }
        if peak > 0.0 {
            let gain = NORMALIZE_PEAK / peak;
            for channel in &mut self.channels {
                for s in channel.iter_mut() {
                    *s *= gain;
                }
            }
        }
    }

    /// Linear fade ramps: the first `fade_in * rate` samples scale by
    /// `i / fade_in_samples`, the final `fade_out * rate` by the
    /// complementary ramp. The two fades are independent.
    pub fn apply_fades(&mut self, fade_in_secs: f32, fade_out_secs: f32) {
        let fade_in_samples = (fade_in_secs.max(0.0) * self.sample_rate as f32) as usize;
        let fade_out_samples = (fade_out_secs.max(0.0) * self.sample_rate as f32) as usize;

        for channel in &mut self.channels {
            let len = channel.len();

            if fade_in_samples > 0 {
                for i in 0..fade_in_samples.min(len) {
                    channel[i] *= i as f32 / fade_in_samples as f32;
                }
            }

            if fade_out_samples > 0 {
                for i in len.saturating_sub(fade_out_samples)..len {
                    channel[i] *= (len - i) as f32 / fade_out_samples as f32;
                }
            }
        }
    }

    /// Interleaved frame order for encoding.
    pub fn interleave(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mono(samples: Vec<f32>, sample_rate: u32) -> PcmBuffer {
        PcmBuffer {
            channels: vec![samples],
            sample_rate,
        }
    }

    #[test]
    fn resample_to_same_rate_is_identity() {
        let buf = mono(vec![0.1, 0.2, 0.3], 8000);
        let out = buf.resample_linear(8000);
        assert_eq!(out.channels, buf.channels);
    }

    #[test]
    fn resample_halves_length_and_interpolates() {
        let buf = mono(vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0], 8000);
        let out = buf.resample_linear(4000);
        assert_eq!(out.frames(), 4);
        assert_eq!(out.sample_rate, 4000);

        // Upsampling doubles and lands midpoints between neighbours.
        let buf = mono(vec![0.0, 1.0], 4000);
        let out = buf.resample_linear(8000);
        assert_eq!(out.frames(), 4);
        assert_relative_eq!(out.channels[0][0], 0.0);
        assert_relative_eq!(out.channels[0][1], 0.5);
        assert_relative_eq!(out.channels[0][2], 1.0);
    }

    #[test]
    fn normalize_pins_peak_at_point_ninety_five() {
        let mut buf = PcmBuffer {
            channels: vec![vec![0.1, -0.4], vec![0.2, 0.05]],
            sample_rate: 8000,
        };
        buf.normalize();
        let peak = buf
            .channels
            .iter()
            .flatten()
            .fold(0.0f32, |m, &s| m.max(s.abs()));
        assert_relative_eq!(peak, 0.95, epsilon = 1e-6);
        // Ratios between samples survive the scaling.
        assert_relative_eq!(buf.channels[0][0], 0.95 * 0.1 / 0.4, epsilon = 1e-6);
    }

    #[test]
    fn normalize_leaves_silence_alone() {
        let mut buf = mono(vec![0.0; 16], 8000);
        buf.normalize();
        assert!(buf.channels[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn fade_in_ramp_endpoints() {
        let rate = 44100;
        let mut buf = mono(vec![1.0; rate as usize], rate);
        buf.apply_fades(1.0, 0.0);
        assert_relative_eq!(buf.channels[0][0], 0.0);
        assert_relative_eq!(buf.channels[0][44099], 44099.0 / 44100.0, epsilon = 1e-6);
    }

    #[test]
    fn fade_out_is_independent_of_fade_in() {
        let mut buf = mono(vec![1.0; 100], 100);
        buf.apply_fades(0.0, 0.5); // last 50 samples ramp down
        assert_relative_eq!(buf.channels[0][49], 1.0);
        assert_relative_eq!(buf.channels[0][50], 1.0, epsilon = 1e-6);
        assert_relative_eq!(buf.channels[0][99], 1.0 / 50.0, epsilon = 1e-6);
    }

    #[test]
    fn interleave_orders_frames() {
        let buf = PcmBuffer {
            channels: vec![vec![1.0, 3.0], vec![2.0, 4.0]],
            sample_rate: 8000,
        };
        assert_eq!(buf.interleave(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
