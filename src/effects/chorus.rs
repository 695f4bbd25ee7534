// src/effects/chorus.rs

use crate::effects::ChorusParams;
use std::f32::consts::PI;

/// Base delay the LFO modulates around.
const BASE_DELAY_SECS: f32 = 0.02;
/// Delay line headroom.
const MAX_DELAY_SECS: f32 = 0.05;
/// Depth is scaled to seconds of modulation swing.
const DEPTH_TO_SECS: f32 = 0.01;

/// Modulated-delay chorus. A sine LFO sweeps the delay time around the base
/// delay; the fractional read position is linearly interpolated. Wet and dry
/// paths are mixed by independent gains.
pub struct Chorus {
    lines: Vec<Vec<f32>>,
    write_pos: usize,
    phase: f32,
    phase_inc: f32,
    depth_samples: f32,
    base_samples: f32,
    wet: f32,
    dry: f32,
    channels: usize,
}

impl Chorus {
    pub fn new(sample_rate: u32, channels: usize, params: ChorusParams) -> Self {
        let sr = sample_rate as f32;
        let capacity = (sr * MAX_DELAY_SECS) as usize + 2;
        Self {
            lines: vec![vec![0.0; capacity]; channels],
            write_pos: 0,
            phase: 0.0,
            phase_inc: params.rate_hz.clamp(0.1, 10.0) / sr,
            depth_samples: params.depth.clamp(0.0, 1.0) * DEPTH_TO_SECS * sr,
            base_samples: BASE_DELAY_SECS * sr,
            wet: params.wet_level.clamp(0.0, 1.0),
            dry: params.dry_level.clamp(0.0, 1.0),
            channels,
        }
    }

    #[inline]
    fn read_interpolated(line: &[f32], write_pos: usize, delay_samples: f32) -> f32 {
        let len = line.len();
        let whole = delay_samples as usize;
        let frac = delay_samples - whole as f32;

        let read_0 = (write_pos + len - whole) % len;
        let read_1 = if read_0 == 0 { len - 1 } else { read_0 - 1 };

        let s0 = line[read_0];
        let s1 = line[read_1];
        s0 + frac * (s1 - s0)
    }

    pub fn process_block(&mut self, buffer: &mut [f32]) {
        let len = self.lines[0].len();
        let max_delay = (len - 1) as f32;

        for frame in buffer.chunks_mut(self.channels) {
            let lfo = (2.0 * PI * self.phase).sin();
            let delay = (self.base_samples + self.depth_samples * lfo).clamp(1.0, max_delay);

            for (ch, sample) in frame.iter_mut().enumerate() {
                let x = *sample;
                self.lines[ch][self.write_pos] = x;
                let wet = Self::read_interpolated(&self.lines[ch], self.write_pos, delay);
                *sample = self.dry * x + self.wet * wet;
            }

            self.write_pos = (self.write_pos + 1) % len;
            self.phase = (self.phase + self.phase_inc) % 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_only_mix_is_a_passthrough() {
        let params = ChorusParams {
            wet_level: 0.0,
            dry_level: 1.0,
            ..ChorusParams::default()
        };
        let mut chorus = Chorus::new(8000, 2, params);
        let mut block = vec![0.5f32, -0.5];
        chorus.process_block(&mut block);
        assert!((block[0] - 0.5).abs() < 1e-6);
        assert!((block[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn wet_path_is_silent_before_the_base_delay() {
        let params = ChorusParams {
            rate_hz: 1.5,
            depth: 0.0, // no modulation, pure 20 ms delay
            wet_level: 1.0,
            dry_level: 0.0,
        };
        let mut chorus = Chorus::new(1000, 1, params);

        let mut block = vec![1.0f32; 40];
        chorus.process_block(&mut block);

        // 20 ms at 1 kHz is 20 samples of silence before the wet copy lands.
        assert!(block[..19].iter().all(|&s| s.abs() < 1e-6));
        assert!(block[25..].iter().any(|&s| s.abs() > 0.5));
    }

    #[test]
    fn modulation_varies_the_wet_output() {
        let params = ChorusParams {
            rate_hz: 5.0,
            depth: 1.0,
            wet_level: 1.0,
            dry_level: 0.0,
        };
        let mut chorus = Chorus::new(8000, 1, params);

        // A ramp input makes any delay variation visible in the output.
        let mut block: Vec<f32> = (0..4000).map(|i| (i % 100) as f32 / 100.0).collect();
        chorus.process_block(&mut block);

        let settled = &block[1000..];
        let min = settled.iter().fold(f32::MAX, |m, &s| m.min(s));
        let max = settled.iter().fold(f32::MIN, |m, &s| m.max(s));
        assert!(max - min > 0.1, "output did not vary: {min}..{max}");
    }
}
