// src/effects/equalizer.rs

use crate::effects::EqualizerParams;
use biquad::*;

const LOW_SHELF_HZ: f32 = 320.0;
const MID_PEAK_HZ: f32 = 1000.0;
const HIGH_SHELF_HZ: f32 = 3200.0;
const MID_Q: f32 = 1.0;

/// One filter band with per-channel state.
struct EqBand {
    filters: Vec<DirectForm2Transposed<f32>>,
}

impl EqBand {
    fn new(sr: u32, channels: usize, filter_type: Type<f32>, freq: f32, q: f32) -> Option<Self> {
        // Freq must stay below Nyquist for the coefficients to exist.
        let safe_freq = freq.clamp(20.0, (sr as f32 / 2.0) - 1.0);
        let coeffs =
            Coefficients::<f32>::from_params(filter_type, sr.hz(), safe_freq.hz(), q.into())
                .ok()?;
        let filters = (0..channels)
            .map(|_| DirectForm2Transposed::<f32>::new(coeffs))
            .collect();
        Some(Self { filters })
    }

    #[inline]
    fn process(&mut self, sample: f32, channel: usize) -> f32 {
        if let Some(filter) = self.filters.get_mut(channel) {
            let out = filter.run(sample);
            // Denormal protection
            if out.abs() < 1e-20 {
                return 0.0;
            }
            return out;
        }
        sample
    }
}

/// Fixed three-band tone control: low shelf at 320 Hz, mid peak at 1 kHz and
/// high shelf at 3.2 kHz. A band whose coefficients cannot be computed for
/// the bound sample rate is simply absent.
pub struct ThreeBandEq {
    bands: Vec<EqBand>,
    channels: usize,
}

impl ThreeBandEq {
    pub fn new(sr: u32, channels: usize, params: EqualizerParams) -> Self {
        let layout = [
            (Type::LowShelf(params.low_gain_db), LOW_SHELF_HZ, Q_BUTTERWORTH_F32),
            (Type::PeakingEQ(params.mid_gain_db), MID_PEAK_HZ, MID_Q),
            (Type::HighShelf(params.high_gain_db), HIGH_SHELF_HZ, Q_BUTTERWORTH_F32),
        ];
        let bands = layout
            .into_iter()
            .filter_map(|(ty, freq, q)| EqBand::new(sr, channels, ty, freq, q))
            .collect();
        Self { bands, channels }
    }

    /// Zero-allocation in-place processing of an interleaved block.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_mut(self.channels) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let mut s = *sample;
                for band in &mut self.bands {
                    s = band.process(s, ch);
                }
                *sample = s;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn tone(freq: f32, sr: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn flat_settings_leave_signal_nearly_untouched() {
        let sr = 44100;
        let mut eq = ThreeBandEq::new(sr, 1, EqualizerParams::default());
        let input = tone(440.0, sr, 4410);
        let mut block = input.clone();
        eq.process_block(&mut block);

        let diff = rms(&block) / rms(&input);
        assert!((diff - 1.0).abs() < 0.05, "gain ratio {diff}");
    }

    #[test]
    fn low_shelf_boost_raises_bass_not_treble() {
        let sr = 44100;
        let params = EqualizerParams {
            low_gain_db: 12.0,
            ..EqualizerParams::default()
        };

        let mut eq = ThreeBandEq::new(sr, 1, params);
        let bass = tone(100.0, sr, 8820);
        let mut boosted = bass.clone();
        eq.process_block(&mut boosted);
        // Skip the filter's settling transient.
        let ratio = rms(&boosted[2000..]) / rms(&bass[2000..]);
        assert!(ratio > 2.0, "bass ratio {ratio}");

        let mut eq = ThreeBandEq::new(sr, 1, params);
        let treble = tone(8000.0, sr, 8820);
        let mut passed = treble.clone();
        eq.process_block(&mut passed);
        let ratio = rms(&passed[2000..]) / rms(&treble[2000..]);
        assert!((ratio - 1.0).abs() < 0.2, "treble ratio {ratio}");
    }

    #[test]
    fn channels_are_filtered_independently() {
        let sr = 44100;
        let params = EqualizerParams {
            high_gain_db: -24.0,
            ..EqualizerParams::default()
        };
        let mut eq = ThreeBandEq::new(sr, 2, params);

        // Left silent, right carries treble; the cut must not bleed state.
        let right = tone(8000.0, sr, 4410);
        let mut block = Vec::with_capacity(right.len() * 2);
        for &s in &right {
            block.push(0.0);
            block.push(s);
        }
        eq.process_block(&mut block);

        let left_out: Vec<f32> = block.iter().step_by(2).copied().collect();
        assert!(rms(&left_out) < 1e-6);
    }
}
