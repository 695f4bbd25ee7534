// src/effects/compressor.rs

use crate::effects::CompressorParams;

/// Downward compressor with a peak envelope follower. No makeup gain; the
/// export stage normalizes instead.
pub struct Compressor {
    params: CompressorParams,
    attack_coef: f32,
    release_coef: f32,
    envelope: f32,
}

impl Compressor {
    pub fn new(sample_rate: u32, params: CompressorParams) -> Self {
        let sr = sample_rate as f32;
        Self {
            // One-pole time constants from the attack/release settings.
            attack_coef: (-1.0 / (params.attack_secs.max(1e-5) * sr)).exp(),
            release_coef: (-1.0 / (params.release_secs.max(1e-5) * sr)).exp(),
            params,
            envelope: 0.0,
        }
    }

    /// Processes an interleaved block in place. The envelope tracks the
    /// interleaved stream directly so both channels see the same reduction.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        let threshold = self.params.threshold_db;
        let ratio = self.params.ratio.max(1.0);

        for sample in buffer.iter_mut() {
            let input_level = sample.abs();

            if input_level > self.envelope {
                self.envelope = self.attack_coef * (self.envelope - input_level) + input_level;
            } else {
                self.envelope = self.release_coef * (self.envelope - input_level) + input_level;
            }

            let env_db = 20.0 * self.envelope.max(1e-5).log10();

            let mut gain_reduction_db = 0.0;
            if env_db > threshold {
                let overshoot = env_db - threshold;
                gain_reduction_db = overshoot * (1.0 - 1.0 / ratio);
            }

            *sample *= 10.0_f32.powf(-gain_reduction_db / 20.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_signal_below_threshold_passes_through() {
        let mut comp = Compressor::new(8000, CompressorParams::default());
        // -40 dBFS, far below the -24 dB threshold.
        let mut block = vec![0.01f32; 800];
        comp.process_block(&mut block);
        assert!(block.iter().all(|&s| (s - 0.01).abs() < 1e-4));
    }

    #[test]
    fn loud_signal_is_attenuated_toward_the_ratio() {
        let params = CompressorParams {
            threshold_db: -24.0,
            ratio: 3.0,
            attack_secs: 0.001,
            release_secs: 0.25,
        };
        let mut comp = Compressor::new(8000, params);

        // 0 dBFS square wave: 24 dB overshoot compressed 3:1 leaves 8 dB
        // above threshold, so -16 dBFS steady state (~0.158).
        let mut block = vec![1.0f32; 8000];
        comp.process_block(&mut block);

        let settled = block[4000..].iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!((settled - 0.158).abs() < 0.03, "settled at {settled}");
    }

    #[test]
    fn release_restores_gain_after_the_peak() {
        let params = CompressorParams {
            threshold_db: -24.0,
            ratio: 3.0,
            attack_secs: 0.001,
            release_secs: 0.02,
        };
        let mut comp = Compressor::new(8000, params);

        let mut loud = vec![1.0f32; 2000];
        comp.process_block(&mut loud);

        // After several release constants of quiet signal the reduction is
        // mostly gone.
        let mut quiet = vec![0.01f32; 4000];
        comp.process_block(&mut quiet);
        let last = quiet[3999].abs();
        assert!((last - 0.01).abs() < 2e-3, "recovered to {last}");
    }
}
