// src/effects/delay.rs

use crate::effects::DelayParams;

/// Longest supported delay time.
const MAX_DELAY_SECS: f32 = 1.0;

/// Feedback delay with independent wet and dry gain stages. One delay line
/// per channel; the feedback tap is written back into the line together with
/// the input.
pub struct Delay {
    lines: Vec<Vec<f32>>,
    write_pos: usize,
    delay_samples: usize,
    feedback: f32,
    wet: f32,
    dry: f32,
    channels: usize,
}

impl Delay {
    pub fn new(sample_rate: u32, channels: usize, params: DelayParams) -> Self {
        let capacity = (sample_rate as f32 * MAX_DELAY_SECS) as usize + 1;
        let delay_secs = params.delay_secs.clamp(0.0, MAX_DELAY_SECS);
        let delay_samples = ((sample_rate as f32 * delay_secs) as usize).min(capacity - 1);
        Self {
            lines: vec![vec![0.0; capacity]; channels],
            write_pos: 0,
            delay_samples,
            feedback: params.feedback.clamp(0.0, 0.99),
            wet: params.wet_level.clamp(0.0, 1.0),
            dry: params.dry_level.clamp(0.0, 1.0),
            channels,
        }
    }

    pub fn process_block(&mut self, buffer: &mut [f32]) {
        let len = self.lines[0].len();
        for frame in buffer.chunks_mut(self.channels) {
            let read_pos = if self.write_pos >= self.delay_samples {
                self.write_pos - self.delay_samples
            } else {
                len - (self.delay_samples - self.write_pos)
            };

            for (ch, sample) in frame.iter_mut().enumerate() {
                let x = *sample;
                // A zero-length delay taps the input itself; reading the line
                // at read_pos == write_pos would return audio from one full
                // wrap earlier.
                let delayed = if self.delay_samples == 0 {
                    x
                } else {
                    self.lines[ch][read_pos]
                };
                self.lines[ch][self.write_pos] = x + delayed * self.feedback;
                *sample = self.dry * x + self.wet * delayed;
            }
            self.write_pos = (self.write_pos + 1) % len;
        }
    }
}
