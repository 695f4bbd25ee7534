// src/effects/reverb.rs

use crate::effects::ReverbParams;
use rand::Rng;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Uniform partition length for the frequency-domain tail.
const PARTITION: usize = 1024;
const FFT_LEN: usize = 2 * PARTITION;

/// Convolution reverb against a synthetic impulse response.
///
/// The impulse is regenerated on construction, never measured: its length is
/// `sample_rate * room_size * 4` and each tap is noise shaped by the decay
/// envelope `(1 - i/length) ^ (damping * 10)`, independently per channel.
/// Wet and dry paths are mixed by independent gain stages.
///
/// The response runs to several seconds at device rates, so the convolution
/// is partitioned: the first [`PARTITION`] taps are applied directly per
/// sample and the rest in the frequency domain, one block-sized FFT per
/// partition-length of input. Those tail taps only touch input at least one
/// partition old, which keeps the streaming output sample-exact.
pub struct ConvolutionReverb {
    states: Vec<ChannelState>,
    fwd: Arc<dyn Fft<f32>>,
    inv: Arc<dyn Fft<f32>>,
    wet: f32,
    dry: f32,
    channels: usize,
}

struct ChannelState {
    head: Vec<f32>,
    head_history: Vec<f32>,
    head_pos: usize,
    /// Impulse tail partitions, frequency domain, in tap order.
    tail_spectra: Vec<Vec<Complex<f32>>>,
    /// Ring of past input-frame spectra, one per tail partition.
    input_spectra: Vec<Vec<Complex<f32>>>,
    newest: usize,
    /// Previous block followed by the block being collected.
    frame: Vec<f32>,
    fill: usize,
    /// Tail contribution for the block currently streaming out.
    tail_out: Vec<f32>,
}

impl ChannelState {
    fn new(impulse: &[f32], fwd: &dyn Fft<f32>) -> Self {
        let head_len = impulse.len().min(PARTITION);
        let head = impulse[..head_len].to_vec();

        let mut tail_spectra = Vec::new();
        let mut offset = head_len;
        while offset < impulse.len() {
            let end = (offset + PARTITION).min(impulse.len());
            let mut buf = vec![Complex::new(0.0, 0.0); FFT_LEN];
            for (slot, &tap) in buf.iter_mut().zip(&impulse[offset..end]) {
                slot.re = tap;
            }
            fwd.process(&mut buf);
            tail_spectra.push(buf);
            offset = end;
        }

        let parts = tail_spectra.len();
        Self {
            head,
            head_history: vec![0.0; head_len],
            head_pos: 0,
            tail_spectra,
            input_spectra: vec![vec![Complex::new(0.0, 0.0); FFT_LEN]; parts],
            newest: 0,
            frame: vec![0.0; FFT_LEN],
            fill: 0,
            tail_out: vec![0.0; PARTITION],
        }
    }

    fn process_sample(&mut self, x: f32, fwd: &dyn Fft<f32>, inv: &dyn Fft<f32>) -> f32 {
        let head_len = self.head.len();
        self.head_history[self.head_pos] = x;
        let mut wet = 0.0f32;
        for (k, &tap) in self.head.iter().enumerate() {
            let idx = (self.head_pos + head_len - k) % head_len;
            wet += tap * self.head_history[idx];
        }
        self.head_pos = (self.head_pos + 1) % head_len;

        if !self.tail_spectra.is_empty() {
            wet += self.tail_out[self.fill];
            self.frame[PARTITION + self.fill] = x;
            self.fill += 1;
            if self.fill == PARTITION {
                self.advance_block(fwd, inv);
                self.fill = 0;
            }
        }
        wet
    }

    /// A full block of input has arrived: spectrum it, accumulate every tail
    /// partition against the matching past spectrum, and precompute the tail
    /// output for the block about to stream in (overlap-save, second half).
    fn advance_block(&mut self, fwd: &dyn Fft<f32>, inv: &dyn Fft<f32>) {
        let mut spectrum: Vec<Complex<f32>> =
            self.frame.iter().map(|&s| Complex::new(s, 0.0)).collect();
        fwd.process(&mut spectrum);

        let parts = self.input_spectra.len();
        self.newest = (self.newest + 1) % parts;
        self.input_spectra[self.newest] = spectrum;

        let mut acc = vec![Complex::new(0.0, 0.0); FFT_LEN];
        for (j, part) in self.tail_spectra.iter().enumerate() {
            let past = &self.input_spectra[(self.newest + parts - j) % parts];
            for ((a, &h), &s) in acc.iter_mut().zip(part).zip(past) {
                *a += h * s;
            }
        }
        inv.process(&mut acc);

        let scale = 1.0 / FFT_LEN as f32;
        for (out, c) in self.tail_out.iter_mut().zip(&acc[PARTITION..]) {
            *out = c.re * scale;
        }
        self.frame.copy_within(PARTITION.., 0);
    }
}

impl ConvolutionReverb {
    pub fn new(sample_rate: u32, channels: usize, params: ReverbParams) -> Self {
        let room = params.room_size.clamp(0.0, 1.0);
        let taps = ((sample_rate as f32 * room * 4.0) as usize).max(1);
        let exponent = params.damping.clamp(0.0, 1.0) * 10.0;

        let mut planner = FftPlanner::new();
        let fwd = planner.plan_fft_forward(FFT_LEN);
        let inv = planner.plan_fft_inverse(FFT_LEN);

        let mut rng = rand::rng();
        let states: Vec<ChannelState> = (0..channels)
            .map(|_| {
                let mut impulse: Vec<f32> = (0..taps)
                    .map(|i| {
                        let decay = (1.0 - i as f32 / taps as f32).powf(exponent);
                        rng.random_range(-1.0..1.0) * decay
                    })
                    .collect();
                // Equal-power normalization keeps the wet path at unity energy
                // regardless of impulse length.
                let energy: f32 = impulse.iter().map(|t| t * t).sum();
                if energy > 0.0 {
                    let scale = 1.0 / energy.sqrt();
                    for t in &mut impulse {
                        *t *= scale;
                    }
                }
                ChannelState::new(&impulse, fwd.as_ref())
            })
            .collect();

        Self {
            states,
            fwd,
            inv,
            wet: params.wet_level.clamp(0.0, 1.0),
            dry: params.dry_level.clamp(0.0, 1.0),
            channels,
        }
    }

    /// Streaming convolution over an interleaved block, in place.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_mut(self.channels) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let x = *sample;
                let wet = self.states[ch].process_sample(x, self.fwd.as_ref(), self.inv.as_ref());
                *sample = self.dry * x + self.wet * wet;
            }
        }
    }
}
