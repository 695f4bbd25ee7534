// src/capture/input.rs

use crate::capture::source::{CaptureConfig, CaptureSource};
use crate::error::{CoreError, DeviceError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use log::{info, warn};
use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Microphone input backed by a CPAL stream. Samples are mirrored into two
/// ring buffers: one for the chunk collector, one for the level meter. The
/// shared `paused` flag gates the callback so paused audio is dropped at the
/// device boundary.
pub struct MicInput {
    #[allow(dead_code)]
    stream: Stream,
    channels: usize,
    sample_rate: u32,
}

impl CaptureSource for MicInput {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl MicInput {
    pub fn open(
        config: &CaptureConfig,
        paused: Arc<AtomicBool>,
        producer_rec: HeapProd<f32>,
        producer_meter: HeapProd<f32>,
    ) -> Result<(Self, usize, u32), CoreError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(DeviceError::NoDeviceFound)?;

        let supported_config = device
            .default_input_config()
            .map_err(|_| DeviceError::PermissionDenied)?;
        let sample_format = supported_config.sample_format();
        let stream_config: StreamConfig = supported_config.into();
        let channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0;

        if sample_rate != config.sample_rate {
            warn!(
                "device negotiated {} Hz instead of requested {} Hz",
                sample_rate, config.sample_rate
            );
        }
        info!(
            "capture open: {} ch @ {} Hz (aec {}, ns {}, agc {})",
            channels,
            sample_rate,
            config.echo_cancellation,
            config.noise_suppression,
            config.auto_gain_control
        );

        let stream = match sample_format {
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, paused, producer_rec, producer_meter)?
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, paused, producer_rec, producer_meter)?
            }
            SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, paused, producer_rec, producer_meter)?
            }
            _ => return Err(CoreError::InvalidState("unsupported input sample format")),
        };

        Ok((
            Self {
                stream,
                channels,
                sample_rate,
            },
            channels,
            sample_rate,
        ))
    }
}

/// Build the input stream for any device sample type, converting to f32 in
/// the callback before pushing.
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    paused: Arc<AtomicBool>,
    mut producer_rec: HeapProd<f32>,
    mut producer_meter: HeapProd<f32>,
) -> Result<Stream, CoreError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let err_fn = |err| log::error!("input stream error: {err:?}");

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _| {
                if paused.load(Ordering::Relaxed) {
                    return;
                }
                let mut conv = Vec::with_capacity(data.len());
                for &s in data.iter() {
                    conv.push(f32::from_sample(s));
                }

                // Push into the chunk buffer; mirror into the meter buffer.
                let mut pushed = 0usize;
                while pushed < conv.len() {
                    let slice = &conv[pushed..];
                    let n = producer_rec.push_slice(slice);
                    if n == 0 {
                        // chunk buffer full -> drop remainder
                        break;
                    }
                    let _ = producer_meter.push_slice(&slice[..n]);
                    pushed += n;
                }
            },
            err_fn,
            None,
        )
        .map_err(map_stream_error)?;

    stream.play().map_err(|_| DeviceError::NoDeviceFound)?;
    Ok(stream)
}

fn map_stream_error(err: cpal::BuildStreamError) -> CoreError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => DeviceError::NoDeviceFound.into(),
        _ => DeviceError::PermissionDenied.into(),
    }
}
