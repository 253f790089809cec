use std::{
    f32::consts::TAU,
    time::Duration,
};

use parking_lot::Mutex;
use rodio::Source as _;

use crate::device::{
    DeviceError,
    ToneDevice,
};

pub const DEFAULT_FREQUENCY: f32 = 700.0;
pub const DEFAULT_VOLUME: f32 = 0.5;

const SAMPLE_RATE: u32 = 44100;

/// Attack and release of each tone, to avoid clicks.
const RAMP: Duration = Duration::from_millis(4);

#[derive(Debug, thiserror::Error)]
#[error("audio error")]
pub enum Error {
    Stream(#[from] rodio::StreamError),
}

/// A sine tone on the default audio output.
#[derive(derive_more::Debug)]
pub struct AudioTone {
    frequency: f32,
    volume: f32,
    #[debug(skip)]
    sink: Option<rodio::Sink>,
}

impl AudioTone {
    /// Opens the default audio output. Fails if there is none.
    pub fn new(frequency: f32, volume: f32) -> Result<Self, Error> {
        global_output_stream()?;
        Ok(Self {
            frequency,
            volume: volume.clamp(0.0, 1.0),
            sink: None,
        })
    }
}

impl ToneDevice for AudioTone {
    fn start_tone(&mut self, duration: Duration) -> Result<(), DeviceError> {
        self.stop_tone()?;

        let sink = rodio::Sink::connect_new(global_output_stream()?.mixer());
        sink.append(ToneBurst::new(self.frequency, SAMPLE_RATE, duration).amplify(self.volume));
        self.sink = Some(sink);

        Ok(())
    }

    fn stop_tone(&mut self) -> Result<(), DeviceError> {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        Ok(())
    }
}

#[inline]
fn step_from_frequency_and_sample_rate(frequency: f32, sample_rate: u32) -> f32 {
    (TAU * frequency / sample_rate as f32).rem_euclid(TAU)
}

/// A sine wave of fixed length, faded in and out.
#[derive(Clone, Copy, Debug)]
struct ToneBurst {
    sample_rate: u32,
    phase: f32,
    step: f32,
    position: usize,
    num_samples: usize,
    ramp_samples: usize,
}

impl ToneBurst {
    fn new(frequency: f32, sample_rate: u32, duration: Duration) -> Self {
        let num_samples = (duration.as_secs_f32() * sample_rate as f32).round() as usize;
        let ramp_samples = (RAMP.as_secs_f32() * sample_rate as f32) as usize;
        Self {
            sample_rate,
            phase: 0.0,
            step: step_from_frequency_and_sample_rate(frequency, sample_rate),
            position: 0,
            num_samples,
            ramp_samples: ramp_samples.min(num_samples / 2).max(1),
        }
    }

    fn envelope(&self) -> f32 {
        let from_edge = self.position.min(self.num_samples - self.position);
        (from_edge as f32 / self.ramp_samples as f32).min(1.0)
    }
}

impl Iterator for ToneBurst {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.num_samples {
            return None;
        }

        let output = self.phase.sin() * self.envelope();
        self.phase += self.step;
        if self.phase > TAU {
            self.phase -= TAU;
        }
        self.position += 1;

        Some(output)
    }
}

impl rodio::Source for ToneBurst {
    #[inline]
    fn current_span_len(&self) -> Option<usize> {
        Some(self.num_samples - self.position)
    }

    #[inline]
    fn channels(&self) -> rodio::ChannelCount {
        1
    }

    #[inline]
    fn sample_rate(&self) -> rodio::SampleRate {
        self.sample_rate
    }

    #[inline]
    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.num_samples as f32 / self.sample_rate as f32,
        ))
    }
}

fn global_output_stream() -> Result<&'static rodio::OutputStream, Error> {
    static OUTPUT_STREAM: Mutex<Option<&'static rodio::OutputStream>> = Mutex::new(None);

    let mut output_stream = OUTPUT_STREAM.lock();

    if let Some(output_stream) = *output_stream {
        return Ok(output_stream);
    }

    let opened: &'static rodio::OutputStream = Box::leak(Box::new(
        rodio::OutputStreamBuilder::open_default_stream()?,
    ));
    *output_stream = Some(opened);

    Ok(opened)
}
