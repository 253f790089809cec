//! Physical outputs the signaler keys.
//!
//! A device only has to carry out commands. Tracking state, swallowing
//! errors and deciding when to switch is the job of
//! [`channel`](crate::channel).

#[cfg(feature = "audio")]
pub mod audio;
pub mod bell;
pub mod led;
pub mod recording;

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device i/o error")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "audio")]
    #[error("audio device error")]
    Audio(#[from] audio::Error),
    #[error("device panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Other(String),
}

/// An output that stays on until it is switched off, e.g. a torch or LED.
pub trait PulseDevice: Send {
    fn set_on(&mut self, on: bool) -> Result<(), DeviceError>;
}

impl<T: PulseDevice + ?Sized> PulseDevice for Box<T> {
    #[inline]
    fn set_on(&mut self, on: bool) -> Result<(), DeviceError> {
        (**self).set_on(on)
    }
}

/// An output that is told how long to sound and silences itself, e.g. a
/// beeper.
pub trait ToneDevice: Send {
    fn start_tone(&mut self, duration: Duration) -> Result<(), DeviceError>;

    /// Silences the tone right away, even if its duration hasn't elapsed yet.
    fn stop_tone(&mut self) -> Result<(), DeviceError>;
}

impl<T: ToneDevice + ?Sized> ToneDevice for Box<T> {
    #[inline]
    fn start_tone(&mut self, duration: Duration) -> Result<(), DeviceError> {
        (**self).start_tone(duration)
    }

    #[inline]
    fn stop_tone(&mut self) -> Result<(), DeviceError> {
        (**self).stop_tone()
    }
}

/// The devices handed to a [`Signaler`](crate::signaler::Signaler). Either
/// may be missing.
#[derive(Default, derive_more::Debug)]
pub struct Outputs {
    #[debug(skip)]
    pub pulse: Option<Box<dyn PulseDevice>>,
    #[debug(skip)]
    pub tone: Option<Box<dyn ToneDevice>>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pulse(mut self, device: impl PulseDevice + 'static) -> Self {
        self.pulse = Some(Box::new(device));
        self
    }

    pub fn with_tone(mut self, device: impl ToneDevice + 'static) -> Self {
        self.tone = Some(Box::new(device));
        self
    }
}
