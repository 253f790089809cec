//! Output channels wrap the devices and keep hardware trouble away from the
//! scheduler: a failing device is logged and treated as if it stayed off.

mod pulse;
mod tone;

use std::{
    any::Any,
    panic::{
        AssertUnwindSafe,
        catch_unwind,
    },
    time::Duration,
};

pub use self::{
    pulse::PulseChannel,
    tone::ToneChannel,
};
use crate::device::{
    DeviceError,
    Outputs,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Light (torch, LED).
    Pulse,
    /// Sound (beeper, speaker).
    Tone,
}

/// A set of channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OutputSet {
    pub pulse: bool,
    pub tone: bool,
}

impl OutputSet {
    pub const NONE: Self = Self {
        pulse: false,
        tone: false,
    };
    pub const ALL: Self = Self {
        pulse: true,
        tone: true,
    };

    #[inline]
    pub fn new(pulse: bool, tone: bool) -> Self {
        Self { pulse, tone }
    }

    #[inline]
    pub fn only(channel: ChannelKind) -> Self {
        let mut set = Self::NONE;
        set.set(channel, true);
        set
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.pulse && !self.tone
    }

    #[inline]
    pub fn contains(&self, channel: ChannelKind) -> bool {
        match channel {
            ChannelKind::Pulse => self.pulse,
            ChannelKind::Tone => self.tone,
        }
    }

    #[inline]
    pub fn set(&mut self, channel: ChannelKind, value: bool) {
        match channel {
            ChannelKind::Pulse => self.pulse = value,
            ChannelKind::Tone => self.tone = value,
        }
    }

    #[inline]
    pub fn intersection(&self, other: Self) -> Self {
        Self {
            pulse: self.pulse && other.pulse,
            tone: self.tone && other.tone,
        }
    }

    #[inline]
    pub fn difference(&self, other: Self) -> Self {
        Self {
            pulse: self.pulse && !other.pulse,
            tone: self.tone && !other.tone,
        }
    }

    pub fn iter(self) -> impl Iterator<Item = ChannelKind> {
        [ChannelKind::Pulse, ChannelKind::Tone]
            .into_iter()
            .filter(move |channel| self.contains(*channel))
    }
}

pub trait OutputChannel {
    fn kind(&self) -> ChannelKind;

    /// Whether there is a device behind this channel.
    fn is_available(&self) -> bool;

    /// Keys the channel for `duration`. Pulse channels ignore the duration
    /// and stay on until [`turn_off`](Self::turn_off).
    ///
    /// Returns `false` if the channel stayed off, because there is no device
    /// or the device failed.
    fn turn_on(&mut self, duration: Duration) -> bool;

    /// Switches the channel off. Does nothing if it is known to be off.
    fn turn_off(&mut self);
}

/// Whether we know what state the device is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Level {
    Off,
    On,
    /// A command failed or panicked halfway. The next turn-off has to reach
    /// the device.
    Unknown,
}

/// Runs a command that switches a device off. A panicking device is turned
/// into an error, so the other channel still gets switched off.
fn switch_off(command: impl FnOnce() -> Result<(), DeviceError>) -> Result<(), DeviceError> {
    catch_unwind(AssertUnwindSafe(command)).unwrap_or_else(|payload| {
        let message = panic_message(&*payload);
        tracing::error!(%message, "Device panicked while switching off");
        Err(DeviceError::Panicked(message))
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

/// Both channels of a signaler.
#[derive(Debug)]
pub struct Channels {
    pub pulse: PulseChannel,
    pub tone: ToneChannel,
}

impl Channels {
    pub fn new(outputs: Outputs) -> Self {
        Self {
            pulse: PulseChannel::new(outputs.pulse),
            tone: ToneChannel::new(outputs.tone),
        }
    }

    pub fn get_mut(&mut self, channel: ChannelKind) -> &mut dyn OutputChannel {
        match channel {
            ChannelKind::Pulse => &mut self.pulse,
            ChannelKind::Tone => &mut self.tone,
        }
    }

    /// Channels that have a device.
    pub fn available(&self) -> OutputSet {
        OutputSet {
            pulse: self.pulse.is_available(),
            tone: self.tone.is_available(),
        }
    }

    pub fn turn_off(&mut self, channels: OutputSet) {
        for channel in channels.iter() {
            self.get_mut(channel).turn_off();
        }
    }

    pub fn turn_off_all(&mut self) {
        self.turn_off(OutputSet::ALL);
    }
}
