use std::time::Duration;

use crate::{
    channel::{
        ChannelKind,
        Level,
        OutputChannel,
        switch_off,
    },
    device::ToneDevice,
};

#[derive(derive_more::Debug)]
pub struct ToneChannel {
    #[debug(skip)]
    device: Option<Box<dyn ToneDevice>>,
    level: Level,
    failures: u64,
}

impl ToneChannel {
    pub fn new(device: Option<Box<dyn ToneDevice>>) -> Self {
        Self {
            device,
            level: Level::Off,
            failures: 0,
        }
    }

    /// Whether a tone was started and not stopped since. The device may have
    /// already silenced itself.
    #[inline]
    pub fn is_sounding(&self) -> bool {
        self.level == Level::On
    }

    /// Number of device commands that failed.
    #[inline]
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl OutputChannel for ToneChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Tone
    }

    fn is_available(&self) -> bool {
        self.device.is_some()
    }

    fn turn_on(&mut self, duration: Duration) -> bool {
        let Some(device) = &mut self.device
        else {
            return false;
        };

        self.level = Level::Unknown;
        match device.start_tone(duration) {
            Ok(()) => {
                self.level = Level::On;
                true
            }
            Err(error) => {
                tracing::warn!(?error, ?duration, "Failed to start tone");
                self.failures += 1;
                false
            }
        }
    }

    fn turn_off(&mut self) {
        if self.level == Level::Off {
            return;
        }
        let Some(device) = &mut self.device
        else {
            return;
        };

        self.level = Level::Unknown;
        match switch_off(|| device.stop_tone()) {
            Ok(()) => {
                self.level = Level::Off;
            }
            Err(error) => {
                tracing::warn!(?error, "Failed to stop tone");
                self.failures += 1;
            }
        }
    }
}
