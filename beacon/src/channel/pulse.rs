use std::time::Duration;

use crate::{
    channel::{
        ChannelKind,
        Level,
        OutputChannel,
        switch_off,
    },
    device::PulseDevice,
};

#[derive(derive_more::Debug)]
pub struct PulseChannel {
    #[debug(skip)]
    device: Option<Box<dyn PulseDevice>>,
    level: Level,
    failures: u64,
}

impl PulseChannel {
    pub fn new(device: Option<Box<dyn PulseDevice>>) -> Self {
        Self {
            device,
            level: Level::Off,
            failures: 0,
        }
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.level == Level::On
    }

    /// Number of device commands that failed.
    #[inline]
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl OutputChannel for PulseChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Pulse
    }

    fn is_available(&self) -> bool {
        self.device.is_some()
    }

    fn turn_on(&mut self, _duration: Duration) -> bool {
        let Some(device) = &mut self.device
        else {
            return false;
        };

        // stays unknown if the device panics halfway
        self.level = Level::Unknown;
        match device.set_on(true) {
            Ok(()) => {
                self.level = Level::On;
                true
            }
            Err(error) => {
                tracing::warn!(?error, "Failed to turn light on");
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
        match switch_off(|| device.set_on(false)) {
            Ok(()) => {
                self.level = Level::Off;
            }
            Err(error) => {
                tracing::warn!(?error, "Failed to turn light off");
                self.failures += 1;
            }
        }
    }
}
