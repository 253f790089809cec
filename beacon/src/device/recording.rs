//! Devices that record the commands they receive.
//!
//! Used for dry runs and to observe the signaler in tests. Failures and
//! panics can be injected per channel to rehearse misbehaving hardware.

use std::{
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};

use parking_lot::Mutex;

use crate::{
    channel::{
        ChannelKind,
        OutputSet,
    },
    device::{
        DeviceError,
        PulseDevice,
        ToneDevice,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
    Tone(Duration),
    Silence,
}

impl Command {
    #[inline]
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On | Self::Tone(_))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Event {
    pub at: Instant,
    pub channel: ChannelKind,
    pub command: Command,
}

#[derive(Debug, Default)]
struct State {
    events: Vec<Event>,
    failing: OutputSet,
    panicking: OutputSet,
    panicking_after: OutputSet,
    log: bool,
}

/// Shared log of commands. Clones refer to the same log.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    state: Arc<Mutex<State>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log every command at info level.
    pub fn logging(self) -> Self {
        self.state.lock().log = true;
        self
    }

    pub fn pulse(&self) -> RecordingPulse {
        RecordingPulse {
            recorder: self.clone(),
        }
    }

    pub fn tone(&self) -> RecordingTone {
        RecordingTone {
            recorder: self.clone(),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    pub fn commands(&self, channel: ChannelKind) -> Vec<Command> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| event.channel == channel)
            .map(|event| event.command)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.state.lock().events.clear();
    }

    /// Make every command on `channel` return an error without being
    /// recorded.
    pub fn set_failing(&self, channel: ChannelKind, failing: bool) {
        self.state.lock().failing.set(channel, failing);
    }

    /// Make every command on `channel` panic.
    pub fn set_panicking(&self, channel: ChannelKind, panicking: bool) {
        self.state.lock().panicking.set(channel, panicking);
    }

    /// Record every command on `channel`, then panic, like a device that
    /// switched and failed afterwards.
    pub fn set_panicking_after(&self, channel: ChannelKind, panicking: bool) {
        self.state.lock().panicking_after.set(channel, panicking);
    }

    fn record(&self, channel: ChannelKind, command: Command) -> Result<(), DeviceError> {
        let mut state = self.state.lock();

        if state.panicking.contains(channel) {
            drop(state);
            panic!("injected panic on {channel:?} channel");
        }
        if state.failing.contains(channel) {
            return Err(DeviceError::Other(format!(
                "injected failure on {channel:?} channel"
            )));
        }
        if state.log {
            tracing::info!(?channel, ?command);
        }

        state.events.push(Event {
            at: Instant::now(),
            channel,
            command,
        });

        if state.panicking_after.contains(channel) {
            drop(state);
            panic!("injected panic on {channel:?} channel after {command:?}");
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RecordingPulse {
    recorder: Recorder,
}

impl PulseDevice for RecordingPulse {
    fn set_on(&mut self, on: bool) -> Result<(), DeviceError> {
        let command = if on { Command::On } else { Command::Off };
        self.recorder.record(ChannelKind::Pulse, command)
    }
}

#[derive(Clone, Debug)]
pub struct RecordingTone {
    recorder: Recorder,
}

impl ToneDevice for RecordingTone {
    fn start_tone(&mut self, duration: Duration) -> Result<(), DeviceError> {
        self.recorder
            .record(ChannelKind::Tone, Command::Tone(duration))
    }

    fn stop_tone(&mut self) -> Result<(), DeviceError> {
        self.recorder.record(ChannelKind::Tone, Command::Silence)
    }
}
