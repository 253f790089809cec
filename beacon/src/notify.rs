use std::sync::Arc;

use crate::{
    channel::{
        ChannelKind,
        OutputSet,
    },
    morse::EncodingWarning,
    signaler::{
        SchedulingFault,
        StartError,
    },
};

/// What the signaler reports to its owner.
///
/// These are plain data. Turning them into messages for a user is up to the
/// receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// Playback began on these outputs.
    Started { outputs: OutputSet },

    /// Playback began, but without these requested outputs, because they
    /// have no device.
    Degraded { unavailable: OutputSet },

    /// `start` was refused. The same error is returned from `start`.
    Refused(StartError),

    /// A character in the message was skipped.
    EncodingWarning(EncodingWarning),

    /// A device failed to switch on. Reported once per channel and playback.
    ChannelFailed { channel: ChannelKind },

    /// A running playback was stopped.
    Stopped,

    /// Playback was aborted by an unexpected failure. All outputs were
    /// switched off.
    Fault(SchedulingFault),
}

/// Receives notifications. Called from both the scheduler thread and the
/// thread calling into the signaler, while the signaler holds its locks. It
/// must neither block nor call back into the signaler.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

impl NotificationSink for () {
    #[inline]
    fn notify(&self, _notification: Notification) {}
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    #[inline]
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}

impl NotificationSink for tokio::sync::mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        // the receiver going away just means nobody is interested anymore
        let _ = self.send(notification);
    }
}

impl NotificationSink for std::sync::mpsc::Sender<Notification> {
    fn notify(&self, notification: Notification) {
        let _ = self.send(notification);
    }
}

/// Logs notifications and otherwise drops them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::Fault(_) => tracing::error!(?notification),
            Notification::Refused(_)
            | Notification::ChannelFailed { .. }
            | Notification::Degraded { .. } => tracing::warn!(?notification),
            _ => tracing::info!(?notification),
        }
    }
}
