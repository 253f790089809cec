//! Morse code signalling.
//!
//! Text is [encoded](morse::encode) into a sequence of timed symbols, which a
//! [`Signaler`] plays on a light and a tone output in a loop until it is
//! stopped.

pub mod channel;
pub mod device;
pub mod morse;
pub mod notify;
pub mod signaler;
pub mod timing;

pub use crate::{
    channel::{
        ChannelKind,
        OutputSet,
    },
    device::Outputs,
    morse::{
        Symbol,
        SymbolSequence,
        encode,
    },
    notify::{
        Notification,
        NotificationSink,
    },
    signaler::{
        Playback,
        Signaler,
        SignalerConfig,
        StartError,
    },
    timing::Timing,
};
