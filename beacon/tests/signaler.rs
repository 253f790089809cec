use std::{
    sync::{
        Arc,
        mpsc,
    },
    thread::sleep,
    time::Duration,
};

use beacon::{
    ChannelKind,
    Notification,
    OutputSet,
    Outputs,
    Signaler,
    StartError,
    Timing,
    device::{
        DeviceError,
        PulseDevice,
        recording::{
            Command,
            Recorder,
        },
    },
    encode,
    notify::LogSink,
    signaler::SignalerError,
};

const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn timing() -> Timing {
    Timing::new(ms(10), ms(30), ms(40))
}

fn both(recorder: &Recorder) -> Outputs {
    Outputs::new()
        .with_pulse(recorder.pulse())
        .with_tone(recorder.tone())
}

fn signaler(outputs: Outputs) -> (Signaler, mpsc::Receiver<Notification>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (sender, receiver) = mpsc::channel();
    let signaler = Signaler::new(timing(), outputs, sender).unwrap();
    (signaler, receiver)
}

/// A light that switches on but panics when switched off.
struct JammedLight;

impl PulseDevice for JammedLight {
    fn set_on(&mut self, on: bool) -> Result<(), DeviceError> {
        if !on {
            panic!("light switch jammed");
        }
        Ok(())
    }
}

fn count_on(recorder: &Recorder, channel: ChannelKind) -> usize {
    recorder
        .commands(channel)
        .iter()
        .filter(|command| command.is_on())
        .count()
}

fn wait_for(
    receiver: &mpsc::Receiver<Notification>,
    mut predicate: impl FnMut(&Notification) -> bool,
) -> Option<Notification> {
    while let Ok(notification) = receiver.recv_timeout(Duration::from_secs(2)) {
        if predicate(&notification) {
            return Some(notification);
        }
    }
    None
}

#[test]
fn nothing_reaches_the_devices_after_stop() {
    let recorder = Recorder::new();
    let (signaler, _notifications) = signaler(both(&recorder));

    signaler.start("SOS", true, true).unwrap();
    assert!(signaler.is_running());
    sleep(ms(120));
    signaler.stop();
    assert!(!signaler.is_running());

    let after_stop = recorder.len();
    assert!(after_stop > 0);
    assert_eq!(recorder.commands(ChannelKind::Pulse).last(), Some(&Command::Off));
    assert_eq!(recorder.commands(ChannelKind::Tone).last(), Some(&Command::Silence));

    // well over one base unit
    sleep(ms(60));
    assert_eq!(recorder.len(), after_stop);
}

#[test]
fn stop_is_idempotent() {
    let recorder = Recorder::new();
    let (signaler, notifications) = signaler(both(&recorder));

    signaler.stop();
    signaler.stop();
    assert!(notifications.try_iter().next().is_none());

    signaler.start("E", true, true).unwrap();
    sleep(ms(5));
    signaler.stop();
    let commands = recorder.len();
    signaler.stop();

    assert_eq!(recorder.len(), commands);
    assert!(!signaler.is_running());
    assert_eq!(
        notifications.try_iter().collect::<Vec<_>>(),
        [
            Notification::Started {
                outputs: OutputSet::ALL
            },
            Notification::Stopped,
        ]
    );
}

#[test]
fn message_repeats_until_stopped() {
    let recorder = Recorder::new();
    let (signaler, _notifications) = signaler(both(&recorder));

    // dot, element gap and loop gap: one cycle every 60 ms
    let playback = signaler.start("E", true, false).unwrap();
    assert_eq!(playback.cycle, ms(60));

    sleep(ms(250));
    signaler.stop();

    assert!(count_on(&recorder, ChannelKind::Pulse) >= 3);
    assert!(recorder.commands(ChannelKind::Tone).is_empty());
}

#[test]
fn missing_light_refuses_light_only() {
    let recorder = Recorder::new();
    let (signaler, notifications) = signaler(Outputs::new().with_tone(recorder.tone()));

    let missing = OutputSet::only(ChannelKind::Pulse);
    assert_eq!(
        signaler.start("E", true, false),
        Err(StartError::HardwareUnavailable { missing })
    );
    assert_eq!(
        notifications.try_iter().collect::<Vec<_>>(),
        [Notification::Refused(StartError::HardwareUnavailable {
            missing
        })]
    );
    assert!(!signaler.is_running());
    sleep(ms(30));
    assert!(recorder.is_empty());
}

#[test]
fn missing_light_degrades_to_sound() {
    let recorder = Recorder::new();
    let (signaler, notifications) = signaler(Outputs::new().with_tone(recorder.tone()));

    let playback = signaler.start("E", true, true).unwrap();
    assert_eq!(playback.outputs, OutputSet::only(ChannelKind::Tone));
    assert_eq!(playback.unavailable, OutputSet::only(ChannelKind::Pulse));

    sleep(ms(30));
    signaler.stop();

    assert_eq!(
        recorder.commands(ChannelKind::Tone).first(),
        Some(&Command::Tone(ms(10)))
    );
    assert!(recorder.commands(ChannelKind::Pulse).is_empty());

    let notifications = notifications.try_iter().collect::<Vec<_>>();
    assert_eq!(
        notifications[..2],
        [
            Notification::Degraded {
                unavailable: OutputSet::only(ChannelKind::Pulse)
            },
            Notification::Started {
                outputs: OutputSet::only(ChannelKind::Tone)
            },
        ]
    );
    assert!(
        !notifications
            .iter()
            .any(|notification| matches!(notification, Notification::Refused(_))),
        "{notifications:?}"
    );
}

#[test]
fn refusals_never_touch_the_devices() {
    let recorder = Recorder::new();
    let (signaler, notifications) = signaler(both(&recorder));

    assert_eq!(
        signaler.start("SOS", false, false),
        Err(StartError::NoOutputSelected)
    );
    assert_eq!(signaler.start("", true, true), Err(StartError::NoSignal));
    assert_eq!(signaler.start("   ", true, true), Err(StartError::NoSignal));

    assert_eq!(signaler.start("#~", true, true), Err(StartError::NoSignal));
    let notifications = notifications.try_iter().collect::<Vec<_>>();
    let warnings = notifications
        .iter()
        .filter(|notification| matches!(notification, Notification::EncodingWarning(_)))
        .count();
    assert_eq!(warnings, 2);
    assert_eq!(
        notifications.last(),
        Some(&Notification::Refused(StartError::NoSignal))
    );

    sleep(ms(30));
    assert!(recorder.is_empty());
    assert!(!signaler.is_running());
}

#[test]
fn start_replaces_current_playback() {
    let recorder = Recorder::new();
    let (signaler, notifications) = signaler(both(&recorder));

    signaler.start("T", true, false).unwrap();
    // in the middle of the dash
    sleep(ms(15));
    signaler.start("E", true, false).unwrap();
    assert!(signaler.is_running());

    let commands = recorder.commands(ChannelKind::Pulse);
    assert_eq!(commands[..2], [Command::On, Command::Off]);

    signaler.stop();
    let notifications = notifications.try_iter().collect::<Vec<_>>();
    assert_eq!(
        notifications,
        [
            Notification::Started {
                outputs: OutputSet::only(ChannelKind::Pulse)
            },
            Notification::Stopped,
            Notification::Started {
                outputs: OutputSet::only(ChannelKind::Pulse)
            },
            Notification::Stopped,
        ]
    );
}

#[test]
fn jammed_light_does_not_keep_the_tone_sounding() {
    let recorder = Recorder::new();
    let (signaler, notifications) =
        signaler(Outputs::new().with_pulse(JammedLight).with_tone(recorder.tone()));

    signaler.start("T", true, true).unwrap();
    // in the middle of the dash
    sleep(ms(15));
    signaler.stop();

    assert!(!signaler.is_running());
    assert_eq!(
        recorder.commands(ChannelKind::Tone),
        [Command::Tone(ms(30)), Command::Silence]
    );
    assert_eq!(notifications.try_iter().last(), Some(Notification::Stopped));

    // the signaler is still usable
    signaler.start("E", false, true).unwrap();
    signaler.stop();
}

#[test]
fn failing_light_keeps_sound_going() {
    let recorder = Recorder::new();
    recorder.set_failing(ChannelKind::Pulse, true);
    let (signaler, notifications) = signaler(both(&recorder));

    signaler.start("EE", true, true).unwrap();
    sleep(ms(100));
    assert!(signaler.is_running());
    signaler.stop();

    assert!(count_on(&recorder, ChannelKind::Tone) >= 2);
    assert!(recorder.commands(ChannelKind::Pulse).is_empty());

    let failures = notifications
        .try_iter()
        .filter(|notification| {
            *notification
                == Notification::ChannelFailed {
                    channel: ChannelKind::Pulse,
                }
        })
        .count();
    assert_eq!(failures, 1);
}

#[test]
fn panicking_device_stops_playback_and_can_be_restarted() {
    let recorder = Recorder::new();
    recorder.set_panicking(ChannelKind::Tone, true);
    let (signaler, notifications) = signaler(both(&recorder));

    signaler.start("E", true, true).unwrap();

    let fault = wait_for(&notifications, |notification| {
        matches!(notification, Notification::Fault(_))
    });
    assert!(fault.is_some(), "no fault reported");
    assert!(!signaler.is_running());
    assert_eq!(recorder.commands(ChannelKind::Pulse).last(), Some(&Command::Off));

    // stopping after the fault has nothing left to do
    signaler.stop();

    recorder.set_panicking(ChannelKind::Tone, false);
    signaler.start("E", true, true).unwrap();
    sleep(ms(30));
    signaler.stop();
    assert_eq!(count_on(&recorder, ChannelKind::Tone), 1);
}

#[test]
fn released_signaler_refuses_to_start() {
    let recorder = Recorder::new();
    let (signaler, notifications) = signaler(both(&recorder));

    signaler.start("E", true, true).unwrap();
    signaler.release();
    signaler.release();
    assert!(signaler.is_released());
    assert!(!signaler.is_running());
    assert_eq!(recorder.commands(ChannelKind::Pulse).last(), Some(&Command::Off));

    assert_eq!(signaler.start("E", true, true), Err(StartError::Released));
    assert_eq!(
        notifications.try_iter().last(),
        Some(Notification::Refused(StartError::Released))
    );
}

#[test]
fn stop_from_another_thread() {
    let recorder = Recorder::new();
    let (signaler, _notifications) = signaler(both(&recorder));
    let signaler = Arc::new(signaler);

    signaler.start("SOS", true, true).unwrap();

    let stopper = std::thread::spawn({
        let signaler = signaler.clone();
        move || {
            sleep(ms(50));
            signaler.stop();
        }
    });
    stopper.join().unwrap();

    assert!(!signaler.is_running());
    let after_stop = recorder.len();
    sleep(ms(40));
    assert_eq!(recorder.len(), after_stop);
}

#[test]
fn sos_shortcut() {
    let recorder = Recorder::new();
    let signaler = Signaler::new(timing(), both(&recorder), LogSink).unwrap();

    let playback = signaler.start_sos(true, true).unwrap();
    assert_eq!(playback.cycle, encode("SOS").cycle_duration(&timing()));
    assert_eq!(playback.outputs, OutputSet::ALL);
    signaler.stop();
}

#[test]
fn zero_unit_is_rejected() {
    let result = Signaler::new(
        Timing::new(Duration::ZERO, ms(10), ms(10)),
        Outputs::new(),
        (),
    );
    assert!(matches!(result, Err(SignalerError::ZeroUnit)));
}

#[tokio::test]
async fn notifications_over_tokio_channel() {
    let recorder = Recorder::new();
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    let signaler = Signaler::new(timing(), both(&recorder), sender).unwrap();

    signaler.start("E", false, true).unwrap();
    assert_eq!(
        receiver.recv().await,
        Some(Notification::Started {
            outputs: OutputSet::only(ChannelKind::Tone)
        })
    );

    tokio::time::sleep(ms(30)).await;
    signaler.stop();
    assert_eq!(receiver.recv().await, Some(Notification::Stopped));
    assert_eq!(count_on(&recorder, ChannelKind::Tone), 1);

    // dropping releases the signaler, which must not block the runtime
    drop(signaler);
}
