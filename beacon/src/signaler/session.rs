//! The playback state machine.
//!
//! Everything here is synchronous and takes the current time as an argument.
//! The driver in the parent module only sleeps until the next deadline and
//! calls [`Engine::fire`].

use std::{
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};

use crate::{
    channel::{
        Channels,
        OutputSet,
    },
    morse::SymbolSequence,
    notify::{
        Notification,
        NotificationSink,
    },
    timing::Timing,
};

/// One playback of a message.
#[derive(Debug)]
pub(crate) struct Session {
    generation: u64,
    sequence: SymbolSequence,
    /// Index of the symbol the next tick plays.
    cursor: usize,
    outputs: OutputSet,
    next_tick: Instant,
    /// When the current mark ends and the outputs have to go off.
    pending_off: Option<Instant>,
    failures_reported: OutputSet,
}

impl Session {
    fn next_deadline(&self) -> Instant {
        self.pending_off
            .map_or(self.next_tick, |off| off.min(self.next_tick))
    }
}

#[derive(derive_more::Debug)]
pub(crate) struct Engine {
    timing: Timing,
    /// Wake-ups later than this are logged and playback resumes from the
    /// actual time instead of trying to catch up.
    max_lag: Duration,
    channels: Channels,
    session: Option<Session>,
    generation: u64,
    #[debug(skip)]
    sink: Arc<dyn NotificationSink>,
}

impl Engine {
    pub fn new(
        timing: Timing,
        max_lag: Duration,
        channels: Channels,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            timing,
            max_lag,
            channels,
            session: None,
            generation: 0,
            sink,
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn available_outputs(&self) -> OutputSet {
        self.channels.available()
    }

    /// Replaces any current session with a new one whose first tick is due
    /// at `now`. Returns the generation identifying the new session.
    pub fn install(&mut self, sequence: SymbolSequence, outputs: OutputSet, now: Instant) -> u64 {
        self.clear();

        self.generation += 1;
        self.session = Some(Session {
            generation: self.generation,
            sequence,
            cursor: 0,
            outputs,
            next_tick: now,
            pending_off: None,
            failures_reported: OutputSet::NONE,
        });

        self.generation
    }

    /// Ends the current session and switches all outputs off. Returns whether
    /// there was a session.
    pub fn clear(&mut self) -> bool {
        // drop the session first, so a panicking device can't leave it behind
        let had_session = self.session.take().is_some();
        self.channels.turn_off_all();
        had_session
    }

    /// When the session `generation` next needs attention, or `None` if that
    /// session is gone.
    pub fn deadline(&self, generation: u64) -> Option<Instant> {
        self.session
            .as_ref()
            .filter(|session| session.generation == generation)
            .map(Session::next_deadline)
    }

    /// Runs whatever is due at `now` for session `generation` and returns the
    /// next deadline. Stale generations are ignored and return `None`.
    pub fn fire(&mut self, generation: u64, now: Instant) -> Option<Instant> {
        let Self {
            timing,
            max_lag,
            channels,
            session,
            sink,
            ..
        } = self;

        let session = session
            .as_mut()
            .filter(|session| session.generation == generation)?;

        if let Some(off) = session.pending_off {
            if off <= now {
                channels.turn_off(session.outputs);
                session.pending_off = None;
            }
        }

        if session.next_tick <= now {
            let lag = now - session.next_tick;
            if lag > *max_lag {
                tracing::warn!(?lag, "Tick is late, resynchronizing");
                session.next_tick = now;
            }
            tick(session, timing, channels, &**sink);
        }

        Some(session.next_deadline())
    }
}

/// Plays the symbol under the cursor and re-arms the session.
fn tick(
    session: &mut Session,
    timing: &Timing,
    channels: &mut Channels,
    sink: &dyn NotificationSink,
) {
    // deadlines are relative to when this tick was due, not when it ran, so
    // timer jitter doesn't add up over a long message
    let at = session.next_tick;
    let symbol = session.sequence[session.cursor];

    channels.turn_off(session.outputs);
    session.pending_off = None;

    let durations = timing.durations(symbol);
    tracing::trace!(?symbol, cursor = session.cursor, ?durations);

    if !durations.on.is_zero() {
        for channel in session.outputs.iter() {
            let output = channels.get_mut(channel);
            if !output.turn_on(durations.on) && !session.failures_reported.contains(channel) {
                session.failures_reported.set(channel, true);
                sink.notify(Notification::ChannelFailed {
                    channel: output.kind(),
                });
            }
        }
        session.pending_off = Some(at + durations.on);
    }

    // the sequence ends in a loop gap, so wrapping around is all looping takes
    session.cursor = (session.cursor + 1) % session.sequence.len();
    session.next_tick = at + durations.total();
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{
            AssertUnwindSafe,
            catch_unwind,
        },
        sync::Arc,
        time::{
            Duration,
            Instant,
        },
    };

    use crate::{
        channel::{
            ChannelKind,
            Channels,
            OutputSet,
        },
        device::{
            Outputs,
            recording::{
                Command,
                Recorder,
            },
        },
        morse::encode,
        signaler::session::Engine,
        timing::Timing,
    };

    const D: Duration = Duration::from_millis(10);
    const WORD_GAP: Duration = Duration::from_millis(70);
    const LOOP_GAP: Duration = Duration::from_millis(500);

    fn engine(recorder: &Recorder) -> Engine {
        Engine::new(
            Timing::new(D, WORD_GAP, LOOP_GAP),
            Duration::from_secs(60),
            Channels::new(
                Outputs::new()
                    .with_pulse(recorder.pulse())
                    .with_tone(recorder.tone()),
            ),
            Arc::new(()),
        )
    }

    /// Fires every deadline up to `until` and returns the times at which the
    /// light went on.
    fn run_until(
        engine: &mut Engine,
        generation: u64,
        start: Instant,
        until: Instant,
        recorder: &Recorder,
    ) -> Vec<Duration> {
        let mut on_times = vec![];
        let mut deadline = engine.deadline(generation);
        while let Some(at) = deadline.filter(|at| *at <= until) {
            let before = recorder.commands(ChannelKind::Pulse).len();
            deadline = engine.fire(generation, at);
            let commands = recorder.commands(ChannelKind::Pulse);
            if commands[before..].contains(&Command::On) {
                on_times.push(at - start);
            }
        }
        on_times
    }

    #[test]
    fn single_dot_repeats_after_the_loop_gap() {
        let recorder = Recorder::new();
        let mut engine = engine(&recorder);

        let start = Instant::now();
        let generation = engine.install(encode("E"), OutputSet::ALL, start);

        let on_times = run_until(&mut engine, generation, start, start + Duration::from_secs(2), &recorder);

        // dot, element gap, then the loop gap before the next dot
        let cycle = D + D + LOOP_GAP;
        assert_eq!(on_times, [Duration::ZERO, cycle, cycle * 2, cycle * 3]);
    }

    #[test]
    fn marks_switch_on_and_off_at_the_right_times() {
        let recorder = Recorder::new();
        let mut engine = engine(&recorder);

        let start = Instant::now();
        let generation = engine.install(encode("A"), OutputSet::only(ChannelKind::Pulse), start);

        // dot
        assert_eq!(engine.fire(generation, start), Some(start + D));
        assert_eq!(recorder.commands(ChannelKind::Pulse), [Command::On]);
        // dot ends
        assert_eq!(engine.fire(generation, start + D), Some(start + 2 * D));
        assert_eq!(recorder.commands(ChannelKind::Pulse), [Command::On, Command::Off]);
        // element gap
        assert_eq!(engine.fire(generation, start + 2 * D), Some(start + 3 * D));
        // dash, 3 units
        assert_eq!(engine.fire(generation, start + 3 * D), Some(start + 6 * D));
        assert_eq!(engine.fire(generation, start + 6 * D), Some(start + 7 * D));
        assert_eq!(
            recorder.commands(ChannelKind::Pulse),
            [Command::On, Command::Off, Command::On, Command::Off]
        );
        // loop gap
        assert_eq!(engine.fire(generation, start + 7 * D), Some(start + 7 * D + LOOP_GAP));

        // the tone channel was never asked for
        assert!(recorder.commands(ChannelKind::Tone).is_empty());
    }

    #[test]
    fn tone_is_given_the_mark_duration() {
        let recorder = Recorder::new();
        let mut engine = engine(&recorder);

        let start = Instant::now();
        let generation = engine.install(encode("T"), OutputSet::only(ChannelKind::Tone), start);
        engine.fire(generation, start);
        engine.fire(generation, start + 3 * D);

        assert_eq!(
            recorder.commands(ChannelKind::Tone),
            [Command::Tone(3 * D), Command::Silence]
        );
    }

    #[test]
    fn word_gap_uses_its_own_duration() {
        let recorder = Recorder::new();
        let mut engine = engine(&recorder);

        let start = Instant::now();
        let generation = engine.install(encode("E E"), OutputSet::ALL, start);
        let on_times = run_until(&mut engine, generation, start, start + D * 20, &recorder);

        // dot + element gap, then the word gap
        assert_eq!(on_times, [Duration::ZERO, D + D + WORD_GAP]);
    }

    #[test]
    fn stale_generation_is_ignored() {
        let recorder = Recorder::new();
        let mut engine = engine(&recorder);

        let start = Instant::now();
        let old = engine.install(encode("E"), OutputSet::ALL, start);
        engine.fire(old, start);

        let new = engine.install(encode("T"), OutputSet::ALL, start);
        assert_ne!(old, new);
        // installing switched everything off
        assert_eq!(
            recorder.commands(ChannelKind::Pulse),
            [Command::On, Command::Off]
        );

        recorder.clear();
        assert_eq!(engine.fire(old, start + D), None);
        assert_eq!(engine.deadline(old), None);
        assert!(recorder.is_empty());
    }

    #[test]
    fn clear_switches_off_mid_mark() {
        let recorder = Recorder::new();
        let mut engine = engine(&recorder);

        let start = Instant::now();
        let generation = engine.install(encode("T"), OutputSet::ALL, start);
        engine.fire(generation, start);
        assert!(engine.deadline(generation).is_some());

        assert!(engine.clear());
        assert!(!engine.clear());
        assert!(engine.deadline(generation).is_none());
        assert_eq!(
            recorder.commands(ChannelKind::Pulse),
            [Command::On, Command::Off]
        );
        assert_eq!(
            recorder.commands(ChannelKind::Tone),
            [Command::Tone(3 * D), Command::Silence]
        );
        assert_eq!(engine.fire(generation, start + 3 * D), None);
    }

    #[test]
    fn clear_reaches_a_device_that_panicked_mid_playback() {
        let recorder = Recorder::new();
        let mut engine = engine(&recorder);

        let start = Instant::now();
        let generation = engine.install(encode("T"), OutputSet::only(ChannelKind::Tone), start);

        // the tone starts sounding, then its device panics
        recorder.set_panicking_after(ChannelKind::Tone, true);
        let result = catch_unwind(AssertUnwindSafe(|| engine.fire(generation, start)));
        assert!(result.is_err());

        assert!(engine.clear());
        assert_eq!(
            recorder.commands(ChannelKind::Tone),
            [Command::Tone(3 * D), Command::Silence]
        );
    }

    #[test]
    fn late_tick_resynchronizes() {
        let recorder = Recorder::new();
        let mut engine = Engine::new(
            Timing::new(D, WORD_GAP, LOOP_GAP),
            Duration::from_millis(50),
            Channels::new(Outputs::new().with_pulse(recorder.pulse())),
            Arc::new(()),
        );

        let start = Instant::now();
        let generation = engine.install(encode("E"), OutputSet::ALL, start);

        // woken up a second late: schedule from now rather than replaying
        let late = start + Duration::from_secs(1);
        assert_eq!(engine.fire(generation, late), Some(late + D));
    }

    #[test]
    fn failing_channel_does_not_stop_playback() {
        let recorder = Recorder::new();
        let (sender, receiver) = std::sync::mpsc::channel();
        let mut engine = Engine::new(
            Timing::new(D, WORD_GAP, LOOP_GAP),
            Duration::from_secs(60),
            Channels::new(
                Outputs::new()
                    .with_pulse(recorder.pulse())
                    .with_tone(recorder.tone()),
            ),
            Arc::new(sender),
        );
        recorder.set_failing(ChannelKind::Pulse, true);

        let start = Instant::now();
        let generation = engine.install(encode("EEE"), OutputSet::ALL, start);
        let mut deadline = engine.deadline(generation);
        while let Some(at) = deadline.filter(|at| *at <= start + 10 * D) {
            deadline = engine.fire(generation, at);
        }

        let tones = recorder
            .commands(ChannelKind::Tone)
            .into_iter()
            .filter(|command| command.is_on())
            .count();
        assert_eq!(tones, 3);

        // reported once, not for every dot
        let failures = receiver.try_iter().collect::<Vec<_>>();
        assert_eq!(
            failures,
            [crate::notify::Notification::ChannelFailed {
                channel: ChannelKind::Pulse
            }]
        );
    }
}
