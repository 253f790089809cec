//! Plays a message on the outputs, over and over, until stopped.
//!
//! Ticks run on a dedicated single-worker runtime. `start`, `stop` and
//! `release` can be called from any other thread. They are serialized by a
//! control lock and synchronize with the ticks through the engine lock, so
//! once `stop` returns nothing from the stopped playback reaches a device
//! anymore.

mod session;

use std::{
    any::Any,
    panic::{
        AssertUnwindSafe,
        catch_unwind,
    },
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
    time::{
        Duration,
        Instant,
    },
};

use parking_lot::Mutex;
use tokio::{
    runtime::Runtime,
    task::JoinHandle,
};

use self::session::Engine;
use crate::{
    channel::{
        Channels,
        OutputSet,
        panic_message,
    },
    device::Outputs,
    morse,
    notify::{
        Notification,
        NotificationSink,
    },
    timing::Timing,
};

pub const SOS: &str = "SOS";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignalerConfig {
    pub timing: Timing,

    /// How late a tick may run before playback gives up on catching up and
    /// continues from the current time.
    pub max_lag: Duration,
}

impl Default for SignalerConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            max_lag: Duration::from_millis(50),
        }
    }
}

impl From<Timing> for SignalerConfig {
    fn from(value: Timing) -> Self {
        Self {
            timing: value,
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignalerError {
    #[error("invalid timing: the base unit must not be zero")]
    ZeroUnit,
    #[error("failed to start scheduler runtime")]
    Runtime(#[source] std::io::Error),
}

/// Why `start` didn't start anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("neither light nor sound was selected")]
    NoOutputSelected,
    #[error("the message contains nothing that can be signalled")]
    NoSignal,
    #[error("no device for the requested outputs: {missing:?}")]
    HardwareUnavailable { missing: OutputSet },
    #[error("the signaler has been released")]
    Released,
}

/// A tick failed unexpectedly, e.g. because a device panicked.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("scheduling fault: {message}")]
pub struct SchedulingFault {
    pub message: String,
}

impl SchedulingFault {
    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self {
            message: panic_message(&*payload),
        }
    }
}

/// A playback that was started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Playback {
    /// Outputs that are being keyed.
    pub outputs: OutputSet,
    /// Requested outputs that are missing.
    pub unavailable: OutputSet,
    /// Time one repetition of the message takes.
    pub cycle: Duration,
}

#[derive(Debug)]
struct Shared {
    /// Cleared by `stop` before it takes the engine lock, so a tick that's
    /// waiting for the lock bails out.
    active: AtomicBool,
    engine: Mutex<Engine>,
}

#[derive(Debug)]
struct Control {
    runtime: Option<Runtime>,
    driver: Option<JoinHandle<()>>,
}

/// Plays Morse messages on a light and a tone output.
#[derive(derive_more::Debug)]
pub struct Signaler {
    shared: Arc<Shared>,
    control: Mutex<Control>,
    #[debug(skip)]
    sink: Arc<dyn NotificationSink>,
}

impl Signaler {
    pub fn new(
        config: impl Into<SignalerConfig>,
        outputs: Outputs,
        sink: impl NotificationSink,
    ) -> Result<Self, SignalerError> {
        let config = config.into();
        if config.timing.unit.is_zero() {
            return Err(SignalerError::ZeroUnit);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("beacon-signaler")
            .enable_time()
            .build()
            .map_err(SignalerError::Runtime)?;

        let sink: Arc<dyn NotificationSink> = Arc::new(sink);
        let channels = Channels::new(outputs);
        tracing::debug!(?config, available = ?channels.available(), "Creating signaler");

        Ok(Self {
            shared: Arc::new(Shared {
                active: AtomicBool::new(false),
                engine: Mutex::new(Engine::new(
                    config.timing,
                    config.max_lag,
                    channels,
                    sink.clone(),
                )),
            }),
            control: Mutex::new(Control {
                runtime: Some(runtime),
                driver: None,
            }),
            sink,
        })
    }

    /// Starts playing `text` in a loop, replacing whatever is playing.
    ///
    /// If only some of the requested outputs have a device, playback starts
    /// on those and [`Notification::Degraded`] is sent. Refusals are both
    /// returned and sent as [`Notification::Refused`].
    pub fn start(
        &self,
        text: &str,
        use_light: bool,
        use_sound: bool,
    ) -> Result<Playback, StartError> {
        let mut control = self.control.lock();
        self.stop_locked(&mut control);

        let requested = OutputSet::new(use_light, use_sound);
        let result = self.start_locked(&mut control, text, requested);

        if let Err(error) = &result {
            tracing::debug!(%error, "Start refused");
            self.sink.notify(Notification::Refused(*error));
        }

        result
    }

    /// Starts signalling SOS.
    pub fn start_sos(&self, use_light: bool, use_sound: bool) -> Result<Playback, StartError> {
        self.start(SOS, use_light, use_sound)
    }

    /// Stops playback and switches all outputs off. Does nothing if nothing
    /// is playing.
    pub fn stop(&self) {
        let mut control = self.control.lock();
        self.stop_locked(&mut control);
    }

    /// Stops playback and shuts the scheduler down. The signaler can't be
    /// started again afterwards.
    pub fn release(&self) {
        let mut control = self.control.lock();
        self.stop_locked(&mut control);

        if let Some(runtime) = control.runtime.take() {
            runtime.shutdown_background();
            tracing::debug!("Signaler released");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.control.lock().runtime.is_none()
    }

    pub fn timing(&self) -> Timing {
        *self.shared.engine.lock().timing()
    }

    /// Outputs that have a device.
    pub fn available_outputs(&self) -> OutputSet {
        self.shared.engine.lock().available_outputs()
    }

    fn start_locked(
        &self,
        control: &mut Control,
        text: &str,
        requested: OutputSet,
    ) -> Result<Playback, StartError> {
        let Some(runtime) = &control.runtime
        else {
            tracing::error!("Signaler used after release");
            return Err(StartError::Released);
        };

        if requested.is_empty() {
            return Err(StartError::NoOutputSelected);
        }

        let sequence = morse::encode_with(text, |warning| {
            tracing::warn!(%warning, "Skipping character");
            self.sink.notify(Notification::EncodingWarning(warning));
        });
        if !sequence.has_signal() {
            return Err(StartError::NoSignal);
        }

        let mut engine = self.shared.engine.lock();

        let available = engine.available_outputs();
        let outputs = requested.intersection(available);
        let unavailable = requested.difference(available);
        if outputs.is_empty() {
            return Err(StartError::HardwareUnavailable {
                missing: unavailable,
            });
        }
        if !unavailable.is_empty() {
            tracing::warn!(?unavailable, "Continuing without unavailable outputs");
            self.sink.notify(Notification::Degraded { unavailable });
        }

        let cycle = sequence.cycle_duration(engine.timing());
        tracing::debug!(%sequence, ?outputs, ?cycle, "Starting playback");

        let generation = engine.install(sequence, outputs, Instant::now());
        self.shared.active.store(true, Ordering::Release);
        drop(engine);

        self.sink.notify(Notification::Started { outputs });
        control.driver = Some(runtime.spawn(drive(
            self.shared.clone(),
            self.sink.clone(),
            generation,
        )));

        Ok(Playback {
            outputs,
            unavailable,
            cycle,
        })
    }

    fn stop_locked(&self, control: &mut Control) {
        self.shared.active.store(false, Ordering::Release);

        if let Some(driver) = control.driver.take() {
            driver.abort();
        }

        let was_running = {
            let mut engine = self.shared.engine.lock();
            catch_unwind(AssertUnwindSafe(|| engine.clear())).unwrap_or_else(|payload| {
                let fault = SchedulingFault::from_panic(payload);
                tracing::error!(%fault, "Switching outputs off failed");
                true
            })
        };

        if was_running {
            tracing::debug!("Playback stopped");
            self.sink.notify(Notification::Stopped);
        }
    }
}

impl Drop for Signaler {
    fn drop(&mut self) {
        self.release();
    }
}

/// Sleeps until the session needs attention and fires it, until the session
/// is gone.
async fn drive(shared: Arc<Shared>, sink: Arc<dyn NotificationSink>, generation: u64) {
    let mut deadline = shared.engine.lock().deadline(generation);

    while let Some(at) = deadline {
        tokio::time::sleep_until(at.into()).await;
        deadline = fire(&shared, &*sink, generation);
    }
}

fn fire(shared: &Shared, sink: &dyn NotificationSink, generation: u64) -> Option<Instant> {
    let mut engine = shared.engine.lock();

    if !shared.active.load(Ordering::Acquire) {
        return None;
    }

    match catch_unwind(AssertUnwindSafe(|| engine.fire(generation, Instant::now()))) {
        Ok(deadline) => deadline,
        Err(payload) => {
            let fault = SchedulingFault::from_panic(payload);
            tracing::error!(%fault, "Tick failed, stopping playback");

            shared.active.store(false, Ordering::Release);
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| engine.clear())) {
                let fault = SchedulingFault::from_panic(payload);
                tracing::error!(%fault, "Switching outputs off failed");
            }
            drop(engine);

            sink.notify(Notification::Fault(fault));
            None
        }
    }
}
