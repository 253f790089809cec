mod args;
mod config;
mod files;

use std::{
    fs::OpenOptions,
    sync::Mutex,
    time::{
        Duration,
        Instant,
    },
};

use beacon::{
    ChannelKind,
    Notification,
    OutputSet,
    Outputs,
    Signaler,
    Timing,
    device::{
        PulseDevice,
        ToneDevice,
        led::SysfsLed,
        recording::Recorder,
    },
    morse,
    signaler::SOS,
};
use clap::Parser;
use color_eyre::eyre::{
    Error,
    bail,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::{
    args::{
        Command,
        MainArgs,
        OutputArgs,
    },
    config::{
        Config,
        ToneConfig,
    },
    files::AppFiles,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    color_eyre::install()?;

    let args = MainArgs::parse();
    let app_files = AppFiles::new()?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(app_files.log_file())?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    tracing::info!("Starting beacon-cli");
    tracing::debug!(?args);

    let config = if let Some(path) = &args.config {
        Config::from_path(path)?
    }
    else {
        app_files.config()?
    };

    let result = match args.command {
        Command::Encode { text, timing } => encode(&text.join(" "), config.timing(&timing)?),
        Command::Play { text, output } => play(&text.join(" "), &config, &output).await,
        Command::Sos { output } => play(SOS, &config, &output).await,
    };

    if let Err(error) = &result {
        tracing::error!(?error);
    }
    else {
        tracing::info!("Program exiting");
    }

    result
}

fn encode(text: &str, timing: Timing) -> Result<(), Error> {
    let sequence = morse::encode_with(text, |warning| {
        tracing::warn!(%warning, "Skipping character");
        eprintln!("warning: {warning}");
    });

    if !sequence.has_signal() {
        bail!("Nothing in {text:?} can be signalled");
    }

    println!("{sequence}");
    println!(
        "One repetition takes {:?} at {:.1} wpm",
        sequence.cycle_duration(&timing),
        timing.wpm()
    );

    Ok(())
}

async fn play(text: &str, config: &Config, args: &OutputArgs) -> Result<(), Error> {
    let timing = config.timing(&args.timing)?;
    let tone = config.tone(args)?;
    let stop_after = args.duration.map(Duration::try_from_secs_f64).transpose()?;

    let recorder = args.dry_run.then(|| Recorder::new().logging());
    let (outputs, use_light) = if let Some(recorder) = &recorder {
        let outputs = Outputs::new()
            .with_pulse(recorder.pulse())
            .with_tone(recorder.tone());
        (outputs, true)
    }
    else {
        let light_path = config.light_path(args);
        let outputs = Outputs {
            pulse: light_path.and_then(open_light),
            tone: tone.enabled.then(|| open_tone(&tone)).flatten(),
        };
        (outputs, light_path.is_some())
    };

    let (sender, mut notifications) = mpsc::unbounded_channel();
    let signaler = Signaler::new(timing, outputs, sender)?;

    let started_at = Instant::now();
    let playback = match signaler.start(text, use_light, tone.enabled) {
        Ok(playback) => playback,
        Err(error) => {
            while let Ok(notification) = notifications.try_recv() {
                report(&notification);
            }
            return Err(error.into());
        }
    };
    eprintln!(
        "Signalling {text:?} with {}. One repetition takes {:?}. Press Ctrl-C to stop.",
        describe(playback.outputs),
        playback.cycle,
    );

    let stop = async {
        match stop_after {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop);

    let result = loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                break result.map_err(Error::from);
            }
            _ = &mut stop => {
                break Ok(());
            }
            Some(notification) = notifications.recv() => {
                report(&notification);
                if let Notification::Fault(fault) = notification {
                    break Err(fault.into());
                }
            }
        }
    };

    signaler.release();
    while let Ok(notification) = notifications.try_recv() {
        report(&notification);
    }

    if let Some(recorder) = &recorder {
        for event in recorder.events() {
            let at = event.at.saturating_duration_since(started_at);
            println!(
                "{:>8.3}s  {:<5}  {:?}",
                at.as_secs_f64(),
                channel_name(event.channel),
                event.command
            );
        }
    }

    result
}

fn open_light(path: &std::path::Path) -> Option<Box<dyn PulseDevice>> {
    match SysfsLed::open(path) {
        Ok(led) => {
            tracing::debug!(
                path = %led.path().display(),
                max_brightness = led.max_brightness(),
                "Opened LED"
            );
            Some(Box::new(led))
        }
        Err(error) => {
            tracing::warn!(?error, path = %path.display(), "Failed to open LED");
            eprintln!("warning: can't use LED at {}: {error}", path.display());
            None
        }
    }
}

#[cfg(feature = "audio")]
fn open_tone(tone: &ToneConfig) -> Option<Box<dyn ToneDevice>> {
    match beacon::device::audio::AudioTone::new(tone.frequency, tone.volume) {
        Ok(device) => Some(Box::new(device)),
        Err(error) => {
            tracing::warn!(?error, "Failed to open audio output");
            eprintln!("warning: can't play sound: {error}");
            None
        }
    }
}

#[cfg(not(feature = "audio"))]
fn open_tone(_tone: &ToneConfig) -> Option<Box<dyn ToneDevice>> {
    Some(Box::new(beacon::device::bell::TerminalBell))
}

fn report(notification: &Notification) {
    match notification {
        Notification::Degraded { unavailable } => {
            eprintln!("warning: continuing without {}", describe(*unavailable));
        }
        Notification::EncodingWarning(warning) => eprintln!("warning: skipping {warning}"),
        Notification::ChannelFailed { channel } => {
            eprintln!("warning: the {} output is failing", channel_name(*channel));
        }
        Notification::Fault(fault) => eprintln!("error: {fault}"),
        Notification::Stopped => eprintln!("Stopped"),
        // refusals are returned from start, and start is reported separately
        Notification::Started { .. } | Notification::Refused(_) => {}
    }
}

fn channel_name(channel: ChannelKind) -> &'static str {
    match channel {
        ChannelKind::Pulse => "light",
        ChannelKind::Tone => "sound",
    }
}

fn describe(outputs: OutputSet) -> String {
    outputs
        .iter()
        .map(channel_name)
        .collect::<Vec<_>>()
        .join(" and ")
}
