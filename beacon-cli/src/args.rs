use std::path::PathBuf;

use clap::{
    Parser,
    Subcommand,
};

#[derive(Debug, Parser)]
#[command(version, about = "Signal messages in Morse code with a light and a tone")]
pub struct MainArgs {
    /// Config file to use instead of the one in the config directory.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the Morse code for a message.
    Encode {
        #[clap(required = true)]
        text: Vec<String>,

        #[clap(flatten)]
        timing: TimingArgs,
    },

    /// Signal a message over and over until interrupted.
    Play {
        #[clap(required = true)]
        text: Vec<String>,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Signal SOS until interrupted.
    Sos {
        #[clap(flatten)]
        output: OutputArgs,
    },
}

#[derive(Debug, clap::Args)]
pub struct TimingArgs {
    /// Speed in words per minute.
    #[clap(long, conflicts_with = "unit", value_parser = clap::value_parser!(u32).range(1..))]
    pub wpm: Option<u32>,

    /// Length of a dot in milliseconds.
    #[clap(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub unit: Option<u64>,

    /// Pause between words in milliseconds.
    #[clap(long)]
    pub word_gap: Option<u64>,

    /// Pause before the message repeats in milliseconds.
    #[clap(long)]
    pub loop_gap: Option<u64>,
}

#[derive(Debug, clap::Args)]
pub struct OutputArgs {
    #[clap(flatten)]
    pub timing: TimingArgs,

    /// LED to flash, given by its sysfs `brightness` file.
    #[clap(long)]
    pub light: Option<PathBuf>,

    /// Don't sound a tone.
    #[clap(long)]
    pub no_sound: bool,

    /// Tone frequency in Hz.
    #[clap(long)]
    pub frequency: Option<f32>,

    /// Tone volume between 0 and 1.
    #[clap(long)]
    pub volume: Option<f32>,

    /// Stop after this many seconds.
    #[clap(long = "for", value_name = "SECONDS")]
    pub duration: Option<f64>,

    /// Print what would be signalled instead of using any hardware.
    #[clap(long)]
    pub dry_run: bool,
}
