use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

use beacon::Timing;
use color_eyre::eyre::{
    Error,
    bail,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::args::{
    OutputArgs,
    TimingArgs,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: Timing,
    pub tone: ToneConfig,
    pub light: LightConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub enabled: bool,
    pub frequency: f32,
    pub volume: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: 700.0,
            volume: 0.5,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// sysfs `brightness` file of the LED to flash.
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        tracing::debug!(path = %path.as_ref().display(), "Loading config from file");
        Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
    }

    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        tracing::debug!(path = %path.as_ref().display(), "Writing config to file");
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Configured timing with the command line overrides applied.
    pub fn timing(&self, args: &TimingArgs) -> Result<Timing, Error> {
        let mut timing = if let Some(wpm) = args.wpm {
            Timing::from_wpm(wpm).with_loop_gap(self.timing.loop_gap)
        }
        else {
            self.timing
        };

        if let Some(unit) = args.unit {
            timing.unit = Duration::from_millis(unit);
        }
        if let Some(word_gap) = args.word_gap {
            timing = timing.with_word_gap(Duration::from_millis(word_gap));
        }
        if let Some(loop_gap) = args.loop_gap {
            timing = timing.with_loop_gap(Duration::from_millis(loop_gap));
        }

        if timing.unit.is_zero() {
            bail!("The unit must be greater than 0");
        }

        Ok(timing)
    }

    pub fn tone(&self, args: &OutputArgs) -> Result<ToneConfig, Error> {
        let mut tone = self.tone;

        if args.no_sound {
            tone.enabled = false;
        }
        if let Some(frequency) = args.frequency {
            tone.frequency = frequency;
        }
        if let Some(volume) = args.volume {
            tone.volume = volume;
        }

        if tone.frequency.is_nan() || tone.frequency <= 0.0 {
            bail!("The tone frequency must be greater than 0");
        }
        if !(0.0..=1.0).contains(&tone.volume) {
            bail!("The volume must be between 0 and 1");
        }

        Ok(tone)
    }

    pub fn light_path<'a>(&'a self, args: &'a OutputArgs) -> Option<&'a Path> {
        args.light.as_deref().or(self.light.path.as_deref())
    }
}
