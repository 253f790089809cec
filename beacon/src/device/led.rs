use std::{
    fs::OpenOptions,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

use crate::device::{
    DeviceError,
    PulseDevice,
};

/// An LED exposed through the Linux LED class, e.g.
/// `/sys/class/leds/white:flash/brightness`.
///
/// Switching on writes the LED's `max_brightness`, switching off writes `0`.
#[derive(Clone, Debug)]
pub struct SysfsLed {
    path: PathBuf,
    max_brightness: u32,
}

impl SysfsLed {
    /// Opens the LED behind a `brightness` file. Fails if the file can't be
    /// written, so a missing or read-only LED shows up before playback.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref().to_owned();

        let max_brightness = path
            .parent()
            .map(|dir| dir.join("max_brightness"))
            .and_then(|max_path| std::fs::read_to_string(max_path).ok())
            .and_then(|contents| contents.trim().parse().ok())
            .filter(|max_brightness| *max_brightness > 0)
            .unwrap_or(1);

        tracing::debug!(path = %path.display(), max_brightness, "Opening LED");

        let mut led = Self {
            path,
            max_brightness,
        };
        led.set_on(false)?;
        Ok(led)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_brightness(&self) -> u32 {
        self.max_brightness
    }

    fn write_brightness(&self, brightness: u32) -> Result<(), std::io::Error> {
        // attribute files take one value per write, so reopen every time
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        writeln!(file, "{brightness}")?;
        Ok(())
    }
}

impl PulseDevice for SysfsLed {
    fn set_on(&mut self, on: bool) -> Result<(), DeviceError> {
        let brightness = if on { self.max_brightness } else { 0 };
        self.write_brightness(brightness)?;
        Ok(())
    }
}
