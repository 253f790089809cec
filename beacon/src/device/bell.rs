use std::{
    io::Write,
    time::Duration,
};

use crate::device::{
    DeviceError,
    ToneDevice,
};

/// Rings the terminal bell for every mark.
///
/// The bell has a fixed length, so dots and dashes sound alike. Only useful
/// when no audio output is available.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl ToneDevice for TerminalBell {
    fn start_tone(&mut self, _duration: Duration) -> Result<(), DeviceError> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }

    fn stop_tone(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}
