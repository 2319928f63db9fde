//! debug.rs
//!
//! Spoofs a Thorlabs meter without needing to actually connect to one.
//! Responses are scripted per command; every written command is recorded.

use std::collections::HashMap;

use crate::channel::{OpenChannel, ScpiChannel};
use crate::{PmError, PmResult, SessionConfig};

/// A scripted channel.
///
/// Writing a command that has a scripted response queues that response
/// (with a `\r\n` terminator, like the real consoles); the next read
/// returns it. Reading with nothing queued times out. Unscripted
/// queries discard whatever was queued, unscripted settings leave it.
///
/// # Example
///
/// ```rust
/// use thorlabs_pm::{DebugChannel, ScpiChannel};
/// let mut channel = DebugChannel::new().respond("*IDN?", "Thorlabs,PM100D,P0001,1.0.0");
/// channel.write_raw("*IDN?").unwrap();
/// assert_eq!(channel.read_raw(1024).unwrap(), "Thorlabs,PM100D,P0001,1.0.0\r\n");
/// assert!(channel.read_raw(1024).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct DebugChannel {
    responses : HashMap<String, String>,
    pending : Option<String>,
    written : Vec<String>,
    driver_revision : String,
    fail_writes : bool,
    fail_reads : bool,
}

impl Default for DebugChannel {
    fn default() -> Self {
        DebugChannel {
            responses : HashMap::new(),
            pending : None,
            written : Vec::new(),
            driver_revision : "DebugChannel 1.0.0\r\n".to_string(),
            fail_writes : false,
            fail_reads : false,
        }
    }
}

impl DebugChannel {
    pub fn new() -> Self {
        DebugChannel::default()
    }

    /// A PM100D console with an S120C photodiode head that reads 10 µA.
    pub fn pm100d() -> Self {
        DebugChannel::new()
            .respond("*IDN?", "Thorlabs,PM100D,P0012345,2.7.0")
            .respond("SYSTEM:SENSOR:IDN?", "S120C,12345678,01-Jan-2024,1,2,49")
            .respond("SYSTEM:ERROR:NEXT?", "+0,\"No error\"")
            .respond("READ?", "1.000000E-05")
            .respond("SENSE:CORRECTION:WAVELENGTH?", "6.330000E+02")
            .respond("SENSE:CORRECTION:WAVELENGTH? MINIMUM", "4.000000E+02")
            .respond("SENSE:CORRECTION:WAVELENGTH? MAXIMUM", "1.100000E+03")
            .respond("SENSE:CURRENT:DC:RANGE:UPPER?", "5.500000E-05")
            .respond("SENSE:CURRENT:DC:RANGE:UPPER? MINIMUM", "5.500000E-08")
            .respond("SENSE:CURRENT:DC:RANGE:UPPER? MAXIMUM", "5.500000E-03")
            .respond("SENSE:POWER:DC:RANGE:UPPER?", "1.000000E-03")
            .respond("SENSE:POWER:DC:RANGE:UPPER? MINIMUM", "5.000000E-08")
            .respond("SENSE:POWER:DC:RANGE:UPPER? MAXIMUM", "5.000000E-02")
            .respond("SENSE:CORRECTION:POWER:PDIODE:RESPONSE?", "4.132000E-01")
    }

    /// Script the response to a command.
    pub fn respond(mut self, command : &str, response : &str) -> Self {
        self.set_response(command, response);
        self
    }

    pub fn set_response(&mut self, command : &str, response : &str) {
        self.responses.insert(command.to_string(), response.to_string());
    }

    pub fn remove_response(&mut self, command : &str) {
        self.responses.remove(command);
    }

    pub fn with_driver_revision(mut self, revision : &str) -> Self {
        self.driver_revision = revision.to_string();
        self
    }

    /// Every write fails with a broken pipe.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Every read fails with a broken pipe.
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Commands written so far, oldest first.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }
}

fn broken_pipe() -> PmError {
    PmError::IoError(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "debug channel failure"))
}

impl ScpiChannel for DebugChannel {
    fn write_raw(&mut self, command : &str) -> PmResult<()> {
        if self.fail_writes { return Err(broken_pipe()); }
        self.written.push(command.to_string());
        match self.responses.get(command) {
            Some(response) => self.pending = Some(format!("{}\r\n", response)),
            None if command.contains('?') => self.pending = None,
            None => {},
        }
        Ok(())
    }

    fn read_raw(&mut self, max_size : usize) -> PmResult<String> {
        if self.fail_reads { return Err(broken_pipe()); }
        self.pending.take()
            .map(|response| response.chars().take(max_size).collect())
            .ok_or(PmError::TimeoutError)
    }

    fn driver_revision(&mut self) -> PmResult<String> {
        Ok(self.driver_revision.clone())
    }
}

impl OpenChannel for DebugChannel {
    /// Always succeeds with the [`pm100d`](Self::pm100d) script.
    fn open(_resource_id : &str, _config : &SessionConfig) -> PmResult<Self> {
        Ok(DebugChannel::pm100d())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_keep_queued_response() {
        let mut channel = DebugChannel::new().respond("READ?", "1.0");
        channel.write_raw("READ?").unwrap();
        channel.write_raw("*CLS").unwrap();
        assert_eq!(channel.read_raw(1024).unwrap(), "1.0\r\n");
        assert_eq!(channel.written(), ["READ?", "*CLS"]);
    }

    #[test]
    fn unscripted_query_drops_queued_response() {
        let mut channel = DebugChannel::new().respond("READ?", "1.0");
        channel.write_raw("READ?").unwrap();
        channel.write_raw("SYSTEM:DATE?").unwrap();
        assert!(matches!(channel.read_raw(1024), Err(PmError::TimeoutError)));
    }

    #[test]
    fn read_is_capped() {
        let mut channel = DebugChannel::new().respond("*IDN?", "Thorlabs,PM100D,P0001,1.0.0");
        channel.write_raw("*IDN?").unwrap();
        assert_eq!(channel.read_raw(8).unwrap(), "Thorlabs");
    }

    #[test]
    fn failures_are_reported() {
        let mut channel = DebugChannel::new().failing_writes();
        assert!(channel.write_raw("*CLS").is_err());
        assert!(channel.written().is_empty());

        let mut channel = DebugChannel::new().respond("READ?", "1.0").failing_reads();
        channel.write_raw("READ?").unwrap();
        assert!(channel.read_raw(1024).is_err());
    }
}
