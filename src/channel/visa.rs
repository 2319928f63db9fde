//! visa.rs
//!
//! VISA / USBTMC transport through the system VISA library, via `visa-rs`.
//! Supports resource strings like `USB0::0x1313::0x8078::PM003835::INSTR`.

use std::ffi::CString;
use std::io::{Read, Write};

use tracing::{debug, trace};
use visa_rs::prelude::*;

use crate::channel::{OpenChannel, ResourceFinder, ScpiChannel};
use crate::{PmError, PmResult, SessionConfig};

/// VISA search expression matching every Thorlabs USB instrument.
pub const THORLABS_EXPRESSION : &str = "?*::0x1313::?*::INSTR";

fn visa_string(text : &str) -> PmResult<VisaString> {
    CString::new(text)
        .map(VisaString::from)
        .map_err(|e| PmError::InvalidArgumentsError(e.to_string()))
}

/// A meter reached through a VISA session.
///
/// The instrument is declared before its resource manager so that it is
/// closed first.
pub struct VisaChannel {
    instrument : Instrument,
    _rm : DefaultRM,
    resource_id : String,
}

impl std::fmt::Debug for VisaChannel {
    fn fmt(&self, f : &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisaChannel").field("resource_id", &self.resource_id).finish()
    }
}

impl OpenChannel for VisaChannel {
    fn open(resource_id : &str, config : &SessionConfig) -> PmResult<Self> {
        let rm = DefaultRM::new()?;
        let instrument = rm.open(
            &visa_string(resource_id)?,
            AccessMode::NO_LOCK,
            config.open_timeout,
        )?;
        debug!("Opened VISA channel {}", resource_id);
        Ok(VisaChannel {
            instrument,
            _rm : rm,
            resource_id : resource_id.to_string(),
        })
    }
}

impl ScpiChannel for VisaChannel {
    fn write_raw(&mut self, command : &str) -> PmResult<()> {
        let command = command.to_string() + "\n";
        self.instrument.write_all(command.as_bytes())?;
        Ok(())
    }

    fn read_raw(&mut self, max_size : usize) -> PmResult<String> {
        let mut buf = vec![0u8; max_size];
        let count = self.instrument.read(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut => PmError::TimeoutError,
            _ => PmError::IoError(e),
        })?;
        let response = String::from_utf8_lossy(&buf[..count]).into_owned();
        trace!("VISA recv: {:?}", response);
        Ok(response)
    }
}

impl Drop for VisaChannel {
    fn drop(&mut self) {
        debug!("Closing VISA channel {}", self.resource_id);
    }
}

/// Lists VISA resources matching an expression, Thorlabs instruments by
/// default.
#[derive(Debug)]
pub struct VisaFinder {
    expression : String,
    names : Vec<String>,
}

impl Default for VisaFinder {
    fn default() -> Self {
        VisaFinder::new(THORLABS_EXPRESSION)
    }
}

impl VisaFinder {
    pub fn new(expression : &str) -> Self {
        VisaFinder { expression : expression.to_string(), names : Vec::new() }
    }
}

impl ResourceFinder for VisaFinder {
    /// Opens a resource manager for the duration of the search only.
    fn find(&mut self) -> PmResult<u32> {
        let rm = DefaultRM::new()?;
        let mut list = rm.find_res_list(&visa_string(&self.expression)?)?;
        self.names.clear();
        while let Some(name) = list.find_next()? {
            self.names.push(name.to_string());
        }
        Ok(self.names.len() as u32)
    }

    fn resource_name(&mut self, index : u32) -> PmResult<String> {
        self.names.get(index as usize)
            .cloned()
            .ok_or_else(|| PmError::InvalidArgumentsError(format!("No VISA resource at index {}", index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finder_defaults_to_thorlabs_vendor() {
        let finder = VisaFinder::default();
        assert_eq!(finder.expression, THORLABS_EXPRESSION);
        assert!(finder.names.is_empty());
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert!(matches!(visa_string("USB0\0::INSTR"), Err(PmError::InvalidArgumentsError(_))));
    }

    #[test]
    #[ignore = "requires a VISA library and an attached meter"]
    fn find_attached_meters() {
        let mut finder = VisaFinder::default();
        let count = finder.find().unwrap();
        for i in 0..count {
            println!("{}", finder.resource_name(i).unwrap());
        }
    }
}
