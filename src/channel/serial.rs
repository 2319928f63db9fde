//! serial.rs
//!
//! Serial transport for meters with a UART or USB-CDC interface
//! (PM101 family and virtual COM ports).

use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::channel::{OpenChannel, ResourceFinder, ScpiChannel};
use crate::{PmError, PmResult, SessionConfig, THORLABS_VENDOR_ID};

const DATABITS : serialport::DataBits = serialport::DataBits::Eight;
const STOPBITS : serialport::StopBits = serialport::StopBits::One;
const PARITY : serialport::Parity = serialport::Parity::None;

/// Checks the USB vendor id of a serial port.
pub fn is_thorlabs_port(serialportinfo : &serialport::SerialPortInfo) -> bool {
    match &serialportinfo.port_type {
        serialport::SerialPortType::UsbPort(info) => info.vid == THORLABS_VENDOR_ID,
        _ => false
    }
}

/// A meter reached through a serial port.
pub struct SerialChannel {
    port : Box<dyn serialport::SerialPort>,
    port_name : String,
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f : &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel").field("port_name", &self.port_name).finish()
    }
}

impl SerialChannel {
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl OpenChannel for SerialChannel {
    /// Opens the port as 8N1 at the configured baud rate and drops any
    /// stale bytes left in the buffers.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use thorlabs_pm::{SerialChannel, SessionConfig, OpenChannel};
    /// let channel = SerialChannel::open("/dev/ttyACM0", &SessionConfig::default()).unwrap();
    /// ```
    fn open(resource_id : &str, config : &SessionConfig) -> PmResult<Self> {
        let port = serialport::new(resource_id, config.baud_rate)
            .data_bits(DATABITS)
            .stop_bits(STOPBITS)
            .parity(PARITY)
            .timeout(config.io_timeout)
            .open()?;

        port.clear(serialport::ClearBuffer::All)?;
        debug!("Opened serial channel {}", resource_id);

        Ok(SerialChannel {
            port,
            port_name : resource_id.to_string(),
        })
    }
}

impl ScpiChannel for SerialChannel {
    fn write_raw(&mut self, command : &str) -> PmResult<()> {
        let command = command.to_string() + "\n";
        self.port.write_all(command.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Reads byte-wise until a line feed or `max_size` bytes.
    fn read_raw(&mut self, max_size : usize) -> PmResult<String> {
        let mut buf = [0u8; 1];
        let mut bytes = Vec::with_capacity(max_size.min(256));

        while bytes.len() < max_size {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    bytes.push(buf[0]);
                    if buf[0] == b'\n' { break; }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    if bytes.is_empty() { return Err(PmError::TimeoutError); }
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let response = String::from_utf8_lossy(&bytes).into_owned();
        trace!("serial recv: {:?}", response);
        Ok(response)
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        debug!("Closing serial channel {}", self.port_name);
    }
}

/// Lists serial ports whose USB vendor is Thorlabs.
#[derive(Debug, Default)]
pub struct SerialFinder {
    ports : Vec<String>,
}

impl ResourceFinder for SerialFinder {
    fn find(&mut self) -> PmResult<u32> {
        self.ports = serialport::available_ports()?
            .into_iter()
            .filter(is_thorlabs_port)
            .map(|port| port.port_name)
            .collect();
        Ok(self.ports.len() as u32)
    }

    fn resource_name(&mut self, index : u32) -> PmResult<String> {
        self.ports.get(index as usize)
            .cloned()
            .ok_or_else(|| PmError::InvalidArgumentsError(format!("No serial port at index {}", index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_port_fails() {
        let channel = SerialChannel::open("NotAPort", &SessionConfig::default());
        assert!(channel.is_err());
    }

    #[test]
    fn finder_rejects_out_of_range_index() {
        let mut finder = SerialFinder::default();
        assert!(finder.resource_name(0).is_err());
    }

    #[test]
    fn only_thorlabs_usb_ports_match() {
        let thorlabs = serialport::SerialPortInfo {
            port_name : "/dev/ttyACM0".to_string(),
            port_type : serialport::SerialPortType::UsbPort(serialport::UsbPortInfo {
                vid : THORLABS_VENDOR_ID,
                pid : 0x8079,
                serial_number : Some("M00123456".to_string()),
                manufacturer : Some("Thorlabs".to_string()),
                product : Some("PM101".to_string()),
            }),
        };
        let other = serialport::SerialPortInfo {
            port_name : "/dev/ttyS0".to_string(),
            port_type : serialport::SerialPortType::PciPort,
        };
        assert!(is_thorlabs_port(&thorlabs));
        assert!(!is_thorlabs_port(&other));
    }

    #[test]
    #[ignore = "requires a PM101 on a serial port"]
    fn identify_attached_meter() {
        let mut finder = SerialFinder::default();
        let count = finder.find().unwrap();
        assert!(count > 0);
        let name = finder.resource_name(0).unwrap();
        let mut channel = SerialChannel::open(&name, &SessionConfig::default()).unwrap();
        channel.write_raw("*IDN?").unwrap();
        println!("{:?}", channel.read_raw(1024).unwrap());
    }
}
