//! Thorlabs-PM-RS is a `Rust` library to control Thorlabs optical power and
//! energy meters (PM100D, PM100A, PM100USB, PM101, PM16 series and relatives).
//! It implements the SCPI command set of these consoles over a VISA or serial
//! channel, tracks which measurements the attached sensor head supports, and
//! converts the instrument's overflow sentinels into ordinary floats.
//!
//! # Example
//!
//! ```no_run
//! use thorlabs_pm::{DiscoverPm, ThorlabsPm, SerialChannel};
//!
//! let discovered = DiscoverPm::new();
//! let mut pm = ThorlabsPm::<SerialChannel>::open(discovered.last_device()).unwrap();
//! println!("{}", pm.instrument_id());
//! println!("Power : {:?} W", pm.measure_power());
//! ```

pub mod channel;
pub mod config;
pub mod discovery;
pub mod meter;
pub mod sensor;

pub use channel::{ScpiChannel, OpenChannel, ResourceFinder, SerialChannel, SerialFinder};
pub use channel::debug::DebugChannel;
#[cfg(feature = "visa")]
pub use channel::visa::{VisaChannel, VisaFinder};
pub use config::SessionConfig;
pub use discovery::DiscoverPm;
pub use meter::{ThorlabsPm, DetachedChannel, InstrumentIdentity};
pub use sensor::{
    SensorType, SensorSubtype, SensorFlags, SensorInfo,
    MeasurementRange, Attribute, AdapterType,
};

use thiserror::Error;

/// USB vendor id shared by all Thorlabs instruments.
pub const THORLABS_VENDOR_ID : u16 = 0x1313;

/// The error types that can be returned by the Thorlabs-PM-RS library.
#[derive(Error, Debug)]
pub enum PmError {
    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "visa")]
    #[error("VISA error: {0}")]
    VisaError(#[from] visa_rs::Error),

    /// Nothing was read back before the channel gave up.
    #[error("Timeout waiting for response")]
    TimeoutError,

    /// A contained transaction produced no usable response.
    #[error("No usable response from instrument")]
    NoResponse,

    #[error("Invalid response: {0}")]
    InvalidResponseError(String),

    /// The instrument's error queue held an entry other than `+0,...`.
    #[error("Instrument reported error: {0}")]
    InstrumentFault(String),

    /// The attached sensor head cannot perform this operation.
    #[error("{operation} is not supported by a {sensor:?} sensor")]
    Unsupported {
        operation : &'static str,
        sensor : SensorType,
    },

    #[error("Invalid arguments: {0}")]
    InvalidArgumentsError(String),
}

/// Result type for power meter operations.
pub type PmResult<T> = Result<T, PmError>;

/// Collapses a numeric result into the NaN-sentinel convention of the
/// vendor API: any error becomes `f64::NAN`.
///
/// # Example
///
/// ```rust
/// use thorlabs_pm::{NanOnError, PmError, PmResult};
/// let failed : PmResult<f64> = Err(PmError::NoResponse);
/// assert!(failed.or_nan().is_nan());
/// let ok : PmResult<f64> = Ok(1.5e-6);
/// assert_eq!(ok.or_nan(), 1.5e-6);
/// ```
pub trait NanOnError {
    fn or_nan(self) -> f64;
}

impl NanOnError for PmResult<f64> {
    fn or_nan(self) -> f64 {
        self.unwrap_or(f64::NAN)
    }
}

/// Returns a vector of `SerialPortInfo` objects that are made by Thorlabs.
/// Enumeration failures are treated as "no ports".
///
/// # Example
///
/// ```rust
/// use thorlabs_pm::get_all_thorlabs_ports;
/// let ports = get_all_thorlabs_ports();
/// for port in ports {
///    println!("{:?}", port);
/// }
/// ```
pub fn get_all_thorlabs_ports() -> Vec<serialport::SerialPortInfo> {
    serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .filter(channel::is_thorlabs_port)
        .collect()
}

/// Open a session to a Thorlabs power meter.
///
/// # Arguments
///
/// * `resource_id` - The VISA resource string or serial port name.
///
/// # Returns
///
/// A `Result` containing the initialized session if the channel could be
/// opened, or a `PmError` if not.
///
/// # Example
///
/// ```no_run
/// use thorlabs_pm::{open, SerialChannel};
/// let not_a_meter = open::<SerialChannel>("NotAPort");
/// assert!(not_a_meter.is_err());
/// let pm = open::<SerialChannel>("/dev/ttyACM0").unwrap();
/// println!("{}", pm.instrument_id());
/// ```
pub fn open<C : OpenChannel>(resource_id : &str) -> PmResult<ThorlabsPm<C>> {
    ThorlabsPm::<C>::open(resource_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_all_thorlabs_ports(){
        let ports = get_all_thorlabs_ports();
        for port in ports {
            println!("{:?}", port);
        }
    }

    #[test]
    fn open_missing_port_fails() {
        let not_a_meter = open::<SerialChannel>("NotAPort");
        assert!(not_a_meter.is_err());
        println!{"Returned : {:?}", not_a_meter.err()}
    }

    #[test]
    fn or_nan_keeps_values_and_hides_errors() {
        let unsupported : PmResult<f64> = Err(PmError::Unsupported {
            operation : "measure_power",
            sensor : SensorType::Thermopile,
        });
        assert!(unsupported.or_nan().is_nan());
        assert_eq!(Ok::<f64, PmError>(f64::INFINITY).or_nan(), f64::INFINITY);
    }

    #[test]
    fn unsupported_error_names_operation() {
        let err = PmError::Unsupported { operation : "measure_energy", sensor : SensorType::Photodiode };
        assert_eq!(err.to_string(), "measure_energy is not supported by a Photodiode sensor");
    }
}
