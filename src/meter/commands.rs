//! commands.rs
//!
//! SCPI commands and queries understood by the PM100 family. Each query
//! owns the parser for its own response.

use crate::{PmError, PmResult};
use crate::sensor::{AdapterType, Attribute, SensorInfo, SensorType};
use crate::meter::InstrumentIdentity;

/// Prefix of the error-queue entry meaning "no error".
pub const NO_ERROR_PREFIX : &str = "+0,";

/// Anything that renders to one line of SCPI text.
pub trait ScpiCommand {
    fn scpi(&self) -> String;
}

/// A command that expects a response, and knows how to parse it.
pub trait Query : ScpiCommand {
    type Result;
    fn parse_result(&self, response : &str) -> PmResult<Self::Result>;
}

/// Scalar quantities the meter can be configured to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Power,
    Energy,
    Current,
    Voltage,
    Temperature,
    Frequency,
}

impl Quantity {
    fn scpi_name(&self) -> &'static str {
        match self {
            Quantity::Power => "POWER",
            Quantity::Energy => "ENERGY",
            Quantity::Current => "CURRENT",
            Quantity::Voltage => "VOLTAGE",
            Quantity::Temperature => "TEMPERATURE",
            Quantity::Frequency => "FREQUENCY",
        }
    }
}

/// Commands to change parameters of the meter
#[derive(Debug, Clone, PartialEq)]
pub enum PmCommands {
    Clear, // Clear status and error queue
    ConfigureScalar{quantity : Quantity},
    Wavelength{wavelength_nm : f64},
    CurrentRange{upper_amps : f64},
    CurrentAutoRange{auto_on : bool},
    AdapterType{adapter : AdapterType}, // session must be reopened afterwards
}

impl ScpiCommand for PmCommands {
    fn scpi(&self) -> String {
        match &self {
            PmCommands::Clear => String::from("*CLS"),
            PmCommands::ConfigureScalar{quantity} => format!("CONFIGURE:SCALAR:{}", quantity.scpi_name()),
            PmCommands::Wavelength{wavelength_nm} => format!("SENSE:CORRECTION:WAVELENGTH {}", wavelength_nm),
            PmCommands::CurrentRange{upper_amps} => format!("SENSE:CURRENT:DC:RANGE:UPPER {:E}", upper_amps),
            PmCommands::CurrentAutoRange{auto_on} => format!("SENSE:CURRENT:RANGE:AUTO {}", if *auto_on {"ON"} else {"OFF"}),
            PmCommands::AdapterType{adapter} => format!("INPUT:ADAPTER:TYPE {}", adapter.scpi_name()),
        }
    }
}

/// Parses a locale-invariant SCPI number. An empty response means the
/// transaction produced nothing usable.
pub fn parse_scpi_f64(response : &str) -> PmResult<f64> {
    let response = response.trim();
    if response.is_empty() { return Err(PmError::NoResponse); }
    response.parse::<f64>()
        .map_err(|_| PmError::InvalidResponseError(response.to_string()))
}

/// Maps the SCPI overflow sentinels to IEEE special values. Only the exact
/// sentinel values are mapped.
///
/// # Example
///
/// ```rust
/// use thorlabs_pm::meter::commands::convert_scpi_inf;
/// assert_eq!(convert_scpi_inf(9.9e37), f64::INFINITY);
/// assert_eq!(convert_scpi_inf(-9.9e37), f64::NEG_INFINITY);
/// assert!(convert_scpi_inf(9.91e37).is_nan());
/// assert_eq!(convert_scpi_inf(1.23e-6), 1.23e-6);
/// ```
pub fn convert_scpi_inf(value : f64) -> f64 {
    if value == 9.9e37 { return f64::INFINITY; }
    if value == -9.9e37 { return f64::NEG_INFINITY; }
    if value == 9.91e37 { return f64::NAN; }
    value
}

/// Number parsing followed by sentinel mapping, shared by every numeric
/// query.
pub fn parse_reading(response : &str) -> PmResult<f64> {
    parse_scpi_f64(response).map(convert_scpi_inf)
}

/// Queries to read parameters and measurements from the meter
#[allow(non_snake_case)]
pub mod PmQueries {
    use super::*;

    /// `*IDN?`, four comma separated fields
    #[derive(Default)]
    pub struct Identify {}
    impl ScpiCommand for Identify {
        fn scpi(&self) -> String {
            String::from("*IDN?")
        }
    }
    impl Query for Identify {
        type Result = InstrumentIdentity;
        fn parse_result(&self, result : &str) -> PmResult<Self::Result> {
            let tokens : Vec<&str> = result.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .collect();
            if tokens.len() != 4 {
                return Err(PmError::InvalidResponseError(
                    format!{"Expected 4 identification fields, Got : {}", result}
                ));
            }
            Ok(InstrumentIdentity {
                manufacturer : tokens[0].to_string(),
                instrument_type : tokens[1].to_string(),
                serial_number : tokens[2].to_string(),
                firmware_version : tokens[3].to_string(),
            })
        }
    }

    #[derive(Default)]
    pub struct SensorIdentify {}
    impl ScpiCommand for SensorIdentify {
        fn scpi(&self) -> String {
            String::from("SYSTEM:SENSOR:IDN?")
        }
    }
    impl Query for SensorIdentify {
        type Result = SensorInfo;
        fn parse_result(&self, result : &str) -> PmResult<Self::Result> {
            SensorInfo::parse(result)
        }
    }

    /// Pops the next entry of the error queue. Must not be preceded by
    /// `*CLS`, which would empty the queue.
    #[derive(Default)]
    pub struct ErrorNext {}
    impl ScpiCommand for ErrorNext {
        fn scpi(&self) -> String {
            String::from("SYSTEM:ERROR:NEXT?")
        }
    }
    impl Query for ErrorNext {
        type Result = String;
        fn parse_result(&self, result : &str) -> PmResult<Self::Result> {
            Ok(result.to_string())
        }
    }

    /// Triggers a measurement of the configured quantity
    #[derive(Default)]
    pub struct Read {}
    impl ScpiCommand for Read {
        fn scpi(&self) -> String {
            String::from("READ?")
        }
    }
    impl Query for Read {
        type Result = f64;
        fn parse_result(&self, result : &str) -> PmResult<Self::Result> {
            parse_reading(result)
        }
    }

    /// Correction wavelength in nm
    pub struct Wavelength {
        pub attribute : Attribute,
    }
    impl ScpiCommand for Wavelength {
        fn scpi(&self) -> String {
            format!("SENSE:CORRECTION:WAVELENGTH{}", self.attribute.query_suffix())
        }
    }
    impl Query for Wavelength {
        type Result = f64;
        fn parse_result(&self, result : &str) -> PmResult<Self::Result> {
            parse_reading(result)
        }
    }

    /// Upper bound of the photocurrent range in A
    pub struct CurrentRange {
        pub attribute : Attribute,
    }
    impl ScpiCommand for CurrentRange {
        fn scpi(&self) -> String {
            format!("SENSE:CURRENT:DC:RANGE:UPPER{}", self.attribute.query_suffix())
        }
    }
    impl Query for CurrentRange {
        type Result = f64;
        fn parse_result(&self, result : &str) -> PmResult<Self::Result> {
            parse_reading(result)
        }
    }

    /// Upper bound of the power range in W
    pub struct PowerRange {
        pub attribute : Attribute,
    }
    impl ScpiCommand for PowerRange {
        fn scpi(&self) -> String {
            format!("SENSE:POWER:DC:RANGE:UPPER{}", self.attribute.query_suffix())
        }
    }
    impl Query for PowerRange {
        type Result = f64;
        fn parse_result(&self, result : &str) -> PmResult<Self::Result> {
            parse_reading(result)
        }
    }

    /// Upper bound of the energy range in J
    pub struct EnergyRange {
        pub attribute : Attribute,
    }
    impl ScpiCommand for EnergyRange {
        fn scpi(&self) -> String {
            format!("SENSE:ENERGY:RANGE:UPPER{}", self.attribute.query_suffix())
        }
    }
    impl Query for EnergyRange {
        type Result = f64;
        fn parse_result(&self, result : &str) -> PmResult<Self::Result> {
            parse_reading(result)
        }
    }

    /// Responsivity at the current correction wavelength. The header
    /// depends on the sensing principle, so there is none for
    /// `SensorType::None`.
    pub struct Responsivity {
        sensor_type : SensorType,
    }
    impl Responsivity {
        pub fn for_sensor(sensor_type : SensorType) -> Option<Self> {
            match sensor_type {
                SensorType::None => None,
                _ => Some(Responsivity { sensor_type }),
            }
        }
    }
    impl ScpiCommand for Responsivity {
        fn scpi(&self) -> String {
            match self.sensor_type {
                SensorType::Thermopile => String::from("SENSE:CORRECTION:POWER:THERMOPILE:RESPONSE?"),
                SensorType::Pyroelectric => String::from("SENSE:CORRECTION:ENERGY:PYRO:RESPONSE?"),
                _ => String::from("SENSE:CORRECTION:POWER:PDIODE:RESPONSE?"),
            }
        }
    }
    impl Query for Responsivity {
        type Result = f64;
        fn parse_result(&self, result : &str) -> PmResult<Self::Result> {
            parse_reading(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::PmQueries::*;

    #[test]
    fn command_strings() {
        assert_eq!(PmCommands::Clear.scpi(), "*CLS");
        assert_eq!(PmCommands::ConfigureScalar{quantity : Quantity::Temperature}.scpi(), "CONFIGURE:SCALAR:TEMPERATURE");
        assert_eq!(PmCommands::Wavelength{wavelength_nm : 633.0}.scpi(), "SENSE:CORRECTION:WAVELENGTH 633");
        assert_eq!(PmCommands::Wavelength{wavelength_nm : 632.8}.scpi(), "SENSE:CORRECTION:WAVELENGTH 632.8");
        assert_eq!(PmCommands::CurrentRange{upper_amps : 5.5e-3}.scpi(), "SENSE:CURRENT:DC:RANGE:UPPER 5.5E-3");
        assert_eq!(PmCommands::CurrentAutoRange{auto_on : false}.scpi(), "SENSE:CURRENT:RANGE:AUTO OFF");
        assert_eq!(PmCommands::AdapterType{adapter : AdapterType::Pyro}.scpi(), "INPUT:ADAPTER:TYPE PYRO");
    }

    #[test]
    fn query_strings() {
        assert_eq!(Wavelength{attribute : Attribute::Current}.scpi(), "SENSE:CORRECTION:WAVELENGTH?");
        assert_eq!(CurrentRange{attribute : Attribute::Maximum}.scpi(), "SENSE:CURRENT:DC:RANGE:UPPER? MAXIMUM");
        assert_eq!(EnergyRange{attribute : Attribute::Minimum}.scpi(), "SENSE:ENERGY:RANGE:UPPER? MINIMUM");
        assert!(Responsivity::for_sensor(SensorType::None).is_none());
        assert_eq!(
            Responsivity::for_sensor(SensorType::Pyroelectric).map(|q| q.scpi()),
            Some("SENSE:CORRECTION:ENERGY:PYRO:RESPONSE?".to_string())
        );
    }

    #[test]
    fn sentinel_mapping() {
        assert_eq!(parse_reading("9.9E37").unwrap(), f64::INFINITY);
        assert_eq!(parse_reading("+9.900000E+37").unwrap(), f64::INFINITY);
        assert_eq!(parse_reading("-9.9e37").unwrap(), f64::NEG_INFINITY);
        assert!(parse_reading("9.91e37").unwrap().is_nan());
        assert_eq!(parse_reading("1.23e-6").unwrap(), 1.23e-6);
        // near-sentinel values are ordinary readings
        assert_eq!(parse_reading("9.8e37").unwrap(), 9.8e37);
    }

    #[test]
    fn number_parsing_failures() {
        assert!(matches!(parse_scpi_f64(""), Err(PmError::NoResponse)));
        assert!(matches!(parse_scpi_f64(" \r\n"), Err(PmError::NoResponse)));
        assert!(matches!(parse_scpi_f64("1,5"), Err(PmError::InvalidResponseError(_))));
        assert_eq!(parse_scpi_f64(" 1.000000E-05\r\n").unwrap(), 1e-5);
    }

    #[test]
    fn identification_needs_four_fields() {
        let identity = Identify{}.parse_result("THORLABS,PM100D,PM003835,1.0.0").unwrap();
        assert_eq!(identity.manufacturer, "THORLABS");
        assert_eq!(identity.instrument_type, "PM100D");
        assert_eq!(identity.serial_number, "PM003835");
        assert_eq!(identity.firmware_version, "1.0.0");

        assert!(Identify{}.parse_result("THORLABS,PM100D,PM003835").is_err());
        assert!(Identify{}.parse_result("THORLABS,PM100D,PM003835,1.0.0,extra").is_err());
        // empty fields are dropped before counting
        assert!(Identify{}.parse_result("THORLABS,,PM100D,PM003835,1.0.0").is_ok());
    }
}
