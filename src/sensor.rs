//! sensor.rs
//!
//! Capability model of the sensor head attached to the meter, and the
//! PM100D current-range bookkeeping.

use bitflags::bitflags;
use tracing::warn;
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::PmError;

/// Physical sensing principle of the attached head. Determines which
/// quantity is measurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(i16)]
pub enum SensorType {
    #[default]
    None = 0x00,
    Photodiode = 0x01,
    Thermopile = 0x02,
    Pyroelectric = 0x03,
}

impl TryFrom<i16> for SensorType {
    type Error = PmError;
    fn try_from(value : i16) -> Result<Self, PmError> {
        match value {
            0x00 => Ok(SensorType::None),
            0x01 => Ok(SensorType::Photodiode),
            0x02 => Ok(SensorType::Thermopile),
            0x03 => Ok(SensorType::Pyroelectric),
            _ => Err(PmError::InvalidResponseError(format!("Unknown sensor type {}", value))),
        }
    }
}

impl SensorType {
    /// Unit of the responsivity reported for this sensor type.
    pub fn responsivity_unit(&self) -> &'static str {
        match self {
            SensorType::Photodiode => "A/W",
            SensorType::Thermopile => "V/W",
            SensorType::Pyroelectric => "V/J",
            SensorType::None => "a.u.",
        }
    }
}

/// Form factor / refinement of the sensor head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(i16)]
pub enum SensorSubtype {
    /// No detector
    #[default]
    None = 0x00,
    /// Detector adapter, the input can be switched between photodiode,
    /// thermal and pyro mode
    Adapter = 0x01,
    Standard = 0x02,
    /// Photodiode with integrated filter identified by position
    HasFilter = 0x03,
    HasTemperatureSensor = 0x12,
}

impl TryFrom<i16> for SensorSubtype {
    type Error = PmError;
    fn try_from(value : i16) -> Result<Self, PmError> {
        match value {
            0x00 => Ok(SensorSubtype::None),
            0x01 => Ok(SensorSubtype::Adapter),
            0x02 => Ok(SensorSubtype::Standard),
            0x03 => Ok(SensorSubtype::HasFilter),
            0x12 => Ok(SensorSubtype::HasTemperatureSensor),
            _ => Err(PmError::InvalidResponseError(format!("Unknown sensor subtype {}", value))),
        }
    }
}

bitflags! {
    /// Capability bits exactly as reported by the firmware in the last
    /// field of `SYSTEM:SENSOR:IDN?`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct SensorFlags : u16 {
        const IS_POWER_SENSOR = 0x0001;
        const IS_ENERGY_SENSOR = 0x0002;
        const IS_RESPONSIVITY_SETTABLE = 0x0010;
        const IS_WAVELENGTH_SETTABLE = 0x0020;
        const IS_TAU_SETTABLE = 0x0040;
        const HAS_TEMPERATURE_SENSOR = 0x0100;
    }
}

impl SensorFlags {
    pub fn is_power_sensor(&self) -> bool { self.contains(SensorFlags::IS_POWER_SENSOR) }
    pub fn is_energy_sensor(&self) -> bool { self.contains(SensorFlags::IS_ENERGY_SENSOR) }
    pub fn is_responsivity_settable(&self) -> bool { self.contains(SensorFlags::IS_RESPONSIVITY_SETTABLE) }
    pub fn is_wavelength_settable(&self) -> bool { self.contains(SensorFlags::IS_WAVELENGTH_SETTABLE) }
    pub fn is_tau_settable(&self) -> bool { self.contains(SensorFlags::IS_TAU_SETTABLE) }
    pub fn has_temperature_sensor(&self) -> bool { self.contains(SensorFlags::HAS_TEMPERATURE_SENSOR) }
}

/// Everything `SYSTEM:SENSOR:IDN?` tells about the attached head.
///
/// Always replaced as a whole, so type, subtype and flags can never
/// disagree with each other.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorInfo {
    pub detector_type : String,
    pub serial_number : String,
    pub calibration : String,
    pub sensor_type : SensorType,
    pub subtype : SensorSubtype,
    pub flags : SensorFlags,
}

impl SensorInfo {
    /// Parses a six-field sensor identification line, e.g.
    /// `S120C,SN123,CAL1,1,2,19`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use thorlabs_pm::{SensorInfo, SensorType, SensorSubtype};
    /// let info = SensorInfo::parse("S120C,SN123,CAL1,1,2,19").unwrap();
    /// assert_eq!(info.sensor_type, SensorType::Photodiode);
    /// assert_eq!(info.subtype, SensorSubtype::Standard);
    /// assert_eq!(info.flags.bits(), 19);
    /// ```
    pub fn parse(response : &str) -> Result<Self, PmError> {
        let tokens : Vec<&str> = response.split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect();
        if tokens.len() != 6 {
            return Err(PmError::InvalidResponseError(
                format!{"Expected 6 sensor fields, Got : {}", response}
            ));
        }
        let parse_short = |token : &str| token.parse::<i16>()
            .map_err(|_| PmError::InvalidResponseError(format!("Not an integer : {}", token)));

        // unlisted codes only lose their own field
        let sensor_type = SensorType::try_from(parse_short(tokens[3])?)
            .unwrap_or_else(|e| { warn!("{}, treated as None", e); SensorType::None });
        let subtype = SensorSubtype::try_from(parse_short(tokens[4])?)
            .unwrap_or_else(|e| { warn!("{}, treated as None", e); SensorSubtype::None });
        // flags arrive as a signed short; keep every bit, known or not
        let flags = SensorFlags::from_bits_retain(parse_short(tokens[5])? as u16);

        Ok(SensorInfo {
            detector_type : tokens[0].to_string(),
            serial_number : tokens[1].to_string(),
            calibration : tokens[2].to_string(),
            sensor_type,
            subtype,
            flags,
        })
    }

    pub fn has_temperature_sensor(&self) -> bool {
        self.subtype == SensorSubtype::HasTemperatureSensor || self.flags.has_temperature_sensor()
    }
}

/// Which value of a min/max-bounded setting to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Current = 0,
    Minimum = 1,
    Maximum = 2,
}

impl Attribute {
    /// Integer selector as used by the vendor API. Unknown selectors have
    /// no attribute.
    pub fn from_index(index : i16) -> Option<Self> {
        match index {
            0 => Some(Attribute::Current),
            1 => Some(Attribute::Minimum),
            2 => Some(Attribute::Maximum),
            _ => None,
        }
    }

    /// Text appended to a SCPI query header.
    pub fn query_suffix(&self) -> &'static str {
        match self {
            Attribute::Current => "?",
            Attribute::Minimum => "? MINIMUM",
            Attribute::Maximum => "? MAXIMUM",
        }
    }
}

/// Input modes of a sensor adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AdapterType {
    Photodiode,
    Thermal,
    Pyro,
}

impl AdapterType {
    pub fn scpi_name(&self) -> &'static str {
        match self {
            AdapterType::Photodiode => "PHOTODIODE",
            AdapterType::Thermal => "THERMAL",
            AdapterType::Pyro => "PYRO",
        }
    }
}

/// Current ranges of the PM100D console, widest to narrowest.
///
/// `Unknown` sits outside the order and is never left by
/// [`increment`](Self::increment) or [`decrement`](Self::decrement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MeasurementRange {
    #[default]
    Unknown,
    /// > 5.5 mA
    RangeOverflow,
    /// 5.5 mA - 0.550 mA
    Range03,
    /// 550.0 uA - 55.0 uA
    Range04,
    /// 55.00 uA - 5.50 uA
    Range05,
    /// 5.500 uA - 0.550 uA
    Range06,
    /// 550.0 nA - 55.0 nA
    Range07,
    /// 55.00 nA - 0.00 nA
    Range08,
}

const RANGE_LIMITS : [(MeasurementRange, f64); 6] = [
    (MeasurementRange::Range03, 5.5e-3),
    (MeasurementRange::Range04, 5.5e-4),
    (MeasurementRange::Range05, 5.5e-5),
    (MeasurementRange::Range06, 5.5e-6),
    (MeasurementRange::Range07, 5.5e-7),
    (MeasurementRange::Range08, 5.5e-8),
];

impl MeasurementRange {
    /// Maps the enum ordinal back to a range. Anything outside 0..=7 is
    /// `Unknown`.
    pub fn from_index(index : i32) -> Self {
        match index {
            1 => MeasurementRange::RangeOverflow,
            2 => MeasurementRange::Range03,
            3 => MeasurementRange::Range04,
            4 => MeasurementRange::Range05,
            5 => MeasurementRange::Range06,
            6 => MeasurementRange::Range07,
            7 => MeasurementRange::Range08,
            _ => MeasurementRange::Unknown,
        }
    }

    pub fn index(&self) -> i32 {
        *self as i32
    }

    /// Upper current bound in amperes written to the instrument for this
    /// range. `Unknown` and `RangeOverflow` have none.
    pub fn upper_limit(&self) -> Option<f64> {
        RANGE_LIMITS.iter()
            .find(|(range, _)| range == self)
            .map(|(_, limit)| *limit)
    }

    /// One step toward a wider range. Clamped at `Range03`; `Unknown` and
    /// `RangeOverflow` are left alone.
    pub fn increment(self) -> Self {
        match self {
            MeasurementRange::Range04 => MeasurementRange::Range03,
            MeasurementRange::Range05 => MeasurementRange::Range04,
            MeasurementRange::Range06 => MeasurementRange::Range05,
            MeasurementRange::Range07 => MeasurementRange::Range06,
            MeasurementRange::Range08 => MeasurementRange::Range07,
            other => other,
        }
    }

    /// One step toward a narrower range. Clamped at `Range08`; `Unknown`
    /// and `RangeOverflow` are left alone.
    pub fn decrement(self) -> Self {
        match self {
            MeasurementRange::Range03 => MeasurementRange::Range04,
            MeasurementRange::Range04 => MeasurementRange::Range05,
            MeasurementRange::Range05 => MeasurementRange::Range06,
            MeasurementRange::Range06 => MeasurementRange::Range07,
            MeasurementRange::Range07 => MeasurementRange::Range08,
            other => other,
        }
    }

    /// Classifies a photocurrent into the range a PM100D would need for it.
    /// A current exactly on a bound belongs to the narrower range.
    ///
    /// # Example
    ///
    /// ```rust
    /// use thorlabs_pm::MeasurementRange;
    /// assert_eq!(MeasurementRange::estimate(6e-3), MeasurementRange::RangeOverflow);
    /// assert_eq!(MeasurementRange::estimate(-1e-9), MeasurementRange::Range08);
    /// assert_eq!(MeasurementRange::estimate(f64::NAN), MeasurementRange::Unknown);
    /// ```
    pub fn estimate(current : f64) -> Self {
        if current.is_nan() { return MeasurementRange::Unknown; }
        let current = current.abs();
        if current > 5.5e-3 { return MeasurementRange::RangeOverflow; }
        RANGE_LIMITS.windows(2)
            .find(|pair| current > pair[1].1)
            .map(|pair| pair[0].0)
            .unwrap_or(MeasurementRange::Range08)
    }
}
