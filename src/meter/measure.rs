//! measure.rs
//!
//! Measurement and configuration commands of a meter session. Every
//! operation checks first that the attached sensor supports it and does no
//! I/O at all when it does not.

use tracing::{info, warn};

use crate::channel::ScpiChannel;
use crate::meter::{DetachedChannel, ThorlabsPm};
use crate::meter::commands::{NO_ERROR_PREFIX, PmCommands, PmQueries, Quantity};
use crate::sensor::{AdapterType, Attribute, MeasurementRange, SensorType};
use crate::{PmError, PmResult};

/// The instrument rejects NaN and infinities with an error queue entry
/// that would fail the next measurement.
fn require_finite(value : f64, what : &str) -> PmResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PmError::InvalidArgumentsError(format!("{} must be finite, Got : {}", what, value)))
    }
}

impl<C : ScpiChannel> ThorlabsPm<C> {
    fn require(&self, supported : bool, operation : &'static str) -> PmResult<()> {
        if supported {
            Ok(())
        } else {
            Err(PmError::Unsupported { operation, sensor : self.sensor.sensor_type })
        }
    }

    /// `CONFIGURE:SCALAR`, then the error gate, then `READ?`. A fault in
    /// the error queue ends the measurement before `READ?` is sent.
    fn measure_scalar(&mut self, quantity : Quantity) -> PmResult<f64> {
        self.send_command(PmCommands::ConfigureScalar{quantity})?;
        let status = self.error_status();
        if status.is_empty() {
            return Err(PmError::NoResponse);
        }
        if !status.starts_with(NO_ERROR_PREFIX) {
            warn!("Measurement of {:?} refused : {}", quantity, status);
            return Err(PmError::InstrumentFault(status));
        }
        self.query(PmQueries::Read{})
    }

    /// Optical power in W.
    ///
    /// # Example
    ///
    /// ```rust
    /// use thorlabs_pm::{ThorlabsPm, DebugChannel, NanOnError};
    /// let mut pm = ThorlabsPm::with_channel("debug", DebugChannel::pm100d());
    /// let power = pm.measure_power().or_nan();
    /// println!("Power : {} W", power);
    /// ```
    pub fn measure_power(&mut self) -> PmResult<f64> {
        self.require(self.sensor.flags.is_power_sensor(), "measure_power")?;
        self.measure_scalar(Quantity::Power)
    }

    /// Pulse energy in J.
    pub fn measure_energy(&mut self) -> PmResult<f64> {
        self.require(self.sensor.flags.is_energy_sensor(), "measure_energy")?;
        self.measure_scalar(Quantity::Energy)
    }

    /// Photocurrent in A, photodiodes only.
    pub fn measure_current(&mut self) -> PmResult<f64> {
        self.require(self.sensor.sensor_type == SensorType::Photodiode, "measure_current")?;
        self.measure_scalar(Quantity::Current)
    }

    /// Same as [`measure_current`](Self::measure_current).
    pub fn get_current(&mut self) -> PmResult<f64> {
        self.measure_current()
    }

    /// Sensor voltage in V, thermal and pyroelectric heads only.
    pub fn measure_voltage(&mut self) -> PmResult<f64> {
        let thermal = matches!(self.sensor.sensor_type, SensorType::Thermopile | SensorType::Pyroelectric);
        self.require(thermal, "measure_voltage")?;
        self.measure_scalar(Quantity::Voltage)
    }

    /// Head temperature in °C.
    pub fn measure_temperature(&mut self) -> PmResult<f64> {
        self.require(self.sensor.has_temperature_sensor(), "measure_temperature")?;
        self.measure_scalar(Quantity::Temperature)
    }

    /// Pulse repetition frequency in Hz. Every head can do this.
    pub fn measure_frequency(&mut self) -> PmResult<f64> {
        self.measure_scalar(Quantity::Frequency)
    }
}

/// Wavelength correction
impl<C : ScpiChannel> ThorlabsPm<C> {
    /// Correction wavelength in nm, or its lower or upper limit.
    pub fn get_wavelength(&mut self, attribute : Attribute) -> PmResult<f64> {
        self.require(self.sensor.flags.is_wavelength_settable(), "get_wavelength")?;
        self.query(PmQueries::Wavelength{attribute})
    }

    pub fn get_minimum_wavelength(&mut self) -> PmResult<f64> {
        self.get_wavelength(Attribute::Minimum)
    }

    pub fn get_maximum_wavelength(&mut self) -> PmResult<f64> {
        self.get_wavelength(Attribute::Maximum)
    }

    pub fn set_wavelength(&mut self, wavelength_nm : f64) -> PmResult<()> {
        self.require(self.sensor.flags.is_wavelength_settable(), "set_wavelength")?;
        require_finite(wavelength_nm, "wavelength")?;
        self.send_command(PmCommands::Wavelength{wavelength_nm})
    }
}

/// Ranges
impl<C : ScpiChannel> ThorlabsPm<C> {
    /// Upper bound of the photocurrent range in A.
    pub fn get_current_range(&mut self, attribute : Attribute) -> PmResult<f64> {
        self.require(self.sensor.sensor_type == SensorType::Photodiode, "get_current_range")?;
        self.query(PmQueries::CurrentRange{attribute})
    }

    pub fn set_current_range(&mut self, upper_amps : f64) -> PmResult<()> {
        self.require(self.sensor.sensor_type == SensorType::Photodiode, "set_current_range")?;
        require_finite(upper_amps, "current range")?;
        self.send_command(PmCommands::CurrentRange{upper_amps})
    }

    /// Selects one of the PM100D current ranges. `Unknown` and
    /// `RangeOverflow` have no bound to send and do nothing.
    pub fn set_measurement_range(&mut self, range : MeasurementRange) -> PmResult<()> {
        match range.upper_limit() {
            Some(upper_amps) => self.set_current_range(upper_amps),
            None => Ok(()),
        }
    }

    /// Range the instrument is in now, `Unknown` when it cannot be read.
    pub fn get_measurement_range(&mut self) -> MeasurementRange {
        match self.get_current_range(Attribute::Current) {
            Ok(upper_amps) => MeasurementRange::estimate(upper_amps),
            Err(e) => {
                warn!("Could not read current range : {}", e);
                MeasurementRange::Unknown
            }
        }
    }

    /// See [`MeasurementRange::estimate`].
    pub fn estimate_measurement_range(&self, current : f64) -> MeasurementRange {
        MeasurementRange::estimate(current)
    }

    pub fn select_auto_range(&mut self) -> PmResult<()> {
        self.send_command(PmCommands::CurrentAutoRange{auto_on : true})
    }

    pub fn deselect_auto_range(&mut self) -> PmResult<()> {
        self.send_command(PmCommands::CurrentAutoRange{auto_on : false})
    }

    /// Upper bound of the power range (W) of a power sensor, or of the
    /// energy range (J) of an energy sensor.
    pub fn get_range(&mut self, attribute : Attribute) -> PmResult<f64> {
        if self.sensor.flags.is_power_sensor() {
            self.query(PmQueries::PowerRange{attribute})
        } else if self.sensor.flags.is_energy_sensor() {
            self.query(PmQueries::EnergyRange{attribute})
        } else {
            Err(PmError::Unsupported { operation : "get_range", sensor : self.sensor.sensor_type })
        }
    }

    pub fn get_minimum_range(&mut self) -> PmResult<f64> {
        self.get_range(Attribute::Minimum)
    }

    pub fn get_maximum_range(&mut self) -> PmResult<f64> {
        self.get_range(Attribute::Maximum)
    }
}

/// Responsivity
impl<C : ScpiChannel> ThorlabsPm<C> {
    /// Responsivity at the current wavelength, in
    /// [`responsivity_unit`](Self::responsivity_unit).
    pub fn get_responsivity(&mut self) -> PmResult<f64> {
        let query = PmQueries::Responsivity::for_sensor(self.sensor.sensor_type)
            .ok_or(PmError::Unsupported { operation : "get_responsivity", sensor : self.sensor.sensor_type })?;
        self.query(query)
    }

    /// Responsivity at another wavelength. The correction wavelength is
    /// restored afterwards, even when reading the responsivity failed.
    pub fn get_responsivity_for_wavelength(&mut self, wavelength_nm : f64) -> PmResult<f64> {
        let saved = self.get_wavelength(Attribute::Current)?;
        self.set_wavelength(wavelength_nm)?;
        let responsivity = self.get_responsivity();
        let restored = self.set_wavelength(saved);
        if let Err(e) = &restored {
            warn!("Could not restore wavelength {} nm : {}", saved, e);
        }
        let responsivity = responsivity?;
        restored?;
        Ok(responsivity)
    }
}

/// Sensor adapter
impl<C : ScpiChannel> ThorlabsPm<C> {
    /// Switches the input of a sensor adapter. The console then reports a
    /// different sensor, so the session is given up; call
    /// [`DetachedChannel::reopen`] to continue. If the command cannot be
    /// written the session is closed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use thorlabs_pm::{ThorlabsPm, DebugChannel, AdapterType};
    /// let pm = ThorlabsPm::with_channel("debug", DebugChannel::pm100d());
    /// let pm = pm.set_adapter(AdapterType::Thermal).unwrap().reopen();
    /// println!("{:?}", pm.sensor_type());
    /// ```
    pub fn set_adapter(mut self, adapter : AdapterType) -> PmResult<DetachedChannel<C>> {
        self.send_command(PmCommands::AdapterType{adapter})?;
        info!("Adapter of {} set to {:?}, session must be reopened", self.resource_id, adapter);
        Ok(self.detach())
    }

    pub fn set_adapter_photodiode(self) -> PmResult<DetachedChannel<C>> {
        self.set_adapter(AdapterType::Photodiode)
    }

    pub fn set_adapter_thermal(self) -> PmResult<DetachedChannel<C>> {
        self.set_adapter(AdapterType::Thermal)
    }

    pub fn set_adapter_pyro(self) -> PmResult<DetachedChannel<C>> {
        self.set_adapter(AdapterType::Pyro)
    }
}
