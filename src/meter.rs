//! meter.rs
//!
//! A session with one Thorlabs power meter: the SCPI transaction engine,
//! the initialization sequence, and the identity and sensor state gathered
//! by it. The measurement command set lives in `measure.rs`.

pub mod commands;
mod measure;

use std::thread::sleep;

use tracing::{debug, info, warn};
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::channel::{OpenChannel, ScpiChannel};
use crate::sensor::{SensorFlags, SensorInfo, SensorSubtype, SensorType};
use crate::{PmResult, SessionConfig};
use commands::{PmCommands, PmQueries, Query, ScpiCommand};

/// What `*IDN?` says about the console itself.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstrumentIdentity {
    pub manufacturer : String,
    pub instrument_type : String,
    pub serial_number : String,
    pub firmware_version : String,
}

/// An open session with a Thorlabs power meter.
///
/// The session exclusively owns its channel. Identity and sensor state are
/// read once, when the session is created, and never refreshed; after
/// changing the adapter type the session has to be reopened (see
/// [`set_adapter`](Self::set_adapter)).
///
/// # Example
///
/// ```rust
/// use thorlabs_pm::{ThorlabsPm, DebugChannel};
/// let mut pm = ThorlabsPm::with_channel("debug", DebugChannel::pm100d());
/// assert_eq!(pm.instrument_id(), "PM100D v2.7.0 SN:P0012345 @ debug");
/// assert_eq!(pm.measure_current().unwrap(), 1e-5);
/// assert!(pm.measure_energy().is_err());
/// ```
#[derive(Debug)]
pub struct ThorlabsPm<C : ScpiChannel> {
    channel : C,
    config : SessionConfig,
    resource_id : String,
    driver_revision : String,
    identity : InstrumentIdentity,
    sensor : SensorInfo,
}

impl<C : OpenChannel> ThorlabsPm<C> {
    /// Opens the channel to `resource_id` with the default configuration
    /// and initializes the session. Failing to open the channel is the only
    /// error; unreadable identification only leaves fields empty.
    pub fn open(resource_id : &str) -> PmResult<Self> {
        Self::open_with_config(resource_id, SessionConfig::default())
    }

    pub fn open_with_config(resource_id : &str, config : SessionConfig) -> PmResult<Self> {
        let channel = C::open(resource_id, &config)?;
        Ok(Self::with_channel_and_config(resource_id, channel, config))
    }
}

impl<C : ScpiChannel> ThorlabsPm<C> {
    /// Wraps an already open channel and runs the initialization sequence.
    pub fn with_channel(resource_id : &str, channel : C) -> Self {
        Self::with_channel_and_config(resource_id, channel, SessionConfig::default())
    }

    pub fn with_channel_and_config(resource_id : &str, channel : C, config : SessionConfig) -> Self {
        let mut pm = ThorlabsPm {
            channel,
            config,
            resource_id : resource_id.to_string(),
            driver_revision : String::new(),
            identity : InstrumentIdentity::default(),
            sensor : SensorInfo::default(),
        };
        pm.initialize();
        info!("Opened session {}", pm.instrument_id());
        pm
    }

    /// Each step stands alone; a failed step leaves its fields at their
    /// defaults and the next step still runs.
    fn initialize(&mut self) {
        match self.query(PmQueries::Identify{}) {
            Ok(identity) => self.identity = identity,
            Err(e) => warn!("Skipping instrument identification of {} : {}", self.resource_id, e),
        }

        match self.query(PmQueries::SensorIdentify{}) {
            Ok(sensor) => self.sensor = sensor,
            Err(e) => warn!("Skipping sensor identification of {} : {}", self.resource_id, e),
        }

        match self.channel.driver_revision() {
            Ok(revision) => self.driver_revision = revision.trim_matches(['\r', '\n']).to_string(),
            Err(e) => warn!("Could not read driver revision : {}", e),
        }
    }

    /// Sends one raw command. The channel appends the terminator.
    pub fn scpi_write(&mut self, command : &str) -> PmResult<()> {
        debug!("SCPI write : {}", command);
        self.channel.write_raw(command)
    }

    /// Reads one response, trailing `\r`, `\n` and spaces removed.
    pub fn scpi_read(&mut self) -> PmResult<String> {
        let response = self.channel.read_raw(self.config.read_capacity)?;
        let response = response.trim_end_matches(['\r', '\n', ' ']).to_string();
        debug!("SCPI read : {}", response);
        Ok(response)
    }

    /// Optional `*CLS`, the command, the settle delay, then one read.
    pub fn try_scpi_write_read(&mut self, command : &str, clear_first : bool) -> PmResult<String> {
        if clear_first {
            self.scpi_write(&PmCommands::Clear.scpi())?;
        }
        self.scpi_write(command)?;
        sleep(self.config.settle_delay);
        self.scpi_read()
    }

    /// Like [`try_scpi_write_read`](Self::try_scpi_write_read) with the
    /// configured clearing policy, but never fails: any error is logged and
    /// the response is `""`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use thorlabs_pm::{ThorlabsPm, DebugChannel};
    /// let mut pm = ThorlabsPm::with_channel("debug", DebugChannel::pm100d());
    /// assert_eq!(pm.scpi_write_read("READ?"), "1.000000E-05");
    /// assert_eq!(pm.scpi_write_read("SYSTEM:DATE?"), "");
    /// ```
    pub fn scpi_write_read(&mut self, command : &str) -> String {
        let clear_first = self.config.clear_before_query;
        self.scpi_write_read_with(command, clear_first)
    }

    pub fn scpi_write_read_with(&mut self, command : &str, clear_first : bool) -> String {
        match self.try_scpi_write_read(command, clear_first) {
            Ok(response) => response,
            Err(e) => {
                warn!("SCPI transaction {} failed : {}", command, e);
                String::new()
            }
        }
    }

    /// Next entry of the instrument's error queue, `""` if it could not be
    /// read. Never clears first, which would empty the queue.
    pub fn error_status(&mut self) -> String {
        self.scpi_write_read_with(&PmQueries::ErrorNext{}.scpi(), false)
    }

    /// True unless the error queue reports `+0,...` (no error).
    pub fn scpi_error(&mut self) -> bool {
        !self.error_status().starts_with(commands::NO_ERROR_PREFIX)
    }

    /// Sends a setting command. Write failures are returned.
    pub fn send_command(&mut self, command : PmCommands) -> PmResult<()> {
        self.scpi_write(&command.scpi())
    }

    /// Sends a query through the contained transaction and parses the
    /// response. A failed transaction surfaces as `PmError::NoResponse`.
    pub fn query<Q : Query>(&mut self, query : Q) -> PmResult<Q::Result> {
        let response = self.scpi_write_read(&query.scpi());
        query.parse_result(&response)
    }

    /// Hands the channel back without closing it.
    fn detach(self) -> DetachedChannel<C> {
        DetachedChannel {
            resource_id : self.resource_id,
            channel : self.channel,
            config : self.config,
        }
    }
}

/// Identity accessors
impl<C : ScpiChannel> ThorlabsPm<C> {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn driver_revision(&self) -> &str {
        &self.driver_revision
    }

    pub fn identity(&self) -> &InstrumentIdentity {
        &self.identity
    }

    pub fn manufacturer(&self) -> &str {
        &self.identity.manufacturer
    }

    pub fn instrument_type(&self) -> &str {
        &self.identity.instrument_type
    }

    pub fn serial_number(&self) -> &str {
        &self.identity.serial_number
    }

    pub fn firmware_version(&self) -> &str {
        &self.identity.firmware_version
    }

    /// `"{type} v{firmware} SN:{serial} @ {resource}"`
    pub fn instrument_id(&self) -> String {
        format!(
            "{} v{} SN:{} @ {}",
            self.identity.instrument_type,
            self.identity.firmware_version,
            self.identity.serial_number,
            self.resource_id,
        )
    }

    pub fn sensor(&self) -> &SensorInfo {
        &self.sensor
    }

    pub fn sensor_type(&self) -> SensorType {
        self.sensor.sensor_type
    }

    pub fn sensor_subtype(&self) -> SensorSubtype {
        self.sensor.subtype
    }

    pub fn sensor_flags(&self) -> SensorFlags {
        self.sensor.flags
    }

    pub fn detector_type(&self) -> &str {
        &self.sensor.detector_type
    }

    pub fn detector_serial_number(&self) -> &str {
        &self.sensor.serial_number
    }

    pub fn detector_calibration(&self) -> &str {
        &self.sensor.calibration
    }

    pub fn responsivity_unit(&self) -> &'static str {
        self.sensor.sensor_type.responsivity_unit()
    }
}

/// The open channel of a session whose sensor state went stale.
///
/// Returned when a session is consumed by
/// [`ThorlabsPm::set_adapter`]. Dropping it closes the channel; `reopen`
/// builds a fresh session on the same channel.
#[derive(Debug)]
pub struct DetachedChannel<C : ScpiChannel> {
    resource_id : String,
    channel : C,
    config : SessionConfig,
}

impl<C : ScpiChannel> DetachedChannel<C> {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Runs the full initialization sequence again.
    pub fn reopen(self) -> ThorlabsPm<C> {
        ThorlabsPm::with_channel_and_config(&self.resource_id, self.channel, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::{DebugChannel, PmError};

    fn quick_config() -> SessionConfig {
        SessionConfig::default().with_settle_delay(Duration::ZERO)
    }

    fn scripted(channel : DebugChannel) -> ThorlabsPm<DebugChannel> {
        ThorlabsPm::with_channel_and_config("USB0::0x1313::0x8078::PM003835::INSTR", channel, quick_config())
    }

    #[test]
    fn initialization_reads_identity_and_sensor() {
        let pm = scripted(DebugChannel::pm100d());
        assert_eq!(pm.manufacturer(), "Thorlabs");
        assert_eq!(pm.instrument_type(), "PM100D");
        assert_eq!(pm.serial_number(), "P0012345");
        assert_eq!(pm.firmware_version(), "2.7.0");
        assert_eq!(pm.driver_revision(), "DebugChannel 1.0.0");
        assert_eq!(pm.detector_type(), "S120C");
        assert_eq!(pm.detector_serial_number(), "12345678");
        assert_eq!(pm.detector_calibration(), "01-Jan-2024");
        assert_eq!(pm.sensor_type(), SensorType::Photodiode);
        assert_eq!(pm.sensor_subtype(), SensorSubtype::Standard);
        assert_eq!(pm.sensor_flags().bits(), 49);
        assert_eq!(pm.responsivity_unit(), "A/W");
        assert_eq!(
            pm.instrument_id(),
            "PM100D v2.7.0 SN:P0012345 @ USB0::0x1313::0x8078::PM003835::INSTR"
        );
    }

    #[test]
    fn initialization_order() {
        let pm = scripted(DebugChannel::pm100d());
        assert_eq!(
            pm.channel.written(),
            ["*CLS", "*IDN?", "*CLS", "SYSTEM:SENSOR:IDN?"]
        );
    }

    #[test]
    fn malformed_identification_keeps_defaults() {
        let channel = DebugChannel::new()
            .respond("*IDN?", "THORLABS,PM100D,PM003835")
            .respond("SYSTEM:SENSOR:IDN?", "S120C,SN123,CAL1,1,2");
        let pm = scripted(channel);
        assert_eq!(pm.identity(), &InstrumentIdentity::default());
        assert_eq!(pm.sensor(), &SensorInfo::default());
        assert_eq!(pm.instrument_id(), " v SN: @ USB0::0x1313::0x8078::PM003835::INSTR");
        // driver revision is still read
        assert_eq!(pm.driver_revision(), "DebugChannel 1.0.0");
    }

    #[test]
    fn unparsable_sensor_fields_leave_all_sensor_state_default() {
        let channel = DebugChannel::pm100d()
            .respond("SYSTEM:SENSOR:IDN?", "S120C,SN123,CAL1,1,x,19");
        let pm = scripted(channel);
        assert_eq!(pm.sensor_type(), SensorType::None);
        assert_eq!(pm.sensor_subtype(), SensorSubtype::None);
        assert!(pm.sensor_flags().is_empty());
        assert_eq!(pm.detector_type(), "");
        // instrument identity is unaffected
        assert_eq!(pm.instrument_type(), "PM100D");
    }

    #[test]
    fn failing_channel_still_constructs() {
        let pm = scripted(DebugChannel::pm100d().failing_writes());
        assert_eq!(pm.identity(), &InstrumentIdentity::default());
        assert_eq!(pm.sensor_type(), SensorType::None);
    }

    #[test]
    fn read_trims_terminators() {
        let mut pm = scripted(DebugChannel::pm100d().respond("SYSTEM:DATE?", "2024, 1, 1 \r\n"));
        pm.scpi_write("SYSTEM:DATE?").unwrap();
        assert_eq!(pm.scpi_read().unwrap(), "2024, 1, 1");
    }

    #[test]
    fn write_read_clears_first() {
        let mut pm = scripted(DebugChannel::pm100d());
        pm.channel.clear_written();
        assert_eq!(pm.try_scpi_write_read("READ?", true).unwrap(), "1.000000E-05");
        assert_eq!(pm.channel.written(), ["*CLS", "READ?"]);

        pm.channel.clear_written();
        assert_eq!(pm.try_scpi_write_read("READ?", false).unwrap(), "1.000000E-05");
        assert_eq!(pm.channel.written(), ["READ?"]);
    }

    #[test]
    fn contained_write_read_swallows_failures() {
        let mut pm = scripted(DebugChannel::pm100d());
        assert!(matches!(pm.try_scpi_write_read("SYSTEM:DATE?", true), Err(PmError::TimeoutError)));
        assert_eq!(pm.scpi_write_read("SYSTEM:DATE?"), "");

        let mut pm = scripted(DebugChannel::pm100d().failing_reads());
        assert_eq!(pm.scpi_write_read("READ?"), "");
    }

    #[test]
    fn error_gate() {
        let mut pm = scripted(DebugChannel::pm100d());
        pm.channel.clear_written();
        assert!(!pm.scpi_error());
        // the queue must not be cleared before it is read
        assert_eq!(pm.channel.written(), ["SYSTEM:ERROR:NEXT?"]);

        pm.channel.set_response("SYSTEM:ERROR:NEXT?", "-113,\"Undefined header\"");
        assert!(pm.scpi_error());
        assert_eq!(pm.error_status(), "-113,\"Undefined header\"");

        // an unreadable queue counts as an error
        pm.channel.remove_response("SYSTEM:ERROR:NEXT?");
        assert!(pm.scpi_error());
    }

    #[test]
    fn driver_revision_is_trimmed() {
        let pm = scripted(DebugChannel::pm100d().with_driver_revision("\r\nTLPM 5.1\r\n"));
        assert_eq!(pm.driver_revision(), "TLPM 5.1");
    }

    #[test]
    fn open_debug_channel() {
        let pm = ThorlabsPm::<DebugChannel>::open("debug").unwrap();
        assert_eq!(pm.resource_id(), "debug");
        assert_eq!(pm.instrument_type(), "PM100D");
    }

    #[test]
    fn detached_channel_reopens() {
        let pm = scripted(DebugChannel::pm100d());
        let detached = pm.detach();
        assert_eq!(detached.resource_id(), "USB0::0x1313::0x8078::PM003835::INSTR");
        let pm = detached.reopen();
        assert_eq!(pm.sensor_type(), SensorType::Photodiode);
        assert_eq!(pm.config(), &quick_config());
    }
}
