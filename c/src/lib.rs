//! Thin C ABI layer for the `thorlabs_pm` crate
//!
//! Sessions are handed out as opaque pointers and must be released with
//! `pm_free`. Measurements return NaN on any failure, setters return 0 on
//! success and -1 on failure.

use tracing::warn;

use thorlabs_pm::{
    AdapterType, Attribute, DebugChannel, DiscoverPm, MeasurementRange, NanOnError,
    OpenChannel, PmResult, ScpiChannel, SerialChannel, SessionConfig, ThorlabsPm,
};
#[cfg(feature = "visa")]
use thorlabs_pm::VisaChannel;

/// A session over whichever channel it was opened with.
pub type PmSession = ThorlabsPm<Box<dyn ScpiChannel>>;

fn open_boxed<C : OpenChannel + 'static>(resource_id : &str) -> PmResult<PmSession> {
    let config = SessionConfig::default();
    let channel : Box<dyn ScpiChannel> = Box::new(C::open(resource_id, &config)?);
    Ok(ThorlabsPm::with_channel_and_config(resource_id, channel, config))
}

#[cfg(feature = "visa")]
fn open_default(resource_id : &str) -> PmResult<PmSession> {
    open_boxed::<VisaChannel>(resource_id)
}

#[cfg(not(feature = "visa"))]
fn open_default(resource_id : &str) -> PmResult<PmSession> {
    open_boxed::<SerialChannel>(resource_id)
}

fn into_raw(session : PmResult<PmSession>) -> *mut PmSession {
    match session {
        Ok(pm) => Box::into_raw(Box::new(pm)),
        Err(e) => {
            warn!("Could not open power meter : {}", e);
            std::ptr::null_mut()
        }
    }
}

unsafe fn str_from_raw<'a>(text : *const u8, text_len : usize) -> Option<&'a str> {
    if text.is_null() { return None; }
    std::str::from_utf8(std::slice::from_raw_parts(text, text_len)).ok()
}

/// Copies `text` into `out`. On entry `*out_len` is the capacity of `out`,
/// on return the number of bytes written. Nothing is written if it does
/// not fit.
unsafe fn copy_out(text : &str, out : *mut u8, out_len : *mut usize) -> i32 {
    if out.is_null() || out_len.is_null() { return -1; }
    let bytes = text.as_bytes();
    if bytes.len() > *out_len { return -1; }
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len());
    *out_len = bytes.len();
    0
}

fn status(result : PmResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

//////////
//
// SESSIONS
//
//////////

/// Opens a VISA resource (with the `visa` feature) or a serial port.
/// Returns null if the channel cannot be opened.
#[no_mangle]
pub unsafe extern "C" fn pm_open(resource : *const u8, resource_len : usize) -> *mut PmSession {
    match str_from_raw(resource, resource_len) {
        Some(resource) => into_raw(open_default(resource)),
        None => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_open_serial(port_name : *const u8, port_name_len : usize) -> *mut PmSession {
    match str_from_raw(port_name, port_name_len) {
        Some(port_name) => into_raw(open_boxed::<SerialChannel>(port_name)),
        None => std::ptr::null_mut(),
    }
}

/// A spoofed PM100D with a photodiode head, for testing callers.
#[no_mangle]
pub extern "C" fn pm_open_debug() -> *mut PmSession {
    into_raw(open_boxed::<DebugChannel>("debug"))
}

/// Opens the last device found by discovery, null if there is none.
#[no_mangle]
pub extern "C" fn pm_open_last_discovered() -> *mut PmSession {
    let discovered = DiscoverPm::new();
    if discovered.is_empty() { return std::ptr::null_mut(); }
    into_raw(open_default(discovered.last_device()))
}

#[no_mangle]
pub extern "C" fn pm_number_of_devices() -> i32 {
    DiscoverPm::new().number_of_devices() as i32
}

#[no_mangle]
pub unsafe extern "C" fn pm_free(pm : *mut PmSession) {
    if pm.is_null() {return}
    drop(Box::from_raw(pm)); // closes the channel
}

/// Switches the adapter input and reopens the session. `pm` is consumed
/// and must not be used again; the returned pointer replaces it (null on
/// failure, in which case the session is closed).
#[no_mangle]
pub unsafe extern "C" fn pm_set_adapter(pm : *mut PmSession, adapter : i32) -> *mut PmSession {
    if pm.is_null() { return std::ptr::null_mut(); }
    let pm = *Box::from_raw(pm);
    let adapter = match adapter {
        0 => AdapterType::Photodiode,
        1 => AdapterType::Thermal,
        2 => AdapterType::Pyro,
        _ => return Box::into_raw(Box::new(pm)),
    };
    into_raw(pm.set_adapter(adapter).map(|detached| detached.reopen()))
}

//////////
//
// IDENTIFICATION
//
//////////

#[no_mangle]
pub unsafe extern "C" fn pm_get_instrument_id(pm : *mut PmSession, out : *mut u8, out_len : *mut usize) -> i32 {
    match pm.as_ref() {
        Some(pm) => copy_out(&pm.instrument_id(), out, out_len),
        None => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_get_driver_revision(pm : *mut PmSession, out : *mut u8, out_len : *mut usize) -> i32 {
    match pm.as_ref() {
        Some(pm) => copy_out(pm.driver_revision(), out, out_len),
        None => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_get_detector_type(pm : *mut PmSession, out : *mut u8, out_len : *mut usize) -> i32 {
    match pm.as_ref() {
        Some(pm) => copy_out(pm.detector_type(), out, out_len),
        None => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_get_responsivity_unit(pm : *mut PmSession, out : *mut u8, out_len : *mut usize) -> i32 {
    match pm.as_ref() {
        Some(pm) => copy_out(pm.responsivity_unit(), out, out_len),
        None => -1,
    }
}

/// -1 for a null session
#[no_mangle]
pub unsafe extern "C" fn pm_get_sensor_type(pm : *mut PmSession) -> i16 {
    pm.as_ref().map(|pm| pm.sensor_type() as i16).unwrap_or(-1)
}

#[no_mangle]
pub unsafe extern "C" fn pm_get_sensor_subtype(pm : *mut PmSession) -> i16 {
    pm.as_ref().map(|pm| pm.sensor_subtype() as i16).unwrap_or(-1)
}

#[no_mangle]
pub unsafe extern "C" fn pm_get_sensor_flags(pm : *mut PmSession) -> u16 {
    pm.as_ref().map(|pm| pm.sensor_flags().bits()).unwrap_or(0)
}

//////////
//
// MEASUREMENTS
//
//////////

unsafe fn measure(pm : *mut PmSession, f : impl FnOnce(&mut PmSession) -> PmResult<f64>) -> f64 {
    match pm.as_mut() {
        Some(pm) => f(pm).or_nan(),
        None => f64::NAN,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_measure_power(pm : *mut PmSession) -> f64 {
    measure(pm, |pm| pm.measure_power())
}

#[no_mangle]
pub unsafe extern "C" fn pm_measure_energy(pm : *mut PmSession) -> f64 {
    measure(pm, |pm| pm.measure_energy())
}

#[no_mangle]
pub unsafe extern "C" fn pm_measure_current(pm : *mut PmSession) -> f64 {
    measure(pm, |pm| pm.measure_current())
}

#[no_mangle]
pub unsafe extern "C" fn pm_measure_voltage(pm : *mut PmSession) -> f64 {
    measure(pm, |pm| pm.measure_voltage())
}

#[no_mangle]
pub unsafe extern "C" fn pm_measure_temperature(pm : *mut PmSession) -> f64 {
    measure(pm, |pm| pm.measure_temperature())
}

#[no_mangle]
pub unsafe extern "C" fn pm_measure_frequency(pm : *mut PmSession) -> f64 {
    measure(pm, |pm| pm.measure_frequency())
}

/// `attribute` : 0 current value, 1 minimum, 2 maximum. Anything else is NaN.
#[no_mangle]
pub unsafe extern "C" fn pm_get_wavelength(pm : *mut PmSession, attribute : i16) -> f64 {
    match Attribute::from_index(attribute) {
        Some(attribute) => measure(pm, |pm| pm.get_wavelength(attribute)),
        None => f64::NAN,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_get_current_range(pm : *mut PmSession, attribute : i16) -> f64 {
    match Attribute::from_index(attribute) {
        Some(attribute) => measure(pm, |pm| pm.get_current_range(attribute)),
        None => f64::NAN,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_get_range(pm : *mut PmSession, attribute : i16) -> f64 {
    match Attribute::from_index(attribute) {
        Some(attribute) => measure(pm, |pm| pm.get_range(attribute)),
        None => f64::NAN,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_get_responsivity(pm : *mut PmSession) -> f64 {
    measure(pm, |pm| pm.get_responsivity())
}

#[no_mangle]
pub unsafe extern "C" fn pm_get_responsivity_for_wavelength(pm : *mut PmSession, wavelength : f64) -> f64 {
    measure(pm, |pm| pm.get_responsivity_for_wavelength(wavelength))
}

//////////
//
// SETTINGS
//
//////////

#[no_mangle]
pub unsafe extern "C" fn pm_set_wavelength(pm : *mut PmSession, wavelength : f64) -> i32 {
    match pm.as_mut() {
        Some(pm) => status(pm.set_wavelength(wavelength)),
        None => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_set_current_range(pm : *mut PmSession, upper_amps : f64) -> i32 {
    match pm.as_mut() {
        Some(pm) => status(pm.set_current_range(upper_amps)),
        None => -1,
    }
}

/// `range` is the `MeasurementRange` ordinal, 0 (Unknown) to 7 (Range08).
#[no_mangle]
pub unsafe extern "C" fn pm_set_measurement_range(pm : *mut PmSession, range : i32) -> i32 {
    match pm.as_mut() {
        Some(pm) => status(pm.set_measurement_range(MeasurementRange::from_index(range))),
        None => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_get_measurement_range(pm : *mut PmSession) -> i32 {
    match pm.as_mut() {
        Some(pm) => pm.get_measurement_range().index(),
        None => MeasurementRange::Unknown.index(),
    }
}

#[no_mangle]
pub extern "C" fn pm_estimate_measurement_range(current : f64) -> i32 {
    MeasurementRange::estimate(current).index()
}

#[no_mangle]
pub extern "C" fn pm_increment_measurement_range(range : i32) -> i32 {
    MeasurementRange::from_index(range).increment().index()
}

#[no_mangle]
pub extern "C" fn pm_decrement_measurement_range(range : i32) -> i32 {
    MeasurementRange::from_index(range).decrement().index()
}

#[no_mangle]
pub unsafe extern "C" fn pm_select_auto_range(pm : *mut PmSession) -> i32 {
    match pm.as_mut() {
        Some(pm) => status(pm.select_auto_range()),
        None => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pm_deselect_auto_range(pm : *mut PmSession) -> i32 {
    match pm.as_mut() {
        Some(pm) => status(pm.deselect_auto_range()),
        None => -1,
    }
}
