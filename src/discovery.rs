//! discovery.rs
//!
//! One-shot enumeration of attached power meters.

use tracing::{debug, warn};

use crate::channel::ResourceFinder;
use crate::PmResult;

/// The resource identifiers of every meter a finder reported, in the
/// order it reported them.
///
/// Enumeration happens once, in the constructor, and can take a few
/// seconds on VISA. There are no retries.
///
/// # Example
///
/// ```no_run
/// use thorlabs_pm::DiscoverPm;
/// let discovered = DiscoverPm::new();
/// for name in discovered.names_of_devices() {
///     println!("{}", name);
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoverPm {
    devices : Vec<String>,
}

#[cfg(feature = "visa")]
type DefaultFinder = crate::channel::visa::VisaFinder;
#[cfg(not(feature = "visa"))]
type DefaultFinder = crate::channel::SerialFinder;

impl DiscoverPm {
    /// Discovers with the default finder: VISA when built with the `visa`
    /// feature, serial ports otherwise.
    pub fn new() -> Self {
        Self::with_finder(DefaultFinder::default())
    }

    /// Runs `finder` once and drops it. Any failure means no devices;
    /// partial results are discarded.
    pub fn with_finder<F : ResourceFinder>(mut finder : F) -> Self {
        match collect_names(&mut finder) {
            Ok(devices) => {
                debug!("Discovered {} power meter(s)", devices.len());
                DiscoverPm { devices }
            },
            Err(e) => {
                warn!("Power meter discovery failed : {}", e);
                DiscoverPm::default()
            }
        }
    }

    pub fn names_of_devices(&self) -> &[String] {
        &self.devices
    }

    pub fn number_of_devices(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// `""` if nothing was found.
    pub fn first_device(&self) -> &str {
        self.devices.first().map(String::as_str).unwrap_or("")
    }

    /// `""` if nothing was found.
    pub fn last_device(&self) -> &str {
        self.devices.last().map(String::as_str).unwrap_or("")
    }
}

fn collect_names<F : ResourceFinder>(finder : &mut F) -> PmResult<Vec<String>> {
    let count = finder.find()?;
    (0..count).map(|index| finder.resource_name(index)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PmError;

    struct ListFinder {
        names : Vec<&'static str>,
        fail_find : bool,
        fail_at : Option<u32>,
        find_calls : u32,
    }

    impl ListFinder {
        fn new(names : Vec<&'static str>) -> Self {
            ListFinder { names, fail_find : false, fail_at : None, find_calls : 0 }
        }
    }

    impl ResourceFinder for ListFinder {
        fn find(&mut self) -> PmResult<u32> {
            self.find_calls += 1;
            if self.fail_find {
                return Err(PmError::InvalidResponseError("resource manager unavailable".to_string()));
            }
            Ok(self.names.len() as u32)
        }

        fn resource_name(&mut self, index : u32) -> PmResult<String> {
            if self.fail_at == Some(index) {
                return Err(PmError::TimeoutError);
            }
            Ok(self.names[index as usize].to_string())
        }
    }

    #[test]
    fn keeps_finder_order() {
        let discovered = DiscoverPm::with_finder(ListFinder::new(vec![
            "USB0::0x1313::0x8078::PM003835::INSTR",
            "USB0::0x1313::0x8072::P2000123::INSTR",
        ]));
        assert_eq!(discovered.number_of_devices(), 2);
        assert_eq!(discovered.first_device(), "USB0::0x1313::0x8078::PM003835::INSTR");
        assert_eq!(discovered.last_device(), "USB0::0x1313::0x8072::P2000123::INSTR");
        assert_eq!(discovered.names_of_devices().len(), 2);
        assert!(!discovered.is_empty());
    }

    #[test]
    fn nothing_attached() {
        let discovered = DiscoverPm::with_finder(ListFinder::new(vec![]));
        assert!(discovered.is_empty());
        assert_eq!(discovered.first_device(), "");
        assert_eq!(discovered.last_device(), "");
    }

    #[test]
    fn failing_find_yields_empty_list() {
        let mut finder = ListFinder::new(vec!["USB0::0x1313::0x8078::PM003835::INSTR"]);
        finder.fail_find = true;
        let discovered = DiscoverPm::with_finder(finder);
        assert_eq!(discovered, DiscoverPm::default());
    }

    #[test]
    fn partial_results_are_discarded() {
        let mut finder = ListFinder::new(vec!["ASRL1::INSTR", "ASRL2::INSTR", "ASRL3::INSTR"]);
        finder.fail_at = Some(2);
        let discovered = DiscoverPm::with_finder(finder);
        assert_eq!(discovered.number_of_devices(), 0);
    }

    #[test]
    fn finder_is_queried_once() {
        let mut finder = ListFinder::new(vec!["ASRL1::INSTR"]);
        let names = collect_names(&mut finder).unwrap();
        assert_eq!(names, ["ASRL1::INSTR"]);
        assert_eq!(finder.find_calls, 1);
    }
}
