//! Lists every attached Thorlabs power meter and what its sensor can do.
use clap::Parser;
use tracing_subscriber::EnvFilter;

use thorlabs_pm::{
    DiscoverPm, NanOnError, OpenChannel, ResourceFinder, SerialChannel, SerialFinder, ThorlabsPm,
};
#[cfg(feature = "visa")]
use thorlabs_pm::{VisaChannel, VisaFinder};

/// List attached Thorlabs power meters.
///
/// # Usage:
///
/// ```shell
/// RUST_LOG=debug list-power-meters --serial --measure
/// ```
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Search serial ports instead of VISA resources
    #[arg(long)]
    serial : bool,

    /// Take one reading of every quantity the sensor supports
    #[arg(long)]
    measure : bool,
}

fn describe<C : OpenChannel>(resource_id : &str, measure : bool) {
    let mut pm = match ThorlabsPm::<C>::open(resource_id) {
        Ok(pm) => pm,
        Err(e) => {
            eprintln!("{} : could not open ({})", resource_id, e);
            return;
        }
    };
    println!("{}", pm.instrument_id());
    println!("  Manufacturer : {}", pm.manufacturer());
    println!("  Driver : {}", pm.driver_revision());
    println!(
        "  Sensor : {} SN:{} cal. {} ({:?}, {:?}, flags {:#06x})",
        pm.detector_type(),
        pm.detector_serial_number(),
        pm.detector_calibration(),
        pm.sensor_type(),
        pm.sensor_subtype(),
        pm.sensor_flags().bits(),
    );
    if !measure { return; }

    let flags = pm.sensor_flags();
    if flags.is_power_sensor() { println!("  Power : {} W", pm.measure_power().or_nan()); }
    if flags.is_energy_sensor() { println!("  Energy : {} J", pm.measure_energy().or_nan()); }
    if pm.sensor().has_temperature_sensor() {
        println!("  Temperature : {} C", pm.measure_temperature().or_nan());
    }
    match pm.get_responsivity() {
        Ok(responsivity) => println!("  Responsivity : {} {}", responsivity, pm.responsivity_unit()),
        Err(e) => println!("  Responsivity : {}", e),
    }
}

fn list<F : ResourceFinder + Default, C : OpenChannel>(measure : bool) {
    let discovered = DiscoverPm::with_finder(F::default());
    println!("Found {} power meter(s)", discovered.number_of_devices());
    for name in discovered.names_of_devices() {
        describe::<C>(name, measure);
    }
}

#[cfg(feature = "visa")]
fn list_visa(measure : bool) {
    list::<VisaFinder, VisaChannel>(measure)
}

#[cfg(not(feature = "visa"))]
fn list_visa(_measure : bool) {
    eprintln!("This build has no VISA support.\
        \nRecompile with the 'visa' feature or pass --serial.\
        \n\nExample: cargo run --features cli,visa --bin list-power-meters");
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.serial {
        list::<SerialFinder, SerialChannel>(args.measure);
    } else {
        list_visa(args.measure);
    }
}
