//! Switches the input of Thorlabs sensor adapters and reports the sensor
//! each meter sees afterwards. Meters without an adapter are left alone.
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use thorlabs_pm::{
    AdapterType, DiscoverPm, OpenChannel, PmResult, ScpiChannel, SensorSubtype, SerialChannel, ThorlabsPm,
};
#[cfg(feature = "visa")]
use thorlabs_pm::VisaChannel;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Mode {
    /// Photodiode (current) input
    Photodiode,
    /// Thermal (voltage) input
    Thermal,
    /// Pyroelectric input, requires --allow-pyro
    Pyro,
}

/// Set the adapter type of power meters.
///
/// # Usage:
///
/// ```shell
/// set-pm-adapter thermal
/// set-pm-adapter photodiode --resource USB0::0x1313::0x8078::PM003835::INSTR
/// set-pm-adapter pyro --allow-pyro --serial --resource /dev/ttyACM0
/// ```
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(value_enum)]
    mode : Mode,

    /// Resource to open. Defaults to every discovered meter
    #[arg(long)]
    resource : Option<String>,

    /// Treat the resource as a serial port
    #[arg(long)]
    serial : bool,

    /// Pyro mode can damage a photodiode or thermal head left on the adapter
    #[arg(long)]
    allow_pyro : bool,
}

fn adapter_for(mode : Mode, allow_pyro : bool) -> Result<AdapterType, String> {
    match mode {
        Mode::Photodiode => Ok(AdapterType::Photodiode),
        Mode::Thermal => Ok(AdapterType::Thermal),
        Mode::Pyro if allow_pyro => Ok(AdapterType::Pyro),
        Mode::Pyro => Err("Refusing pyro mode without --allow-pyro".to_string()),
    }
}

enum Outcome<C : ScpiChannel> {
    NoAdapter(ThorlabsPm<C>),
    Switched(ThorlabsPm<C>),
}

/// Only an adapter head is switched; anything else is handed back untouched.
fn switch_session<C : ScpiChannel>(pm : ThorlabsPm<C>, adapter : AdapterType) -> PmResult<Outcome<C>> {
    if pm.sensor_subtype() != SensorSubtype::Adapter {
        return Ok(Outcome::NoAdapter(pm));
    }
    Ok(Outcome::Switched(pm.set_adapter(adapter)?.reopen()))
}

fn switch<C : OpenChannel>(resource_id : &str, adapter : AdapterType) -> PmResult<()> {
    let pm = ThorlabsPm::<C>::open(resource_id)?;
    println!("InstrumentID : {}", pm.instrument_id());
    match switch_session(pm, adapter)? {
        Outcome::NoAdapter(_) => println!("=> no adapter connected to instrument."),
        Outcome::Switched(pm) => println!(
            "=> adapter set to {:?}, now {:?} sensor ({})",
            adapter, pm.sensor_type(), pm.detector_type()
        ),
    }
    Ok(())
}

#[cfg(feature = "visa")]
fn switch_visa(resource_id : &str, adapter : AdapterType) -> PmResult<()> {
    switch::<VisaChannel>(resource_id, adapter)
}

#[cfg(not(feature = "visa"))]
fn switch_visa(_resource_id : &str, _adapter : AdapterType) -> PmResult<()> {
    eprintln!("This build has no VISA support.\
        \nRecompile with the 'visa' feature or pass --serial.");
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let adapter = match adapter_for(args.mode, args.allow_pyro) {
        Ok(adapter) => adapter,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let resources = match args.resource {
        Some(resource) => vec![resource],
        None => {
            println!("Searching for devices ...");
            let discovered = DiscoverPm::new();
            if discovered.is_empty() {
                eprintln!("No power meter found");
                std::process::exit(1);
            }
            println!("Number of detected devices : {}", discovered.number_of_devices());
            discovered.names_of_devices().to_vec()
        }
    };

    let mut failed = false;
    for resource in &resources {
        let result = if args.serial {
            switch::<SerialChannel>(resource, adapter)
        } else {
            switch_visa(resource, adapter)
        };
        if let Err(e) = result {
            eprintln!("{} : {}", resource, e);
            failed = true;
        }
    }
    if failed { std::process::exit(1); }
}
