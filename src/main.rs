//! # fieldsweep
//!
//! Command-line front end for field-sweep measurements.
//!
//! ```bash
//! # Sweep with two supplies and the analyzer's raw SCPI socket
//! fieldsweep run --config sweep.toml --ps1 /dev/ttyUSB0 --ps2 /dev/ttyUSB1 --vna 192.168.0.10:5025
//!
//! # Dry run against simulated instruments
//! fieldsweep run --config sweep.toml --simulate
//!
//! # Degauss one magnet
//! fieldsweep demag --port /dev/ttyUSB0
//!
//! # Summarize a persisted series
//! fieldsweep inspect data/alice/yig/fmr_01_S21
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use fieldsweep::config::{SettingsStore, SweepConfig};
use fieldsweep::hal::mock::{SimulatedPowerSupply, SimulatedVna};
use fieldsweep::hal::{Analyzer, CurrentSource, PowerSupplyChannel, VnaSession};
use fieldsweep::observability::{Reporter, SweepMonitor};
use fieldsweep::storage::{load_measurement, CsvDataSink};
use fieldsweep::{SweepController, SweepSession};

/// fieldsweep - field-swept VNA measurements
#[derive(Parser)]
#[command(name = "fieldsweep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a field sweep
    Run {
        /// Sweep configuration (TOML or JSON)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Serial port of the primary (dipole / first quadrupole) supply
        #[arg(long)]
        ps1: Option<String>,

        /// Serial port of the second quadrupole supply
        #[arg(long)]
        ps2: Option<String>,

        #[arg(long, default_value_t = 9600)]
        baud: u32,

        /// Analyzer SCPI socket
        #[arg(long, default_value = "127.0.0.1:5025")]
        vna: String,

        /// Supply ramp rate in A/s, clamped to the supported range
        #[arg(long)]
        ramp_rate: Option<f64>,

        /// Root folder of the persisted data
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Use simulated instruments
        #[arg(long)]
        simulate: bool,

        /// Overwrite an existing measurement with the same name
        #[arg(long)]
        force: bool,
    },

    /// Run the demagnetization sequence on one supply
    Demag {
        #[arg(long)]
        port: String,

        #[arg(long, default_value_t = 9600)]
        baud: u32,
    },

    /// Summarize a persisted series folder
    Inspect {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Run {
            config,
            ps1,
            ps2,
            baud,
            vna,
            ramp_rate,
            data_dir,
            simulate,
            force,
        } => {
            let instruments = Instruments {
                ps1,
                ps2,
                baud,
                vna,
                ramp_rate,
                simulate,
            };
            run_sweep(&config, instruments, data_dir, force).await
        }
        Commands::Demag { port, baud } => run_demag(&port, baud).await,
        Commands::Inspect { folder } => run_inspect(&folder),
    }
}

struct Instruments {
    ps1: Option<String>,
    ps2: Option<String>,
    baud: u32,
    vna: String,
    ramp_rate: Option<f64>,
    simulate: bool,
}

async fn run_sweep(
    config_path: &Path,
    instruments: Instruments,
    data_dir: PathBuf,
    force: bool,
) -> Result<()> {
    let config = SweepConfig::load(config_path)
        .with_context(|| format!("Failed to load config {:?}", config_path))?;
    let plan = config.validate().context("Invalid sweep configuration")?;

    let sink = CsvDataSink::new(&data_dir);
    if !force
        && sink.measurement_exists(&config.user_name, &config.sample_name, &config.measurement_name)
    {
        bail!(
            "Measurement {} already exists under {:?}, use --force to overwrite",
            config.measurement_name,
            data_dir
        );
    }

    SettingsStore::new(data_dir.clone())?
        .save_last(&config)
        .context("Failed to save last settings")?;

    let reporter = Reporter::new(chrono::Local::now().format("%Y%m%d-%H%M%S").to_string());
    info!(
        "Session {}: {} mode, {} steps",
        reporter.session_id(),
        plan.mode,
        plan.steps.len()
    );

    let session = if instruments.simulate {
        simulated_session(&config, &reporter).await?
    } else {
        hardware_session(&config, &instruments, &reporter).await?
    };

    let mut controller = SweepController::new(session, Box::new(sink), &reporter);
    let result = controller.run(&config).await;

    println!("{}", SweepMonitor::new(reporter.metrics().clone()).generate_report());

    let outcome = result.context("Sweep failed")?;
    info!(
        "Saved {} steps per parameter under {:?}",
        outcome.steps, data_dir
    );
    Ok(())
}

async fn hardware_session(
    config: &SweepConfig,
    instruments: &Instruments,
    reporter: &Reporter,
) -> Result<SweepSession> {
    let analyzer = VnaSession::connect(instruments.vna.as_str(), reporter)
        .await
        .with_context(|| format!("Failed to connect to VNA at {}", instruments.vna))?;
    let mut session = SweepSession::new(Box::new(analyzer));

    if let Some(port) = &instruments.ps1 {
        if let Some(supply) = open_supply(port, config, instruments, reporter).await {
            session = session.with_primary(supply);
        }
    }
    if let Some(port) = &instruments.ps2 {
        if let Some(supply) = open_supply(port, config, instruments, reporter).await {
            session = session.with_secondary(supply);
        }
    }

    Ok(session)
}

/// A supply that cannot be opened is left out; the sweep decides whether it was needed
async fn open_supply(
    port: &str,
    config: &SweepConfig,
    instruments: &Instruments,
    reporter: &Reporter,
) -> Option<Box<dyn CurrentSource>> {
    let supply = match PowerSupplyChannel::connect(port, instruments.baud, reporter) {
        Ok(supply) => supply,
        Err(e) => {
            reporter.warn(format_args!("Continuing without power supply {}: {}", port, e));
            return None;
        }
    };

    let mut supply = supply
        .with_response_timeout(config.timing.supply_timeout())
        .with_demag_dwell(config.timing.demag_dwell());

    if let Err(e) = supply.identify().await {
        reporter.warn(format_args!("Power supply {} did not identify: {}", port, e));
    }
    if let Some(rate) = instruments.ramp_rate {
        if let Err(e) = supply.set_ramp_rate(rate).await {
            reporter.warn(format_args!("Could not set ramp rate on {}: {}", port, e));
        }
    }

    Some(Box::new(supply))
}

async fn simulated_session(config: &SweepConfig, reporter: &Reporter) -> Result<SweepSession> {
    let (vna_io, _) = SimulatedVna::new().spawn();
    let analyzer: Box<dyn Analyzer> = Box::new(VnaSession::open("sim-vna", vna_io, reporter).await?);

    let mut session = SweepSession::new(analyzer);
    for (slot, port) in ["sim-ps1", "sim-ps2"].into_iter().enumerate() {
        let (io, _) = SimulatedPowerSupply::new().spawn();
        let supply = PowerSupplyChannel::with_transport(port, io, reporter)
            .with_response_timeout(config.timing.supply_timeout())
            .with_demag_dwell(config.timing.demag_dwell());
        session = match slot {
            0 => session.with_primary(Box::new(supply)),
            _ => session.with_secondary(Box::new(supply)),
        };
    }

    Ok(session)
}

async fn run_demag(port: &str, baud: u32) -> Result<()> {
    let reporter = Reporter::new("demag");
    let mut supply = PowerSupplyChannel::connect(port, baud, &reporter)
        .with_context(|| format!("Failed to open power supply on {}", port))?;

    let result = supply.demagnetize().await;
    supply.close().await?;
    result.context("Demagnetization failed")
}

fn run_inspect(folder: &Path) -> Result<()> {
    let measurement = load_measurement(folder)
        .with_context(|| format!("Failed to load measurement from {:?}", folder))?;
    let metadata = &measurement.metadata;

    println!("Measurement: {}", metadata.measurement_name);
    println!("  User/sample: {}/{}", metadata.user_name, metadata.sample_name);
    println!("  Recorded:    {}", metadata.datetime);
    println!("  Mode:        {} (angle {} deg)", metadata.dipole_mode, metadata.angle);
    println!(
        "  Frequency:   {} - {} Hz, {} points",
        metadata.vna.start_frequency, metadata.vna.stop_frequency, metadata.vna.number_of_points
    );
    println!(
        "  Steps:       {} of {}{}",
        measurement.steps(),
        metadata.field_sweep.len(),
        if measurement.is_complete() { "" } else { " (incomplete)" }
    );
    if let (Some(first), Some(last)) = (measurement.fields.first(), measurement.fields.last()) {
        println!("  Fields:      {} .. {} mT", first, last);
    }

    Ok(())
}
