use anyhow::Result;

use fieldsweep::config::{FieldSweepSpec, SweepConfig, SweepTiming};
use fieldsweep::core::SParameter;
use fieldsweep::hal::mock::{SimulatedPowerSupply, SimulatedVna};
use fieldsweep::hal::{PowerSupplyChannel, VnaSession, VnaSettings};
use fieldsweep::observability::{Reporter, SweepMonitor};
use fieldsweep::storage::{load_measurement, CsvDataSink};
use fieldsweep::{SweepController, SweepSession};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("fieldsweep - Simulated Quadrupole Sweep");
    println!("=======================================\n");

    let config = SweepConfig {
        user_name: "demo".to_string(),
        sample_name: "simulated".to_string(),
        measurement_name: "quadrupole_45deg".to_string(),
        description: "Sweep against simulated instruments".to_string(),
        dipole_mode: 2,
        s_parameter: "S21".to_string(),
        angle: 45.0,
        ref_field: 0.0,
        avg_factor: 2,
        demagnetize: true,
        vna: VnaSettings {
            start_frequency: 2.0e9,
            stop_frequency: 6.0e9,
            bandwidth: 1000.0,
            power: -10.0,
            number_of_points: 51,
            cal_name: String::new(),
        },
        timing: SweepTiming::immediate(),
        field_sweep: FieldSweepSpec::Range("10:10:50".to_string()),
    };

    let reporter = Reporter::new("simulated");
    let (vna_io, vna_probe) = SimulatedVna::new().spawn();
    let (ps1_io, ps1_probe) = SimulatedPowerSupply::new().spawn();
    let (ps2_io, ps2_probe) = SimulatedPowerSupply::new().spawn();

    let session = SweepSession::new(Box::new(VnaSession::open("sim-vna", vna_io, &reporter).await?))
        .with_primary(Box::new(
            PowerSupplyChannel::with_transport("sim-ps1", ps1_io, &reporter)
                .with_demag_dwell(config.timing.demag_dwell()),
        ))
        .with_secondary(Box::new(
            PowerSupplyChannel::with_transport("sim-ps2", ps2_io, &reporter)
                .with_demag_dwell(config.timing.demag_dwell()),
        ));

    let data_dir = std::env::temp_dir().join("fieldsweep-demo");
    let mut controller =
        SweepController::new(session, Box::new(CsvDataSink::new(&data_dir)), &reporter);

    let outcome = controller.run(&config).await?;
    println!("\nFinal state: {}", controller.state().name());
    println!("Completed {} steps", outcome.steps);

    let s21 = outcome.series(SParameter::S21);
    println!("S21 history: {} rows, last field {:?} mT", s21.rows(), s21.field.last());
    println!(
        "Analyzer: {} acquisitions, traces defined {} times",
        vna_probe.completed_acquisitions(),
        vna_probe.trace_definitions() / SParameter::ALL.len() as u32
    );
    println!(
        "Supplies after sweep: {} A (output {}), {} A (output {})",
        ps1_probe.current(),
        ps1_probe.output_on(),
        ps2_probe.current(),
        ps2_probe.output_on()
    );

    let folder = data_dir
        .join(&config.user_name)
        .join(&config.sample_name)
        .join(format!("{}_S21", config.measurement_name));
    let measurement = load_measurement(&folder)?;
    println!(
        "Loaded back {} steps x {} points from {:?}",
        measurement.steps(),
        measurement.frequencies.len(),
        folder
    );

    println!("\n{}", SweepMonitor::new(reporter.metrics().clone()).generate_report());

    Ok(())
}
