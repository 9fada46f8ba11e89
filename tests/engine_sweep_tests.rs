use fieldsweep::config::{FieldSweepSpec, SweepConfig, SweepTiming};
use fieldsweep::core::SParameter;
use fieldsweep::engine::{SupplySlot, SweepState};
use fieldsweep::hal::mock::{SimulatedPowerSupply, SimulatedVna, SupplyProbe, VnaProbe};
use fieldsweep::hal::{PowerSupplyChannel, VnaSession, VnaSettings};
use fieldsweep::observability::Reporter;
use fieldsweep::storage::{load_measurement, CsvDataSink, DataSink, MemorySink};
use fieldsweep::{SweepController, SweepError, SweepSession};
use std::time::Duration;
use tempfile::tempdir;

const POINTS: u32 = 3;

fn config(dipole_mode: u8, field_sweep: Vec<f64>) -> SweepConfig {
    SweepConfig {
        user_name: "alice".to_string(),
        sample_name: "yig".to_string(),
        measurement_name: "fmr".to_string(),
        description: String::new(),
        dipole_mode,
        s_parameter: "S21".to_string(),
        angle: 0.0,
        ref_field: 0.0,
        avg_factor: 1,
        demagnetize: false,
        vna: VnaSettings {
            start_frequency: 1.0e9,
            stop_frequency: 2.0e9,
            bandwidth: 1000.0,
            power: -10.0,
            number_of_points: POINTS,
            cal_name: String::new(),
        },
        timing: SweepTiming::immediate(),
        field_sweep: FieldSweepSpec::Values(field_sweep),
    }
}

struct Rig {
    reporter: Reporter,
    vna: VnaProbe,
    ps1: SupplyProbe,
    ps2: SupplyProbe,
}

/// Simulated analyzer and two simulated supplies; `supplies` selects which are connected
async fn rig(vna: SimulatedVna, supplies: [bool; 2]) -> (SweepSession, Rig) {
    let reporter = Reporter::new("test-sweep");
    let (vna_io, vna_probe) = vna.spawn();
    let (ps1_io, ps1) = SimulatedPowerSupply::new().spawn();
    let (ps2_io, ps2) = SimulatedPowerSupply::new().spawn();

    let analyzer = VnaSession::open("sim-vna", vna_io, &reporter).await.unwrap();
    let mut session = SweepSession::new(Box::new(analyzer));
    if supplies[0] {
        session = session.with_primary(Box::new(
            PowerSupplyChannel::with_transport("sim-ps1", ps1_io, &reporter)
                .with_demag_dwell(Duration::ZERO),
        ));
    }
    if supplies[1] {
        session = session.with_secondary(Box::new(
            PowerSupplyChannel::with_transport("sim-ps2", ps2_io, &reporter)
                .with_demag_dwell(Duration::ZERO),
        ));
    }

    let rig = Rig {
        reporter,
        vna: vna_probe,
        ps1,
        ps2,
    };
    (session, rig)
}

fn controller(session: SweepSession, sink: impl DataSink + 'static, rig: &Rig) -> SweepController {
    SweepController::new(session, Box::new(sink), &rig.reporter)
}

fn currents_sent(probe: &SupplyProbe) -> Vec<f64> {
    probe
        .commands()
        .iter()
        .filter_map(|c| c.strip_prefix("CUR "))
        .map(|v| v.parse().unwrap())
        .collect()
}

#[tokio::test]
async fn test_dipole_sweep_end_to_end() {
    let (session, rig) = rig(SimulatedVna::new(), [true, true]).await;
    let sink = MemorySink::new();
    let mut controller = controller(session, sink.clone(), &rig);

    let outcome = controller.run(&config(1, vec![5.0, 10.0])).await.unwrap();

    assert_eq!(outcome.steps, 3);
    assert_eq!(controller.state(), &SweepState::Completed { steps: 3 });

    let s21 = outcome.series(SParameter::S21);
    assert_eq!(s21.field, vec![0.0, 0.0, 0.0, 5.0, 5.0, 5.0, 10.0, 10.0, 10.0]);
    let expected = [-0.054, 0.046, 0.146];
    for (step, expected) in expected.iter().enumerate() {
        let current = s21.current[step * POINTS as usize];
        assert!((current - expected).abs() < 5e-4, "step {}: {}", step, current);
    }
    assert_eq!(s21.current1, vec![0.0; 9]);

    let sent = currents_sent(&rig.ps1);
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[3], 0.0);
    assert_eq!(rig.ps1.current(), 0.0);
    assert!(!rig.ps1.output_on());
    assert!(rig.ps2.commands().is_empty());

    let primary = controller.session().primary().unwrap();
    assert_eq!(primary.state().last_current, 0.0);
    assert!(!primary.state().output_on);

    assert_eq!(sink.series("fmr_S11").unwrap().steps(), 3);
    assert_eq!(sink.metadata("fmr_S22").unwrap().s_parameter, "S22");
    assert_eq!(rig.vna.completed_acquisitions(), 3);
    assert_eq!(rig.reporter.metrics().steps_completed(), 3);
    assert_eq!(rig.reporter.metrics().series_writes(), 12);
}

#[tokio::test]
async fn test_timeout_on_second_acquisition_zeroes_and_keeps_first_step() {
    let (session, rig) = rig(SimulatedVna::new().stall_on_acquisition(2), [true, true]).await;
    let sink = MemorySink::new();
    let mut controller = controller(session, sink.clone(), &rig);

    let err = controller.run(&config(2, vec![10.0, 20.0])).await.unwrap_err();

    assert!(matches!(err, SweepError::AcquisitionTimeout { .. }));
    assert!(err.is_fatal());
    assert_eq!(controller.state().name(), "Failed");
    for slot in [SupplySlot::Primary, SupplySlot::Secondary] {
        assert!(!controller.session().is_energized(slot));
    }

    for probe in [&rig.ps1, &rig.ps2] {
        assert_eq!(probe.current(), 0.0);
        assert!(!probe.output_on());
    }
    for supply in [controller.session().primary(), controller.session().secondary()] {
        assert_eq!(supply.unwrap().state().last_current, 0.0);
    }

    for param in SParameter::ALL {
        let series = sink.series(&format!("fmr_{}", param)).unwrap();
        assert_eq!(series.steps(), 1);
        assert_eq!(series.rows(), POINTS as usize);
    }
}

#[tokio::test]
async fn test_partial_sweep_on_disk_is_loadable() {
    let dir = tempdir().unwrap();
    let (session, rig) = rig(SimulatedVna::new().stall_on_acquisition(2), [true, true]).await;
    let mut controller = controller(session, CsvDataSink::new(dir.path()), &rig);

    assert!(controller.run(&config(2, vec![10.0, 20.0])).await.is_err());

    let measurement = load_measurement(&dir.path().join("alice/yig/fmr_S12")).unwrap();
    assert_eq!(measurement.steps(), 1);
    assert!(!measurement.is_complete());
    assert_eq!(measurement.fields, vec![0.0]);
    assert_eq!(measurement.metadata.field_sweep, vec![0.0, 10.0, 20.0]);
}

#[tokio::test]
async fn test_invalid_mode_aborts_before_any_command() {
    let (session, rig) = rig(SimulatedVna::new(), [true, true]).await;
    let sink = MemorySink::new();
    let mut controller = controller(session, sink.clone(), &rig);

    let err = controller.run(&config(3, vec![5.0])).await.unwrap_err();

    assert!(matches!(err, SweepError::InvalidConfiguration(_)));
    assert!(rig.ps1.commands().is_empty());
    assert!(rig.ps2.commands().is_empty());
    assert!(!rig.vna.commands().iter().any(|c| c.starts_with("SENS1")));
    assert_eq!(sink.writes(), 0);
    assert_eq!(
        controller.state(),
        &SweepState::Failed {
            error_msg: err.to_string()
        }
    );
}

#[tokio::test]
async fn test_quadrupole_without_second_supply_is_rejected() {
    let (session, rig) = rig(SimulatedVna::new(), [true, false]).await;
    let mut controller = controller(session, MemorySink::new(), &rig);

    let err = controller.run(&config(2, vec![5.0])).await.unwrap_err();

    assert!(matches!(err, SweepError::InvalidConfiguration(_)));
    assert!(rig.ps1.commands().is_empty());
}

#[tokio::test]
async fn test_dipole_without_primary_supply_is_rejected() {
    let (session, rig) = rig(SimulatedVna::new(), [false, true]).await;
    let mut controller = controller(session, MemorySink::new(), &rig);

    let err = controller.run(&config(1, vec![5.0])).await.unwrap_err();

    assert!(matches!(err, SweepError::InvalidConfiguration(_)));
    assert!(rig.ps2.commands().is_empty());
}

#[tokio::test]
async fn test_current_limit_skips_set_and_continues() {
    let (session, rig) = rig(SimulatedVna::new(), [true, false]).await;
    let sink = MemorySink::new();
    let mut controller = controller(session, sink.clone(), &rig);

    // 200 mT needs about 3.94 A
    let outcome = controller.run(&config(1, vec![200.0, 5.0])).await.unwrap();

    assert_eq!(outcome.steps, 3);
    assert_eq!(rig.reporter.metrics().limit_violations(), 1);
    assert!(rig.reporter.metrics().warnings() >= 1);
    assert!(currents_sent(&rig.ps1).iter().all(|c| c.abs() <= 3.6));
    assert_eq!(rig.ps1.current(), 0.0);

    let s11 = outcome.series(SParameter::S11);
    let mapped = (200.0 - 2.7001) / 50.027;
    assert!((s11.current[POINTS as usize] - mapped).abs() < 1e-12);
}

#[tokio::test]
async fn test_persistence_failure_aborts_and_zeroes() {
    let (session, rig) = rig(SimulatedVna::new(), [true, false]).await;
    // step 0 writes four series, step 1 fails on its first
    let sink = MemorySink::failing_after(4);
    let mut controller = controller(session, sink.clone(), &rig);

    let err = controller.run(&config(1, vec![5.0, 10.0])).await.unwrap_err();

    assert!(err.is_persistence());
    assert_eq!(sink.series("fmr_S11").unwrap().steps(), 1);
    assert_eq!(rig.ps1.current(), 0.0);
    assert!(!rig.ps1.output_on());
}

#[tokio::test]
async fn test_demagnetize_runs_before_first_step() {
    let (session, rig) = rig(SimulatedVna::new(), [true, true]).await;
    let mut controller = controller(session, MemorySink::new(), &rig);
    let mut config = config(2, vec![5.0]);
    config.demagnetize = true;

    controller.run(&config).await.unwrap();

    for probe in [&rig.ps1, &rig.ps2] {
        let sent = currents_sent(probe);
        assert_eq!(sent[0], 3.0);
        assert_eq!(sent[13], 0.0);
        assert_eq!(sent.len(), 14 + 2 + 1);
        assert_eq!(probe.current(), 0.0);
    }
}

#[tokio::test]
async fn test_controller_runs_once() {
    let (session, rig) = rig(SimulatedVna::new(), [true, false]).await;
    let mut controller = controller(session, MemorySink::new(), &rig);
    let config = config(1, vec![5.0]);

    controller.run(&config).await.unwrap();
    let err = controller.run(&config).await.unwrap_err();

    assert!(matches!(err, SweepError::InvalidTransition { .. }));
}
