use fieldsweep::hal::mock::SimulatedPowerSupply;
use fieldsweep::hal::power_supply::DEMAG_SEQUENCE;
use fieldsweep::hal::{ChannelState, CurrentSource, PowerSupplyChannel};
use fieldsweep::observability::Reporter;
use fieldsweep::SweepError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_test::io::Builder;

#[tokio::test]
async fn test_over_limit_current_is_never_sent() {
    // the script only allows the first, valid set; any further write would fail the mock
    let io = Builder::new()
        .write(b"CUR +0.5\r")
        .read(b"CMLT\r")
        .write(b"OUT 1\r")
        .read(b"CMLT\r")
        .build();
    let reporter = Reporter::new("limit");
    let mut supply = PowerSupplyChannel::with_transport("COM3", io, &reporter);

    supply.set_current(0.5).await.unwrap();
    let err = supply.set_current(4.0).await.unwrap_err();

    assert!(matches!(
        err,
        SweepError::CurrentLimitExceeded { requested, limit } if requested == 4.0 && limit == 3.6
    ));
    assert!(!err.is_fatal());
    assert_eq!(supply.state().last_current, 0.5);
    assert!(supply.state().output_on);
    assert_eq!(reporter.metrics().limit_violations(), 1);
}

#[tokio::test]
async fn test_negative_over_limit_is_rejected() {
    let io = Builder::new().build();
    let reporter = Reporter::new("limit");
    let mut supply = PowerSupplyChannel::with_transport("COM3", io, &reporter);

    assert!(supply.set_current(-3.61).await.is_err());
    assert!(supply.set_current(f64::NAN).await.is_err());
    assert_eq!(supply.state().last_current, 0.0);
}

#[tokio::test]
async fn test_zero_current_switches_output_off() {
    let io = Builder::new()
        .write(b"CUR -1.5\r")
        .read(b"CMLT\r")
        .write(b"OUT 1\r")
        .read(b"CMLT\r")
        .write(b"CUR +0\r")
        .read(b"CMLT\r")
        .write(b"OUT 0\r")
        .read(b"CMLT\r")
        .build();
    let reporter = Reporter::new("output");
    let mut supply = PowerSupplyChannel::with_transport("COM3", io, &reporter);

    supply.set_current(-1.5).await.unwrap();
    assert!(supply.state().output_on);
    assert_eq!(
        supply.channel_state(),
        ChannelState::Connected { output_on: true }
    );

    supply.set_current(0.0).await.unwrap();
    assert!(!supply.state().output_on);
    assert_eq!(supply.state().last_current, 0.0);
}

#[tokio::test]
async fn test_ramp_rate_is_clamped() {
    let (io, probe) = SimulatedPowerSupply::new().spawn();
    let reporter = Reporter::new("ramp");
    let mut supply = PowerSupplyChannel::with_transport("sim", io, &reporter);

    supply.set_ramp_rate(5.0).await.unwrap();
    assert_eq!(probe.ramp_rate(), Some(2.0));

    supply.set_ramp_rate(0.001).await.unwrap();
    assert_eq!(probe.ramp_rate(), Some(0.01));

    supply.set_ramp_rate(0.5).await.unwrap();
    assert_eq!(probe.ramp_rate(), Some(0.5));

    assert_eq!(reporter.metrics().warnings(), 2);
}

#[tokio::test]
async fn test_non_finite_ramp_rate_is_never_sent() {
    let (io, probe) = SimulatedPowerSupply::new().spawn();
    let reporter = Reporter::new("ramp-nan");
    let mut supply = PowerSupplyChannel::with_transport("sim", io, &reporter);

    supply.set_ramp_rate(f64::NAN).await.unwrap();
    assert_eq!(probe.ramp_rate(), Some(0.01));

    supply.set_ramp_rate(f64::INFINITY).await.unwrap();
    assert_eq!(probe.ramp_rate(), Some(2.0));

    assert!(probe.commands().iter().all(|c| !c.contains("NaN") && !c.contains("inf")));
    assert_eq!(reporter.metrics().warnings(), 2);
}

#[tokio::test]
async fn test_mismatched_ack_is_tolerated() {
    let (io, probe) = SimulatedPowerSupply::new().with_ack("ERR").spawn();
    let reporter = Reporter::new("ack");
    let mut supply = PowerSupplyChannel::with_transport("sim", io, &reporter);

    supply.set_current(1.0).await.unwrap();

    assert_eq!(supply.state().last_current, 1.0);
    assert!(probe.output_on());
    // one for CUR, one for OUT
    assert_eq!(reporter.metrics().warnings(), 2);
}

#[tokio::test]
async fn test_missing_ack_times_out_with_warning() {
    let (io, probe) = SimulatedPowerSupply::new().silent().spawn();
    let reporter = Reporter::new("silent");
    let mut supply = PowerSupplyChannel::with_transport("sim", io, &reporter)
        .with_response_timeout(Duration::from_millis(50));

    supply.set_current(0.25).await.unwrap();

    assert_eq!(probe.current(), 0.25);
    assert!(supply.state().output_on);
    assert_eq!(reporter.metrics().warnings(), 2);
}

#[tokio::test]
async fn test_end_of_stream_is_connection_error() {
    let io = Builder::new().write(b"CUR +1\r").build();
    let reporter = Reporter::new("eof");
    let mut supply = PowerSupplyChannel::with_transport("COM3", io, &reporter);

    let err = supply.set_current(1.0).await.unwrap_err();
    assert!(matches!(err, SweepError::Connection { .. }));
    assert_eq!(supply.state().last_current, 0.0);
}

#[tokio::test]
async fn test_closed_channel_rejects_operations() {
    let (io, probe) = SimulatedPowerSupply::new().spawn();
    let reporter = Reporter::new("closed");
    let mut supply = PowerSupplyChannel::with_transport("sim", io, &reporter);

    supply.close().await.unwrap();
    supply.close().await.unwrap();
    assert_eq!(supply.channel_state(), ChannelState::Disconnected);

    let err = supply.set_current(1.0).await.unwrap_err();
    assert!(matches!(err, SweepError::Connection { .. }));
    assert!(probe.commands().is_empty());
}

#[tokio::test]
async fn test_identify() {
    let (io, _probe) = SimulatedPowerSupply::new().spawn();
    let reporter = Reporter::new("idn");
    let mut supply = PowerSupplyChannel::with_transport("sim", io, &reporter);

    assert_eq!(supply.identify().await.unwrap(), "SIM,F2031,0,1.0");
}

#[tokio::test]
async fn test_demagnetize_runs_sequence_and_ends_at_zero() {
    let (io, probe) = SimulatedPowerSupply::new().spawn();
    let reporter = Reporter::new("demag");
    let mut supply =
        PowerSupplyChannel::with_transport("sim", io, &reporter).with_demag_dwell(Duration::ZERO);

    supply.demagnetize().await.unwrap();

    let currents: Vec<f64> = probe
        .commands()
        .iter()
        .filter_map(|c| c.strip_prefix("CUR "))
        .map(|v| v.parse().unwrap())
        .collect();

    assert_eq!(currents.len(), DEMAG_SEQUENCE.len() + 1);
    assert_eq!(&currents[..DEMAG_SEQUENCE.len()], &DEMAG_SEQUENCE[..]);
    assert_eq!(currents.last(), Some(&0.0));
    assert_eq!(probe.current(), 0.0);
    assert!(!probe.output_on());
    assert!(!supply.state().output_on);
}

#[tokio::test]
async fn test_late_ack_does_not_shift_identify_reply() {
    let (host, mut device) = tokio::io::duplex(256);
    let reporter = Reporter::new("late-ack");
    let mut supply = PowerSupplyChannel::with_transport("COM3", host, &reporter)
        .with_response_timeout(Duration::from_millis(100));

    // the RATE acknowledgment only shows up after the channel gave up waiting
    supply.set_ramp_rate(0.5).await.unwrap();
    assert_eq!(reporter.metrics().warnings(), 1);
    device.write_all(b"CMLT\r").await.unwrap();

    let device = tokio::spawn(async move {
        let mut received = Vec::new();
        let mut chunk = [0u8; 64];
        while !received.ends_with(b"*IDN?\r") {
            let read = device.read(&mut chunk).await.unwrap();
            received.extend_from_slice(&chunk[..read]);
        }
        device.write_all(b"F2031,v1.2\r").await.unwrap();
        (received, device)
    });

    assert_eq!(supply.identify().await.unwrap(), "F2031,v1.2");
    let (received, _device) = device.await.unwrap();
    assert_eq!(received, b"RATE 0.5\r*IDN?\r");
}
