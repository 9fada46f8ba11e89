use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::traits::CurrentSource;
use super::transport::{LineChannel, CR};
use super::types::{ChannelState, PowerSupplyState, MAX_CURRENT_A};
use crate::error::{Result, SweepError};
use crate::observability::Reporter;

/// Acknowledgment sent by the supply for every accepted directive
pub const ACK: &str = "CMLT";

pub const MIN_RAMP_RATE: f64 = 0.01;
pub const MAX_RAMP_RATE: f64 = 2.0;

/// Alternating, decaying currents used to degauss the magnet core (A)
pub const DEMAG_SEQUENCE: [f64; 13] = [
    3.0, -1.5, 0.75, -0.375, 0.1875, -0.09375, 0.045, -0.02, 0.01, -0.005, 0.002, -0.001, 0.0005,
];

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_DEMAG_DWELL: Duration = Duration::from_millis(500);

/// Driver for one bipolar magnet supply on a carriage-return terminated ASCII link
pub struct PowerSupplyChannel<T> {
    channel: Option<LineChannel<T>>,
    state: PowerSupplyState,
    demag_dwell: Duration,
    reporter: Reporter,
}

impl PowerSupplyChannel<SerialStream> {
    /// Open the serial port. The caller decides whether a missing supply is fatal.
    pub fn connect(port: &str, baud_rate: u32, reporter: &Reporter) -> Result<Self> {
        let io = tokio_serial::new(port, baud_rate)
            .open_native_async()
            .map_err(|e| SweepError::connection(port, e))?;

        let supply = Self::with_transport(port, io, reporter);
        supply.reporter.info(format_args!(
            "Power supply initialized on port {} with baud rate {}",
            port, baud_rate
        ));
        Ok(supply)
    }
}

impl<T> PowerSupplyChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already open byte stream
    pub fn with_transport(port: &str, io: T, reporter: &Reporter) -> Self {
        Self {
            channel: Some(LineChannel::new(port, io, CR, DEFAULT_RESPONSE_TIMEOUT)),
            state: PowerSupplyState::new(port),
            demag_dwell: DEFAULT_DEMAG_DWELL,
            reporter: reporter.scoped("power_supply"),
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        if let Some(channel) = self.channel.as_mut() {
            channel.set_timeout(timeout);
        }
        self
    }

    pub fn with_demag_dwell(mut self, dwell: Duration) -> Self {
        self.demag_dwell = dwell;
        self
    }

    pub fn channel_state(&self) -> ChannelState {
        match self.channel {
            Some(_) => ChannelState::Connected {
                output_on: self.state.output_on,
            },
            None => ChannelState::Disconnected,
        }
    }

    /// Query the identity string
    pub async fn identify(&mut self) -> Result<String> {
        self.reporter.info("Getting power supply ID...");
        let reply = self.channel_mut()?.query("*IDN?").await?;
        match reply {
            Some(id) => {
                self.reporter.info(format_args!("ID: {}", id));
                Ok(id)
            }
            None => {
                let message = format!("{} did not answer *IDN?", self.state.port);
                self.reporter.warn(&message);
                Err(SweepError::Protocol(message))
            }
        }
    }

    /// Set the output ramp rate, clamped to the supported range (A/s)
    pub async fn set_ramp_rate(&mut self, rate: f64) -> Result<()> {
        let clamped = if rate.is_nan() {
            self.reporter.warn(format_args!(
                "Ramp rate {} is not a number, using {} A/s instead",
                rate, MIN_RAMP_RATE
            ));
            MIN_RAMP_RATE
        } else if rate < MIN_RAMP_RATE {
            self.reporter.warn(format_args!(
                "Using rate smaller than {} A/s, using {} A/s instead",
                MIN_RAMP_RATE, MIN_RAMP_RATE
            ));
            MIN_RAMP_RATE
        } else if rate > MAX_RAMP_RATE {
            self.reporter.warn(format_args!(
                "Using rate greater than {} A/s, using {} A/s instead",
                MAX_RAMP_RATE, MAX_RAMP_RATE
            ));
            MAX_RAMP_RATE
        } else {
            rate
        };

        let command = format!("RATE {}", clamped);
        self.reporter.debug(format_args!("Query: {}", command));
        self.channel_mut()?.send(&command).await?;
        self.expect_ack("set_ramp_rate").await
    }

    async fn set_output(&mut self, on: bool) -> Result<()> {
        let command = if on { "OUT 1" } else { "OUT 0" };
        self.channel_mut()?.send(command).await?;
        self.expect_ack("set_output").await
    }

    /// Read one acknowledgment; anything other than `CMLT` is logged and tolerated
    async fn expect_ack(&mut self, context: &str) -> Result<()> {
        let reply = self.channel_mut()?.read_line().await?;
        match reply {
            Some(reply) if reply == ACK => {}
            Some(reply) => {
                self.reporter.warn(format_args!(
                    "Unexpected response in {} on {}: {:?}",
                    context, self.state.port, reply
                ));
            }
            None => {
                self.reporter.warn(format_args!(
                    "No acknowledgment in {} on {}",
                    context, self.state.port
                ));
            }
        }
        Ok(())
    }

    fn channel_mut(&mut self) -> Result<&mut LineChannel<T>> {
        let port = &self.state.port;
        self.channel
            .as_mut()
            .ok_or_else(|| SweepError::connection(port.as_str(), "channel is closed"))
    }
}

#[async_trait]
impl<T> CurrentSource for PowerSupplyChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn port(&self) -> &str {
        &self.state.port
    }

    async fn set_current(&mut self, amps: f64) -> Result<()> {
        if !amps.is_finite() || amps.abs() > MAX_CURRENT_A {
            self.reporter.error(format_args!(
                "Current {}A exceeds max current of {}A",
                amps, MAX_CURRENT_A
            ));
            self.reporter.metrics().record_limit_violation();
            return Err(SweepError::CurrentLimitExceeded {
                requested: amps,
                limit: MAX_CURRENT_A,
            });
        }

        let command = format!("CUR {:+}", amps);
        self.reporter.debug(format_args!("Query: {}", command));
        self.channel_mut()?.send(&command).await?;
        self.expect_ack("set_current").await?;

        self.set_output(amps != 0.0).await?;
        self.state.record_current(amps);
        Ok(())
    }

    async fn demagnetize(&mut self) -> Result<()> {
        self.reporter
            .info(format_args!("Executing demagnetizing sweep on {}...", self.state.port));

        for current in DEMAG_SEQUENCE {
            self.set_current(current).await?;
            tokio::time::sleep(self.demag_dwell).await;
        }
        self.set_current(0.0).await?;

        self.reporter.info("Completed demagnetizing sweep.");
        Ok(())
    }

    fn state(&self) -> &PowerSupplyState {
        &self.state
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(channel) = self.channel.take() {
            let mut io = channel.into_inner();
            if let Err(e) = io.shutdown().await {
                self.reporter
                    .debug(format_args!("Shutdown of {} failed: {}", self.state.port, e));
            }
            self.reporter
                .info(format_args!("Closed connection to power supply {}", self.state.port));
        }
        Ok(())
    }
}
