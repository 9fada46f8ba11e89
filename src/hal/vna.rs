use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use super::traits::Analyzer;
use super::transport::{LineChannel, LF};
use super::types::VnaSettings;
use crate::core::{RawTrace, SParameter};
use crate::error::{Result, SweepError};
use crate::observability::Reporter;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sweeps averaged by the instrument for each trigger
const INSTRUMENT_AVERAGES: u32 = 5;

/// SCPI session with the network analyzer
pub struct VnaSession<T> {
    channel: Option<LineChannel<T>>,
    resource: String,
    traces_defined: bool,
    acquisitions: u32,
    reporter: Reporter,
}

impl VnaSession<TcpStream> {
    /// Connect to the analyzer's raw SCPI socket (usually port 5025)
    pub async fn connect<A>(addr: A, reporter: &Reporter) -> Result<Self>
    where
        A: ToSocketAddrs + std::fmt::Display,
    {
        let resource = addr.to_string();
        let io = TcpStream::connect(addr)
            .await
            .map_err(|e| SweepError::connection(resource.as_str(), e))?;

        Self::open(&resource, io, reporter).await
    }
}

impl<T> VnaSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Identify, reset, and remove the default trace
    pub async fn open(resource: &str, io: T, reporter: &Reporter) -> Result<Self> {
        let mut session = Self {
            channel: Some(LineChannel::new(resource, io, LF, DEFAULT_RESPONSE_TIMEOUT)),
            resource: resource.to_string(),
            traces_defined: false,
            acquisitions: 0,
            reporter: reporter.scoped("vna"),
        };

        let idn = session.query("*IDN?").await?;
        session.reporter.info(format_args!("VNA connected: {}", idn));
        session.write("*RST").await?;
        session.write("CALC1:PAR:DEL 'Trc1'").await?;

        Ok(session)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Timeout currently applied to instrument responses
    pub fn response_timeout(&self) -> Option<Duration> {
        self.channel.as_ref().map(|c| c.timeout())
    }

    /// Acquisitions run so far in this session
    pub fn acquisitions(&self) -> u32 {
        self.acquisitions
    }

    /// Bind one trace per S-parameter and give each its own window
    async fn define_traces(&mut self) -> Result<()> {
        for (slot, param) in SParameter::ALL.iter().enumerate() {
            let n = slot + 1;
            self.write(&format!("CALC1:PAR:SDEF 'Tr{}', '{}AVG'", n, param)).await?;
            self.write(&format!("DISP:WIND{}:STAT ON", n)).await?;
            self.write(&format!("DISP:WIND{}:TRAC{}:FEED 'Tr{}'", n, n, n)).await?;
        }
        self.traces_defined = true;
        Ok(())
    }

    async fn write(&mut self, command: &str) -> Result<()> {
        self.reporter.debug(format_args!("SCPI > {}", command));
        self.channel_mut()?.send(command).await
    }

    /// Query that must be answered; silence is a protocol error
    async fn query(&mut self, command: &str) -> Result<String> {
        self.reporter.debug(format_args!("SCPI ? {}", command));
        let reply = self.channel_mut()?.query(command).await?;
        reply.ok_or_else(|| SweepError::Protocol(format!("no response to {}", command)))
    }

    fn channel_mut(&mut self) -> Result<&mut LineChannel<T>> {
        let resource = &self.resource;
        self.channel
            .as_mut()
            .ok_or_else(|| SweepError::connection(resource.as_str(), "session is closed"))
    }
}

#[async_trait]
impl<T> Analyzer for VnaSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Scales the response timeout to the sweep duration
    async fn apply_configuration(&mut self, settings: &VnaSettings) -> Result<()> {
        self.reporter.info("Applying settings to VNA");

        self.write(&format!("SENS1:FREQ:STAR {}", settings.start_frequency)).await?;
        self.write(&format!("SENS1:FREQ:STOP {}", settings.stop_frequency)).await?;
        self.write(&format!("SENS1:BAND {}", settings.bandwidth)).await?;
        self.write(&format!("SOUR1:POW {}", settings.power)).await?;
        self.write(&format!("SENS1:SWE:POIN {}", settings.number_of_points)).await?;

        if settings.cal_name.is_empty() {
            self.reporter.info("No calibration file configured, skipping correction load");
        } else {
            self.write(&format!(
                ":MMEMORY:LOAD:CORRection 1, '{}.cal'",
                settings.cal_name
            ))
            .await?;
        }

        let timeout = settings.response_timeout();
        self.channel_mut()?.set_timeout(timeout);
        self.reporter.info(format_args!(
            "Settings applied successfully, response timeout {:?}",
            timeout
        ));
        Ok(())
    }

    async fn acquire(&mut self, averages: u32) -> Result<RawTrace> {
        if !self.traces_defined {
            self.define_traces().await?;
        }

        self.write(":INITiate1:CONTinuous:ALL OFF").await?;
        self.write(&format!(":SENSE1:AVER:COUN {}; :AVER ON", INSTRUMENT_AVERAGES)).await?;

        for _ in 0..averages.max(1) {
            let channel = self.channel_mut()?;
            let waited = channel.timeout();
            match channel.query(":INITiate1:IMMediate:ALL; *OPC?").await? {
                Some(_) => {}
                None => return Err(SweepError::AcquisitionTimeout { waited }),
            }
        }

        let values = parse_list(&self.query("CALCulate1:DATA:ALL? SDAT").await?)?;
        let frequencies = parse_list(&self.query("CALCulate1:DATA:STIMulus?").await?)?;
        self.acquisitions += 1;

        self.reporter.debug(format_args!(
            "Acquisition {} returned {} values over {} points",
            self.acquisitions,
            values.len(),
            frequencies.len()
        ));

        Ok(RawTrace::new(values, frequencies))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(channel) = self.channel.take() {
            let mut io = channel.into_inner();
            if let Err(e) = io.shutdown().await {
                self.reporter.debug(format_args!("Shutdown of {} failed: {}", self.resource, e));
            }
            self.reporter.info(format_args!("Closed VNA session {}", self.resource));
        }
        Ok(())
    }
}

/// Parse a comma-separated ASCII number list
fn parse_list(reply: &str) -> Result<Vec<f64>> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Ok(Vec::new());
    }

    reply
        .split(',')
        .map(|token| {
            token.trim().parse::<f64>().map_err(|_| {
                SweepError::MalformedTrace(format!("unparsable value {:?}", token.trim()))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("1.5, -2e-3,4\n").unwrap(), vec![1.5, -2e-3, 4.0]);
        assert!(parse_list("").unwrap().is_empty());
        assert!(matches!(parse_list("1,abc"), Err(SweepError::MalformedTrace(_))));
    }
}
