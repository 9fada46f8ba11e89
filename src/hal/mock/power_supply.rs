use std::sync::{Arc, Mutex};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

use super::lock;
use crate::hal::power_supply::ACK;

#[derive(Debug, Default, Clone)]
struct SupplyRecord {
    commands: Vec<String>,
    current: f64,
    output_on: bool,
    ramp_rate: Option<f64>,
}

/// Simulated bipolar magnet supply
#[derive(Debug, Clone)]
pub struct SimulatedPowerSupply {
    identity: String,
    ack: String,
    respond: bool,
}

impl SimulatedPowerSupply {
    pub fn new() -> Self {
        Self {
            identity: "SIM,F2031,0,1.0".to_string(),
            ack: ACK.to_string(),
            respond: true,
        }
    }

    /// Answer every directive with `ack` instead of `CMLT`
    pub fn with_ack(mut self, ack: impl Into<String>) -> Self {
        self.ack = ack.into();
        self
    }

    /// Execute directives but never answer
    pub fn silent(mut self) -> Self {
        self.respond = false;
        self
    }

    /// Start serving; returns the host end of the link and a probe
    pub fn spawn(self) -> (DuplexStream, SupplyProbe) {
        let (host, device) = duplex(4096);
        let record = Arc::new(Mutex::new(SupplyRecord::default()));
        let probe = SupplyProbe {
            record: record.clone(),
        };

        tokio::spawn(self.serve(device, record));
        (host, probe)
    }

    async fn serve(self, mut io: DuplexStream, record: Arc<Mutex<SupplyRecord>>) {
        let mut pending = Vec::new();
        let mut chunk = [0u8; 256];

        loop {
            let read = match io.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(read) => read,
            };
            pending.extend_from_slice(&chunk[..read]);

            while let Some(pos) = pending.iter().position(|&b| b == b'\r') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                let command = String::from_utf8_lossy(&line[..pos]).trim().to_string();

                if let Some(reply) = self.execute(&command, &record) {
                    if io.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    fn execute(&self, command: &str, record: &Mutex<SupplyRecord>) -> Option<String> {
        let mut record = lock(record);
        record.commands.push(command.to_string());

        let (verb, arg) = command.split_once(' ').unwrap_or((command, ""));
        let reply = match verb {
            "*IDN?" => self.identity.clone(),
            "CUR" => {
                if let Ok(current) = arg.parse::<f64>() {
                    record.current = current;
                }
                self.ack.clone()
            }
            "OUT" => {
                record.output_on = arg == "1";
                self.ack.clone()
            }
            "RATE" => {
                record.ramp_rate = arg.parse::<f64>().ok();
                self.ack.clone()
            }
            _ => "ERR".to_string(),
        };

        self.respond.then(|| format!("{}\r", reply))
    }
}

impl Default for SimulatedPowerSupply {
    fn default() -> Self {
        Self::new()
    }
}

/// View of what a simulated supply has received
#[derive(Debug, Clone)]
pub struct SupplyProbe {
    record: Arc<Mutex<SupplyRecord>>,
}

impl SupplyProbe {
    /// Every directive received, without terminators
    pub fn commands(&self) -> Vec<String> {
        lock(&self.record).commands.clone()
    }

    /// Output current as last programmed (A)
    pub fn current(&self) -> f64 {
        lock(&self.record).current
    }

    pub fn output_on(&self) -> bool {
        lock(&self.record).output_on
    }

    pub fn ramp_rate(&self) -> Option<f64> {
        lock(&self.record).ramp_rate
    }
}
