use num_complex::Complex64;
use std::sync::{Arc, Mutex};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

use super::lock;

#[derive(Debug, Clone)]
struct VnaRecord {
    commands: Vec<String>,
    start_frequency: f64,
    stop_frequency: f64,
    points: usize,
    completed: u32,
    trace_definitions: u32,
}

impl Default for VnaRecord {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            start_frequency: 1.0e9,
            stop_frequency: 2.0e9,
            points: 201,
            completed: 0,
            trace_definitions: 0,
        }
    }
}

/// Simulated four-port network analyzer on a raw SCPI socket
#[derive(Debug, Clone)]
pub struct SimulatedVna {
    identity: String,
    stall_on: Option<u32>,
}

impl SimulatedVna {
    pub fn new() -> Self {
        Self {
            identity: "Simulated,ZNB,0,1.0".to_string(),
            stall_on: None,
        }
    }

    /// Never signal completion of the given acquisition (1-based)
    pub fn stall_on_acquisition(mut self, acquisition: u32) -> Self {
        self.stall_on = Some(acquisition);
        self
    }

    /// Sample the simulator reports for parameter `quarter`, point `point` of acquisition
    /// `acquisition` (0-based)
    pub fn sample(quarter: usize, point: usize, acquisition: u32) -> Complex64 {
        Complex64::new(
            0.1 * (quarter + 1) as f64 + 0.001 * point as f64,
            0.05 * f64::from(acquisition + 1) - 0.002 * point as f64,
        )
    }

    /// Start serving; returns the host end of the link and a probe
    pub fn spawn(self) -> (DuplexStream, VnaProbe) {
        let (host, device) = duplex(64 * 1024);
        let record = Arc::new(Mutex::new(VnaRecord::default()));
        let probe = VnaProbe {
            record: record.clone(),
        };

        tokio::spawn(self.serve(device, record));
        (host, probe)
    }

    async fn serve(self, mut io: DuplexStream, record: Arc<Mutex<VnaRecord>>) {
        let mut pending = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            let read = match io.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(read) => read,
            };
            pending.extend_from_slice(&chunk[..read]);

            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
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

    fn execute(&self, command: &str, record: &Mutex<VnaRecord>) -> Option<String> {
        let mut record = lock(record);
        record.commands.push(command.to_string());

        let reply = if command == "*IDN?" {
            self.identity.clone()
        } else if command.ends_with("*OPC?") {
            if self.stall_on == Some(record.completed + 1) {
                return None;
            }
            "1".to_string()
        } else if command == "CALCulate1:DATA:ALL? SDAT" {
            let buffer = Self::buffer(record.points, record.completed);
            record.completed += 1;
            join(&buffer)
        } else if command == "CALCulate1:DATA:STIMulus?" {
            join(&Self::stimulus(&record))
        } else if command.contains('?') {
            "0".to_string()
        } else {
            Self::configure(command, &mut record);
            return None;
        };

        Some(format!("{}\n", reply))
    }

    fn configure(command: &str, record: &mut VnaRecord) {
        let (header, arg) = command.split_once(' ').unwrap_or((command, ""));
        match header {
            "SENS1:FREQ:STAR" => {
                if let Ok(value) = arg.parse() {
                    record.start_frequency = value;
                }
            }
            "SENS1:FREQ:STOP" => {
                if let Ok(value) = arg.parse() {
                    record.stop_frequency = value;
                }
            }
            "SENS1:SWE:POIN" => {
                if let Ok(value) = arg.parse() {
                    record.points = value;
                }
            }
            "CALC1:PAR:SDEF" => record.trace_definitions += 1,
            _ => {}
        }
    }

    fn buffer(points: usize, acquisition: u32) -> Vec<f64> {
        let mut values = Vec::with_capacity(points * 8);
        for quarter in 0..4 {
            for point in 0..points {
                let s = Self::sample(quarter, point, acquisition);
                values.push(s.re);
                values.push(s.im);
            }
        }
        values
    }

    fn stimulus(record: &VnaRecord) -> Vec<f64> {
        let span = record.stop_frequency - record.start_frequency;
        let steps = record.points.saturating_sub(1).max(1) as f64;
        (0..record.points)
            .map(|k| record.start_frequency + span * k as f64 / steps)
            .collect()
    }
}

impl Default for SimulatedVna {
    fn default() -> Self {
        Self::new()
    }
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// View of what a simulated analyzer has received
#[derive(Debug, Clone)]
pub struct VnaProbe {
    record: Arc<Mutex<VnaRecord>>,
}

impl VnaProbe {
    pub fn commands(&self) -> Vec<String> {
        lock(&self.record).commands.clone()
    }

    /// Acquisitions whose trace buffer has been read
    pub fn completed_acquisitions(&self) -> u32 {
        lock(&self.record).completed
    }

    /// Number of `CALC1:PAR:SDEF` directives received
    pub fn trace_definitions(&self) -> u32 {
        lock(&self.record).trace_definitions
    }

    pub fn points(&self) -> usize {
        lock(&self.record).points
    }
}
