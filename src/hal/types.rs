use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard safety bound on the supply output, in amperes
pub const MAX_CURRENT_A: f64 = 3.6;

/// Connection state of a supply channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    Disconnected,
    Connected { output_on: bool },
}

/// Acknowledged state of one power supply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSupplyState {
    pub port: String,
    pub output_on: bool,
    pub last_current: f64,
}

impl PowerSupplyState {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            output_on: false,
            last_current: 0.0,
        }
    }

    /// Record an accepted current; output follows `current != 0`
    pub(crate) fn record_current(&mut self, current: f64) {
        self.last_current = current;
        self.output_on = current != 0.0;
    }
}

/// Acquisition settings pushed to the analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VnaSettings {
    /// Hz
    pub start_frequency: f64,
    /// Hz
    pub stop_frequency: f64,
    /// IF bandwidth in Hz
    pub bandwidth: f64,
    /// dBm
    pub power: f64,
    pub number_of_points: u32,
    /// Calibration file name without the `.cal` extension; empty skips the load
    #[serde(default)]
    pub cal_name: String,
}

impl VnaSettings {
    /// Response timeout for one sweep: ten times the nominal sweep time plus 100 ms
    pub fn response_timeout(&self) -> Duration {
        let sweep_ms = f64::from(self.number_of_points) * 10_000.0 / self.bandwidth;
        Duration::from_millis((sweep_ms.ceil() as u64).saturating_add(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_follows_current() {
        let mut state = PowerSupplyState::new("COM3");
        state.record_current(0.5);
        assert!(state.output_on);

        state.record_current(0.0);
        assert!(!state.output_on);
        assert_eq!(state.last_current, 0.0);
    }

    #[test]
    fn test_timeout_scales_with_points_over_bandwidth() {
        let settings = VnaSettings {
            start_frequency: 1.0e9,
            stop_frequency: 2.0e9,
            bandwidth: 100.0,
            power: -10.0,
            number_of_points: 201,
            cal_name: String::new(),
        };

        // 201 / 100 * 10 s + 100 ms
        assert_eq!(settings.response_timeout(), Duration::from_millis(20_200));
    }
}
