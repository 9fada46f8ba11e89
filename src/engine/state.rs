use serde::{Deserialize, Serialize};

/// Sweep execution states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepState {
    Idle,
    /// Validating, configuring the analyzer, optional demagnetization
    Configuring,
    Stepping {
        index: u32,
    },
    Completed {
        steps: u32,
    },
    /// Zeroing currents after an error
    Aborting {
        error_msg: String,
    },
    Failed {
        error_msg: String,
    },
}

impl SweepState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &SweepState) -> bool {
        use SweepState::*;

        match (self, target) {
            // Steps advance one at a time
            (Configuring, Stepping { index }) => *index == 0,
            (Stepping { index: from }, Stepping { index: to }) => *to == from + 1,

            (Idle, Configuring)
            | (Configuring, Aborting { .. })
            | (Stepping { .. }, Completed { .. })
            | (Stepping { .. }, Aborting { .. })
            | (Aborting { .. }, Failed { .. }) => true,

            _ => false,
        }
    }

    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Configuring => "Configuring",
            Self::Stepping { .. } => "Stepping",
            Self::Completed { .. } => "Completed",
            Self::Aborting { .. } => "Aborting",
            Self::Failed { .. } => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

impl Default for SweepState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let idle = SweepState::Idle;
        let configuring = SweepState::Configuring;

        assert!(idle.can_transition_to(&configuring));
        assert!(!configuring.can_transition_to(&idle));
    }

    #[test]
    fn test_steps_advance_by_one() {
        let step0 = SweepState::Stepping { index: 0 };
        let step1 = SweepState::Stepping { index: 1 };
        let step3 = SweepState::Stepping { index: 3 };

        assert!(SweepState::Configuring.can_transition_to(&step0));
        assert!(!SweepState::Configuring.can_transition_to(&step1));
        assert!(step0.can_transition_to(&step1));
        assert!(!step1.can_transition_to(&step3));
        assert!(!step1.can_transition_to(&step0));
    }

    #[test]
    fn test_errors_pass_through_aborting() {
        let stepping = SweepState::Stepping { index: 2 };
        let aborting = SweepState::Aborting {
            error_msg: "timeout".to_string(),
        };
        let failed = SweepState::Failed {
            error_msg: "timeout".to_string(),
        };

        assert!(stepping.can_transition_to(&aborting));
        assert!(!stepping.can_transition_to(&failed));
        assert!(aborting.can_transition_to(&failed));
        assert!(failed.is_terminal());
        assert!(!failed.can_transition_to(&SweepState::Configuring));
    }
}
