use crate::core::DipoleMode;
use crate::error::{Result, SweepError};
use crate::hal::{Analyzer, CurrentSource};

/// Supply position within the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplySlot {
    /// Dipole magnet, or the first quadrupole coil
    Primary,
    /// Second quadrupole coil
    Secondary,
}

impl SupplySlot {
    fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }

    /// Slots a mode drives, in the order they are set
    pub fn required(mode: DipoleMode) -> &'static [SupplySlot] {
        match mode {
            DipoleMode::Dipole => &[Self::Primary],
            DipoleMode::Quadrupole => &[Self::Primary, Self::Secondary],
        }
    }
}

/// Exclusive owner of the instruments for the duration of one sweep.
///
/// Tracks which supplies were ever driven so that finalization only talks to those.
pub struct SweepSession {
    supplies: [Option<Box<dyn CurrentSource>>; 2],
    energized: [bool; 2],
    analyzer: Box<dyn Analyzer>,
}

impl SweepSession {
    pub fn new(analyzer: Box<dyn Analyzer>) -> Self {
        Self {
            supplies: [None, None],
            energized: [false; 2],
            analyzer,
        }
    }

    pub fn with_primary(mut self, supply: Box<dyn CurrentSource>) -> Self {
        self.supplies[0] = Some(supply);
        self
    }

    pub fn with_secondary(mut self, supply: Box<dyn CurrentSource>) -> Self {
        self.supplies[1] = Some(supply);
        self
    }

    pub fn supply(&self, slot: SupplySlot) -> Option<&dyn CurrentSource> {
        self.supplies[slot.index()].as_deref()
    }

    pub fn primary(&self) -> Option<&dyn CurrentSource> {
        self.supply(SupplySlot::Primary)
    }

    pub fn secondary(&self) -> Option<&dyn CurrentSource> {
        self.supply(SupplySlot::Secondary)
    }

    pub fn analyzer_mut(&mut self) -> &mut dyn Analyzer {
        self.analyzer.as_mut()
    }

    /// Fail if a supply the mode drives is not connected
    pub fn require(&self, mode: DipoleMode) -> Result<()> {
        for &slot in SupplySlot::required(mode) {
            if self.supply(slot).is_none() {
                return Err(SweepError::InvalidConfiguration(format!(
                    "{} mode needs the {:?} power supply",
                    mode, slot
                )));
            }
        }
        Ok(())
    }

    /// Set one supply; the supply counts as energized from the first attempt on
    pub async fn set_current(&mut self, slot: SupplySlot, amps: f64) -> Result<()> {
        let supply = self.supplies[slot.index()].as_mut().ok_or_else(|| missing(slot))?;
        self.energized[slot.index()] = true;
        supply.set_current(amps).await
    }

    pub async fn demagnetize(&mut self, slot: SupplySlot) -> Result<()> {
        let supply = self.supplies[slot.index()].as_mut().ok_or_else(|| missing(slot))?;
        self.energized[slot.index()] = true;
        supply.demagnetize().await
    }

    /// Drive every energized supply back to zero.
    ///
    /// All supplies are attempted even if one fails; the first failure is returned.
    pub async fn zero_energized(&mut self) -> Result<()> {
        let mut first_error = None;

        for (supply, energized) in self.supplies.iter_mut().zip(self.energized.iter_mut()) {
            let Some(supply) = supply.as_mut() else {
                continue;
            };
            if !*energized {
                continue;
            }

            match supply.set_current(0.0).await {
                Ok(()) => *energized = false,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Whether a supply may still carry a nonzero current
    pub fn is_energized(&self, slot: SupplySlot) -> bool {
        self.energized[slot.index()]
    }

    /// Release every instrument; safe to call more than once
    pub async fn close(&mut self) -> Result<()> {
        let mut first_error = None;

        for supply in self.supplies.iter_mut().flatten() {
            if let Err(e) = supply.close().await {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.analyzer.close().await {
            first_error.get_or_insert(e);
        }

        first_error.map_or(Ok(()), Err)
    }
}

fn missing(slot: SupplySlot) -> SweepError {
    SweepError::InvalidConfiguration(format!("{:?} power supply is not connected", slot))
}
