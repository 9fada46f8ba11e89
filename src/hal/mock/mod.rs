//! In-process instrument simulators speaking the real wire protocols.
//!
//! Each simulator runs as a spawned task on one end of an in-memory duplex stream and returns the
//! other end, which plugs straight into [`PowerSupplyChannel`](crate::hal::PowerSupplyChannel) or
//! [`VnaSession`](crate::hal::VnaSession). A probe handle exposes what the device received.

pub mod power_supply;
pub mod vna;

pub use power_supply::{SimulatedPowerSupply, SupplyProbe};
pub use vna::{SimulatedVna, VnaProbe};

use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
