// crates/overseer-gateway/src/ports.rs
// ============================================================================
// Module: Gateway Port Pool
// Description: Contiguous host-port pool for adapter transports.
// Purpose: Hand out and reclaim host ports with loud exhaustion.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Adapters that bind host ports (the container transport) draw from a
//! contiguous pool. Allocation returns the lowest free port; release returns
//! it. Exhaustion is an error, never a silent wait.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::Mutex;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Port pool errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortPoolError {
    /// Every port in the range is allocated.
    #[error("port pool exhausted ({start}-{end})")]
    Exhausted {
        /// First port in the range.
        start: u16,
        /// Last port in the range.
        end: u16,
    },
}

// ============================================================================
// SECTION: Port Pool
// ============================================================================

/// Contiguous host-port pool.
///
/// # Invariants
/// - A port is either free or allocated, never both.
/// - `allocate` returns the lowest free port.
#[derive(Debug)]
pub struct PortPool {
    /// Configured range (inclusive).
    range: RangeInclusive<u16>,
    /// Free ports.
    free: Mutex<BTreeSet<u16>>,
}

impl PortPool {
    /// Creates a pool over an inclusive range.
    #[must_use]
    pub fn new(range: RangeInclusive<u16>) -> Self {
        let free = range.clone().collect();
        Self {
            range,
            free: Mutex::new(free),
        }
    }

    /// Allocates the lowest free port.
    ///
    /// # Errors
    ///
    /// Returns [`PortPoolError::Exhausted`] when no port is free.
    pub fn allocate(&self) -> Result<u16, PortPoolError> {
        let mut free = match self.free.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(port) = free.iter().next().copied() else {
            return Err(PortPoolError::Exhausted {
                start: *self.range.start(),
                end: *self.range.end(),
            });
        };
        free.remove(&port);
        Ok(port)
    }

    /// Returns a port to the pool. Ports outside the range are ignored.
    pub fn release(&self, port: u16) {
        if !self.range.contains(&port) {
            return;
        }
        let mut free = match self.free.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        free.insert(port);
    }

    /// Returns the number of free ports.
    #[must_use]
    pub fn available(&self) -> usize {
        match self.free.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
