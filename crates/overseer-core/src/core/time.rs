// crates/overseer-core/src/core/time.rs
// ============================================================================
// Module: Overseer Time Model
// Description: Discrete tick clock values and wall-clock timestamps.
// Purpose: Provide the time representations shared by all control-plane engines.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Overseer runs on two clocks. The project **tick** is a discrete monotonic
//! integer advanced manually or by a timer; every scheduler in the control
//! plane keys off it. **Timestamps** are unix-epoch milliseconds recorded at
//! ingestion boundaries and in persisted records. Engines never read the wall
//! clock for tick-driven behavior; rolling-window rate limits are the one
//! wall-clock exception and take explicit `Timestamp` values at the seam.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Tick
// ============================================================================

/// Discrete project clock value.
///
/// # Invariants
/// - Monotonically non-decreasing within a process; only the tick service
///   produces new values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tick(u64);

impl Tick {
    /// Tick zero, the value before any advance.
    pub const ZERO: Self = Self(0);

    /// Creates a tick from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw tick value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the tick advanced by `n`.
    #[must_use]
    pub const fn plus(self, n: u64) -> Self {
        Self(self.0.saturating_add(n))
    }

    /// Returns the number of ticks elapsed since `earlier` (0 when earlier is newer).
    #[must_use]
    pub const fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Wall-clock timestamp in unix-epoch milliseconds.
///
/// # Invariants
/// - Values are explicit; records never implicitly re-stamp on read.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix-epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix-epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Reads the current wall clock.
    ///
    /// Clamps to zero for clocks set before the epoch rather than failing.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Self(millis)
    }

    /// Returns the timestamp moved back by `millis` (saturating at zero).
    #[must_use]
    pub const fn minus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }

    /// Returns the timestamp moved forward by `millis`.
    #[must_use]
    pub const fn plus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Milliseconds in one hour, used by rolling-window rate limits.
pub const MILLIS_PER_HOUR: i64 = 60 * 60 * 1_000;
