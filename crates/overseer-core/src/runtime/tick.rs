// crates/overseer-core/src/runtime/tick.rs
// ============================================================================
// Module: Overseer Tick Service
// Description: Monotonic discrete project clock with ordered fan-out.
// Purpose: Drive decay, timeouts, and periodic triggers from one clock.
// Dependencies: tokio, tracing, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! The tick service is a monotonic integer clock. **Manual** mode advances by
//! explicit [`TickService::advance`]; **timer** mode advances once per
//! wall-clock interval from a spawned task. Each advance fires every
//! subscriber once per intermediate tick in registration order, and every
//! subscriber observes tick `t` before any subscriber observes `t + 1`. The
//! current tick is readable without a lock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::core::SubscriptionId;
use crate::core::Tick;

// ============================================================================
// SECTION: Tick Mode
// ============================================================================

/// Clock drive mode.
///
/// # Invariants
/// - The mode is fixed at construction; `advance` works in either mode, but
///   the HTTP surface only exposes it for manual clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// Advance only by explicit calls.
    Manual,
    /// Advance once per interval from a timer task.
    Timer {
        /// Interval between automatic advances, in milliseconds.
        interval_ms: u64,
    },
}

// ============================================================================
// SECTION: Tick Service
// ============================================================================

/// Subscriber callback invoked once per tick.
pub type TickHandler = Arc<dyn Fn(Tick) + Send + Sync>;

/// Registered subscriber entry.
struct TickSubscriber {
    /// Subscription identifier.
    id: SubscriptionId,
    /// Callback fired per tick.
    handler: TickHandler,
}

/// Mutable subscription state.
struct TickSubscribers {
    /// Subscribers in registration order.
    entries: Vec<TickSubscriber>,
    /// Next subscription id to hand out.
    next_id: u64,
}

/// Monotonic discrete project clock.
///
/// # Invariants
/// - `current` never decreases.
/// - Fan-out for tick `t` completes before fan-out for `t + 1` begins.
pub struct TickService {
    /// Current tick, readable without a lock.
    current: AtomicU64,
    /// Clock drive mode.
    mode: TickMode,
    /// Subscriber registry.
    subscribers: Mutex<TickSubscribers>,
    /// Serializes advances so interleaved calls cannot reorder fan-out.
    advance_gate: Mutex<()>,
}

impl TickService {
    /// Creates a tick service in the given mode, starting at tick 0.
    #[must_use]
    pub fn new(mode: TickMode) -> Self {
        Self {
            current: AtomicU64::new(0),
            mode,
            subscribers: Mutex::new(TickSubscribers {
                entries: Vec::new(),
                next_id: 1,
            }),
            advance_gate: Mutex::new(()),
        }
    }

    /// Returns the clock drive mode.
    #[must_use]
    pub const fn mode(&self) -> TickMode {
        self.mode
    }

    /// Returns the current tick without locking.
    #[must_use]
    pub fn current(&self) -> Tick {
        Tick::new(self.current.load(Ordering::Acquire))
    }

    /// Registers a subscriber fired once per tick in registration order.
    pub fn subscribe(&self, handler: TickHandler) -> SubscriptionId {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let id = SubscriptionId::new(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.entries.push(TickSubscriber {
            id,
            handler,
        });
        id
    }

    /// Removes a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.entries.retain(|entry| entry.id != id);
    }

    /// Advances the clock by `n` ticks, firing subscribers per tick.
    ///
    /// For every tick `t` in `(prev, prev + n]`, each active subscriber
    /// observes `t` before any subscriber observes `t + 1`. Zero is a no-op.
    /// Returns the tick after the advance.
    pub fn advance(&self, n: u64) -> Tick {
        let _gate = match self.advance_gate.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for _ in 0..n {
            let tick = Tick::new(self.current.fetch_add(1, Ordering::AcqRel) + 1);
            let handlers: Vec<TickHandler> = {
                let subscribers = match self.subscribers.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                subscribers.entries.iter().map(|entry| Arc::clone(&entry.handler)).collect()
            };
            for handler in handlers {
                handler(tick);
            }
        }
        self.current()
    }

    /// Spawns the timer task for a timer-mode clock.
    ///
    /// Returns `None` for manual clocks. Aborting the returned handle stops
    /// the timer; the clock itself stays valid.
    #[must_use]
    pub fn start_timer(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let TickMode::Timer {
            interval_ms,
        } = self.mode
        else {
            return None;
        };
        let service = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick of a tokio interval completes immediately; skip it
            // so the clock starts advancing one interval after startup.
            interval.tick().await;
            loop {
                interval.tick().await;
                let service = Arc::clone(&service);
                // Subscriber fan-out may block (store writes); keep it off
                // the timer task so intervals stay on schedule.
                let advanced =
                    tokio::task::spawn_blocking(move || service.advance(1)).await.is_ok();
                if !advanced {
                    tracing::warn!("tick advance task failed; timer continues");
                }
            }
        }))
    }
}

impl std::fmt::Debug for TickService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickService")
            .field("current", &self.current.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
