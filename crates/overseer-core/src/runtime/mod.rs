// crates/overseer-core/src/runtime/mod.rs
// ============================================================================
// Module: Overseer Runtime Engines
// Description: Tick service, event bus, decision queue, trust, and injection.
// Purpose: House the in-process engines that drive the control plane.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime engines are the moving parts of the control plane. Each owns one
//! concern behind one mutex: the tick service owns the clock, the bus owns
//! subscriptions, the queue owns decision state, the trust engine owns
//! scores, and the scheduler owns per-agent injection tracking. Engines
//! compose through the tick clock and the event bus; the server crate does
//! the wiring.

/// Synchronous filtered pub/sub.
pub mod bus;
/// Context injection scheduling.
pub mod injection;
/// Decision queue with waiters and timeouts.
pub mod queue;
/// Discrete project clock.
pub mod tick;
/// Trust scoring and decay.
pub mod trust;

pub use bus::BusFilter;
pub use bus::EventBus;
pub use bus::EventHandler;
pub use injection::ContextInjectionScheduler;
pub use injection::ScheduledInjection;
pub use injection::pending_summaries;
pub use queue::BADGE_AGENT_BRAKED;
pub use queue::BADGE_AGENT_KILLED;
pub use queue::DecisionQueue;
pub use queue::ORPHAN_PRIORITY_BOOST;
pub use queue::QueuePolicy;
pub use tick::TickHandler;
pub use tick::TickMode;
pub use tick::TickService;
pub use trust::TrustEngine;
