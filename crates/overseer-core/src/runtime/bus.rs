// crates/overseer-core/src/runtime/bus.rs
// ============================================================================
// Module: Overseer Event Bus
// Description: In-process publish/subscribe of ingested event envelopes.
// Purpose: Fan observed agent actions out to queue, trust, scheduler, and hub.
// Dependencies: tracing, crate::core::{event, identifiers}
// ============================================================================

//! ## Overview
//! The bus is synchronous in-process pub/sub. `publish` invokes every
//! matching handler in subscription order on the publisher's task; handler
//! panics are isolated (logged, siblings still run). Handlers must be fast
//! and non-blocking; anything slow is deferred by the handler itself.
//! Envelopes from one publisher reach each subscriber in publish order; no
//! cross-publisher ordering is guaranteed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::AgentId;
use crate::core::EventEnvelope;
use crate::core::EventKind;
use crate::core::SubscriptionId;

// ============================================================================
// SECTION: Subscription Filters
// ============================================================================

/// Subscription filter over event kind and agent.
///
/// # Invariants
/// - An empty filter (no kinds, no agent) matches every envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusFilter {
    /// Match any of these kinds (empty = all kinds).
    pub kinds: Vec<EventKind>,
    /// Match a single agent (absent = all agents).
    pub agent_id: Option<AgentId>,
}

impl BusFilter {
    /// Filter matching every envelope.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching a set of kinds.
    #[must_use]
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            agent_id: None,
        }
    }

    /// Returns true when the envelope passes the filter.
    #[must_use]
    pub fn matches(&self, envelope: &EventEnvelope) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&envelope.event.kind()) {
            return false;
        }
        if let Some(agent_id) = &self.agent_id
            && *agent_id != envelope.agent_id
        {
            return false;
        }
        true
    }
}

// ============================================================================
// SECTION: Event Bus
// ============================================================================

/// Subscriber callback invoked per matching envelope.
pub type EventHandler = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

/// Registered subscription entry.
struct BusSubscription {
    /// Subscription identifier.
    id: SubscriptionId,
    /// Filter applied before dispatch.
    filter: BusFilter,
    /// Handler invoked for matching envelopes.
    handler: EventHandler,
}

/// Mutable subscription state.
struct BusSubscriptions {
    /// Subscriptions in registration order.
    entries: Vec<BusSubscription>,
    /// Next subscription id to hand out.
    next_id: u64,
}

/// Synchronous in-process event bus.
///
/// # Invariants
/// - Dispatch happens from a snapshot of the subscription list; the internal
///   lock is never held across a handler call.
pub struct EventBus {
    /// Subscription registry.
    subscriptions: Mutex<BusSubscriptions>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(BusSubscriptions {
                entries: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Registers a handler for envelopes matching the filter.
    pub fn subscribe(&self, filter: BusFilter, handler: EventHandler) -> SubscriptionId {
        let mut subscriptions = match self.subscriptions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let id = SubscriptionId::new(subscriptions.next_id);
        subscriptions.next_id += 1;
        subscriptions.entries.push(BusSubscription {
            id,
            filter,
            handler,
        });
        id
    }

    /// Removes a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscriptions = match self.subscriptions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscriptions.entries.retain(|entry| entry.id != id);
    }

    /// Publishes an envelope to every matching subscriber, in subscription
    /// order, on the calling task. Handler panics are logged and do not
    /// abort the remaining handlers.
    pub fn publish(&self, envelope: &EventEnvelope) {
        let handlers: Vec<(SubscriptionId, EventHandler)> = {
            let subscriptions = match self.subscriptions.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            subscriptions
                .entries
                .iter()
                .filter(|entry| entry.filter.matches(envelope))
                .map(|entry| (entry.id, Arc::clone(&entry.handler)))
                .collect()
        };
        for (id, handler) in handlers {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(envelope)));
            if outcome.is_err() {
                tracing::error!(
                    subscription = id.get(),
                    event_id = %envelope.source_event_id,
                    "event handler panicked; continuing with remaining handlers"
                );
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}
