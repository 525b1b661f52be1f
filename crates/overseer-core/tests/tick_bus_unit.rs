// crates/overseer-core/tests/tick_bus_unit.rs
// ============================================================================
// Module: Tick Service and Event Bus Unit Tests
// Description: Clock ordering, fan-out, filters, and panic isolation.
// Purpose: Validate per-tick ordered fan-out, subscription filtering, and
//          publish-order delivery with isolated handler failures.
// ============================================================================

//! ## Overview
//! Unit-level tests for the clock and bus invariants:
//! - `advance(n)` fires every subscriber once per intermediate tick
//! - Every subscriber observes tick `t` before any observes `t + 1`
//! - Filters match on kind and agent; empty filters match everything
//! - Handler panics never abort sibling handlers
//! - Unsubscribe is idempotent

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    missing_docs,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;

use overseer_core::AgentEvent;
use overseer_core::AgentId;
use overseer_core::EventEnvelope;
use overseer_core::EventKind;
use overseer_core::RunId;
use overseer_core::SourceEventId;
use overseer_core::Tick;
use overseer_core::Timestamp;
use overseer_core::runtime::BusFilter;
use overseer_core::runtime::EventBus;
use overseer_core::runtime::TickMode;
use overseer_core::runtime::TickService;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn status_envelope(agent: &str, sequence: u64, message: &str) -> EventEnvelope {
    EventEnvelope {
        source_event_id: SourceEventId::new(format!("evt-{agent}-{sequence}")),
        source_sequence: sequence,
        source_occurred_at: Timestamp::from_unix_millis(0),
        agent_id: AgentId::new(agent),
        run_id: RunId::new("run-1"),
        ingested_at: Timestamp::from_unix_millis(0),
        event: AgentEvent::Status {
            message: message.to_string(),
        },
    }
}

// ============================================================================
// SECTION: Tick Service
// ============================================================================

#[test]
fn advance_fires_once_per_intermediate_tick_in_order() {
    let service = TickService::new(TickMode::Manual);
    let observed: Arc<Mutex<Vec<(u8, u64)>>> = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&observed);
    service.subscribe(Arc::new(move |tick| first.lock().unwrap().push((1, tick.get()))));
    let second = Arc::clone(&observed);
    service.subscribe(Arc::new(move |tick| second.lock().unwrap().push((2, tick.get()))));

    service.advance(3);
    assert_eq!(service.current(), Tick::new(3));
    let observed = observed.lock().unwrap();
    // Both subscribers complete tick t before anyone sees t + 1, and
    // subscribers fire in registration order within a tick.
    assert_eq!(*observed, vec![(1, 1), (2, 1), (1, 2), (2, 2), (1, 3), (2, 3)]);
}

#[test]
fn advance_zero_is_a_no_op() {
    let service = TickService::new(TickMode::Manual);
    let fired = Arc::new(Mutex::new(0_u32));
    let counter = Arc::clone(&fired);
    service.subscribe(Arc::new(move |_| *counter.lock().unwrap() += 1));
    service.advance(0);
    assert_eq!(service.current(), Tick::ZERO);
    assert_eq!(*fired.lock().unwrap(), 0);
}

#[test]
fn unsubscribe_is_idempotent() {
    let service = TickService::new(TickMode::Manual);
    let fired = Arc::new(Mutex::new(0_u32));
    let counter = Arc::clone(&fired);
    let id = service.subscribe(Arc::new(move |_| *counter.lock().unwrap() += 1));
    service.unsubscribe(id);
    service.unsubscribe(id);
    service.advance(2);
    assert_eq!(*fired.lock().unwrap(), 0);
}

#[test]
fn current_tick_is_readable_from_a_subscriber() {
    let service = Arc::new(TickService::new(TickMode::Manual));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let reader = Arc::clone(&service);
    let sink = Arc::clone(&seen);
    service.subscribe(Arc::new(move |tick| {
        sink.lock().unwrap().push((tick.get(), reader.current().get()));
    }));
    service.advance(2);
    assert_eq!(*seen.lock().unwrap(), vec![(1, 1), (2, 2)]);
}

// ============================================================================
// SECTION: Event Bus
// ============================================================================

#[test]
fn empty_filter_matches_everything() {
    let bus = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    bus.subscribe(
        BusFilter::all(),
        Arc::new(move |envelope| {
            sink.lock().unwrap().push(envelope.source_event_id.to_string());
        }),
    );
    bus.publish(&status_envelope("a-1", 1, "one"));
    bus.publish(&status_envelope("a-2", 1, "two"));
    assert_eq!(received.lock().unwrap().len(), 2);
}

#[test]
fn filters_match_kind_and_agent() {
    let bus = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    bus.subscribe(
        BusFilter {
            kinds: vec![EventKind::Status],
            agent_id: Some(AgentId::new("a-1")),
        },
        Arc::new(move |envelope| {
            sink.lock().unwrap().push(envelope.agent_id.to_string());
        }),
    );
    bus.publish(&status_envelope("a-1", 1, "match"));
    bus.publish(&status_envelope("a-2", 1, "wrong agent"));
    let mut completion = status_envelope("a-1", 2, "");
    completion.event = AgentEvent::Completion {
        summary: None,
    };
    bus.publish(&completion);
    assert_eq!(*received.lock().unwrap(), vec!["a-1".to_string()]);
}

#[test]
fn publish_order_is_preserved_per_subscriber() {
    let bus = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    bus.subscribe(
        BusFilter::all(),
        Arc::new(move |envelope| sink.lock().unwrap().push(envelope.source_sequence)),
    );
    for sequence in 1..=5 {
        bus.publish(&status_envelope("a-1", sequence, "ordered"));
    }
    assert_eq!(*received.lock().unwrap(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn handler_panic_does_not_abort_siblings() {
    let bus = EventBus::new();
    bus.subscribe(BusFilter::all(), Arc::new(|_| panic!("broken handler")));
    let received = Arc::new(Mutex::new(0_u32));
    let sink = Arc::clone(&received);
    bus.subscribe(BusFilter::all(), Arc::new(move |_| *sink.lock().unwrap() += 1));
    bus.publish(&status_envelope("a-1", 1, "survives"));
    assert_eq!(*received.lock().unwrap(), 1);
}

#[test]
fn bus_unsubscribe_is_idempotent() {
    let bus = EventBus::new();
    let received = Arc::new(Mutex::new(0_u32));
    let sink = Arc::clone(&received);
    let id = bus.subscribe(BusFilter::all(), Arc::new(move |_| *sink.lock().unwrap() += 1));
    bus.unsubscribe(id);
    bus.unsubscribe(id);
    bus.publish(&status_envelope("a-1", 1, "nobody home"));
    assert_eq!(*received.lock().unwrap(), 0);
}
