// crates/overseer-server/src/resolver.rs
// ============================================================================
// Module: Server Decision Resolver
// Description: Shared side-effect pipeline for decision resolutions.
// Purpose: One path for human, auto, and timeout resolutions.
// Dependencies: overseer-core, crate::{state, ws}
// ============================================================================

//! ## Overview
//! Every resolution — human, mode auto-approval, or deadline fallback —
//! flows through [`apply_resolution`]: attach the resolution in the queue,
//! map it to a trust outcome (skipping deltas for auto-resolutions), append
//! the `trust_outcome` audit record, broadcast `trust_update` when the score
//! moved, forward the resolution to the originating agent best-effort, and
//! broadcast `decision_resolved`. The outcome mapping is a pure function of
//! the resolution and the decision event so the auto path diverges from the
//! human path only in the trust skip.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use overseer_core::AgentId;
use overseer_core::ApprovalAction;
use overseer_core::ArtifactKind;
use overseer_core::AuditLogEntry;
use overseer_core::DecisionEvent;
use overseer_core::DecisionId;
use overseer_core::DecisionResolution;
use overseer_core::OutcomeContext;
use overseer_core::TrustOutcome;
use overseer_core::WorkstreamId;

use crate::error::ApiError;
use crate::state::AppState;
use crate::ws::WsMessage;

// ============================================================================
// SECTION: Outcome Mapping
// ============================================================================

/// Who produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// A human resolved through the decisions endpoint.
    Human,
    /// The control plane resolved (mode auto-approval or deadline).
    Auto,
}

/// Maps a resolution onto the trust outcome it implies, if any.
///
/// Kept pure so the human and auto paths share it; the auto path skips the
/// delta application, not the mapping.
#[must_use]
pub fn outcome_for_resolution(
    resolution: &DecisionResolution,
    event: &DecisionEvent,
) -> Option<TrustOutcome> {
    match (resolution, event) {
        (
            DecisionResolution::Option {
                chosen_option_id, ..
            },
            DecisionEvent::Option(option_event),
        ) => {
            if option_event.recommended_option_id.as_deref() == Some(chosen_option_id.as_str()) {
                Some(TrustOutcome::HumanApprovesRecommendedOption)
            } else {
                Some(TrustOutcome::HumanOverridesAgentDecision)
            }
        }
        (
            DecisionResolution::ToolApproval {
                action, ..
            },
            DecisionEvent::ToolApproval(_),
        ) => match action {
            ApprovalAction::Approve => Some(TrustOutcome::HumanApprovesToolCall),
            ApprovalAction::Reject => Some(TrustOutcome::HumanRejectsToolCall),
            ApprovalAction::Modify => Some(TrustOutcome::HumanOverridesAgentDecision),
        },
        _ => None,
    }
}

/// Collects the artifact kinds and workstreams a decision touches.
fn affected_context(state: &AppState, event: &DecisionEvent) -> OutcomeContext {
    let mut kinds: BTreeSet<ArtifactKind> = BTreeSet::new();
    let mut workstreams: BTreeSet<WorkstreamId> = BTreeSet::new();
    for artifact_id in event.affected_artifact_ids() {
        if let Ok(Some(artifact)) = state.store.get_artifact(artifact_id) {
            kinds.insert(artifact.kind);
            workstreams.insert(artifact.workstream);
        }
    }
    let (blast_radius, tool_category) = match event {
        DecisionEvent::Option(option_event) => (Some(option_event.blast_radius), None),
        DecisionEvent::ToolApproval(approval) => {
            (approval.blast_radius, Some(approval.tool_name.clone()))
        }
    };
    OutcomeContext {
        blast_radius,
        artifact_kinds: kinds.into_iter().collect(),
        workstreams: workstreams.into_iter().collect(),
        tool_category,
    }
}

// ============================================================================
// SECTION: Resolution Pipeline
// ============================================================================

/// Applies a resolution with its full side-effect pipeline.
///
/// Returns `Ok(None)` when the decision is unknown or already terminal
/// (callers surface that as 409); `Ok(Some(resolution))` when this call
/// attached the resolution. Audit, broadcast, and forward failures are
/// logged, never fatal: the queue state is already committed.
///
/// # Errors
///
/// Reserved for future storage-fatal paths; the pipeline currently never
/// fails once the resolution is attached.
pub async fn apply_resolution(
    state: &Arc<AppState>,
    decision_id: &DecisionId,
    resolution: DecisionResolution,
    source: ResolutionSource,
) -> Result<Option<DecisionResolution>, ApiError> {
    let Some(applied) = state.queue.resolve(decision_id, resolution) else {
        return Ok(None);
    };
    let Some(record) = state.queue.get(decision_id) else {
        return Ok(Some(applied));
    };
    let event = record.event;
    let agent_id = event.agent_id().clone();
    let context = affected_context(state, &event);
    let outcome = outcome_for_resolution(&applied, &event);

    let mut effective_delta = 0;
    let mut domain_outcomes = Vec::new();
    if source == ResolutionSource::Human
        && !applied.is_auto_resolved()
        && let Some(outcome) = outcome
    {
        effective_delta =
            state.trust.apply_outcome(&agent_id, outcome, state.tick.current(), &context);
        domain_outcomes = state.trust.flush_domain_log(&agent_id);
        persist_trust(state, &agent_id);
    }

    let audit = AuditLogEntry::now(
        "trust",
        agent_id.as_str(),
        "trust_outcome",
        None,
        Some(serde_json::json!({
            "decisionId": decision_id,
            "outcome": outcome.map(TrustOutcome::as_str),
            "effectiveDelta": effective_delta,
            "autoResolved": applied.is_auto_resolved(),
            "severity": event.severity().as_str(),
            "blastRadius": context.blast_radius.map(overseer_core::BlastRadius::as_str),
            "toolCategory": context.tool_category,
            "affectedArtifactIds": event.affected_artifact_ids(),
            "artifactKinds": context.artifact_kinds,
            "domainOutcomes": domain_outcomes,
        })),
    );
    if let Err(error) = state.store.append_audit(&audit) {
        tracing::warn!(%error, decision = %decision_id, "trust_outcome audit append failed");
    }

    if effective_delta != 0 {
        state.hub.broadcast(&WsMessage::TrustUpdate {
            agent_id: agent_id.clone(),
            delta: effective_delta,
            score: state.trust.score(&agent_id),
            outcome: outcome.map(|outcome| outcome.as_str().to_string()),
        });
    }

    forward_to_agent(state, &agent_id, decision_id, &applied);

    state.hub.broadcast(&WsMessage::DecisionResolved {
        decision_id: decision_id.clone(),
        agent_id: agent_id.clone(),
        resolution: applied.clone(),
    });

    // Reactive `decision_resolved` triggers and decision-gated brake
    // releases run off the resolution, not the bus.
    for scheduled in state.scheduler.on_decision_resolved(&agent_id) {
        let state = Arc::clone(state);
        tokio::spawn(async move {
            state
                .scheduler
                .schedule_injection(&scheduled.agent_id, scheduled.reason, scheduled.priority)
                .await;
        });
    }
    state.brake.on_decision_resolved(state, decision_id).await;

    Ok(Some(applied))
}

/// Persists the engine's current scores for an agent.
fn persist_trust(state: &AppState, agent_id: &AgentId) {
    let score = state.trust.score(agent_id);
    let profile = state.store.trust_profile(agent_id);
    let stored = profile.map(|profile| profile.score).unwrap_or(score);
    let delta = score - stored;
    if delta != 0
        && let Err(error) = state.store.update_trust(agent_id, delta, "resolution outcome")
    {
        tracing::warn!(agent = %agent_id, %error, "trust persistence failed");
    }
    let domains = state.trust.domain_scores(agent_id);
    if !domains.is_empty()
        && let Err(error) = state.store.store_domain_trust_scores(agent_id, &domains)
    {
        tracing::warn!(agent = %agent_id, %error, "domain trust persistence failed");
    }
}

/// Forwards a resolution to the originating agent, best-effort.
fn forward_to_agent(
    state: &Arc<AppState>,
    agent_id: &AgentId,
    decision_id: &DecisionId,
    resolution: &DecisionResolution,
) {
    if state.gateway.registry().get(agent_id).is_none() {
        return;
    }
    let state = Arc::clone(state);
    let agent_id = agent_id.clone();
    let decision_id = decision_id.clone();
    let resolution = resolution.clone();
    tokio::spawn(async move {
        if let Err(error) =
            state.gateway.resolve_decision(&agent_id, &decision_id, &resolution).await
        {
            tracing::warn!(agent = %agent_id, %error, "resolution forward failed");
        }
    });
}
