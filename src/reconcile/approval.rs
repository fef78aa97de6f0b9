//! The approval state machine.
//!
//! Pending is only ever the initial state. From there a title moves to
//! Approved or Rejected and may flip between those two on re-review.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::ReconcileError;
use crate::domain::{ApprovalStatus, TitleId, TitleRecord};

/// Whether a requested status change does anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed,
    Unchanged,
}

/// The single place approval edges are decided.
pub fn validate_transition(
    id: &TitleId,
    from: ApprovalStatus,
    to: ApprovalStatus,
) -> Result<Transition, ReconcileError> {
    use ApprovalStatus::*;

    match (from, to) {
        (_, Pending) => Err(ReconcileError::InvalidTransition {
            id: id.clone(),
            from,
            to,
        }),
        (Approved, Approved) | (Rejected, Rejected) => Ok(Transition::Unchanged),
        (Pending | Rejected, Approved) | (Pending | Approved, Rejected) => Ok(Transition::Changed),
    }
}

/// One recorded approval decision. Never rewritten once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    pub sequence: u64,
    pub title_id: TitleId,
    pub from: ApprovalStatus,
    pub to: ApprovalStatus,
    pub actor: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

/// Append-only audit log of approval decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog {
    events: Vec<ApprovalEvent>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_sequence(&self) -> u64 {
        self.events.last().map_or(1, |event| event.sequence + 1)
    }

    fn append(
        &mut self,
        title_id: &TitleId,
        from: ApprovalStatus,
        to: ApprovalStatus,
        actor: &str,
        at: OffsetDateTime,
    ) -> &ApprovalEvent {
        let event = ApprovalEvent {
            sequence: self.next_sequence(),
            title_id: title_id.clone(),
            from,
            to,
            actor: actor.to_string(),
            at,
        };
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApprovalEvent> {
        self.events.iter()
    }

    /// Events for one title, oldest first.
    pub fn for_title<'a>(&'a self, id: &'a TitleId) -> impl Iterator<Item = &'a ApprovalEvent> {
        self.events.iter().filter(move |event| &event.title_id == id)
    }

    pub fn latest_for(&self, id: &TitleId) -> Option<&ApprovalEvent> {
        self.events.iter().rev().find(|event| &event.title_id == id)
    }
}

/// Result of an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    Recorded { event: ApprovalEvent },
    Unchanged { status: ApprovalStatus },
}

/// Move `record` to `to`, appending the decision to `log`.
///
/// Already being in `to` is a no-op and appends nothing.
pub fn apply_approval(
    record: &mut TitleRecord,
    log: &mut AuditLog,
    to: ApprovalStatus,
    actor: &str,
    at: OffsetDateTime,
) -> Result<ApprovalOutcome, ReconcileError> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(ReconcileError::MissingActor);
    }

    let from = record.status;
    match validate_transition(&record.id, from, to)? {
        Transition::Unchanged => Ok(ApprovalOutcome::Unchanged { status: from }),
        Transition::Changed => {
            record.status = to;
            record.last_modified = at;
            let event = log.append(&record.id, from, to, actor, at).clone();

            tracing::info!(
                title_id = %record.id,
                %from,
                %to,
                actor,
                sequence = event.sequence,
                "approval recorded"
            );
            Ok(ApprovalOutcome::Recorded { event })
        }
    }
}
