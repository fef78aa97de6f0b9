use thiserror::Error;

use crate::domain::{ApprovalStatus, TitleId};

/// Failures the reconciliation engine reports back to the user.
///
/// None of these are fatal; each is fixed by corrective input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("title {id} has no publication date; enter an override date")]
    MissingDate { id: TitleId },

    #[error("title {id} has an unreadable publication date '{raw}'; enter an override date")]
    MalformedDate { id: TitleId, raw: String },

    #[error("invalid approval change for {id}: {from} -> {to}")]
    InvalidTransition {
        id: TitleId,
        from: ApprovalStatus,
        to: ApprovalStatus,
    },

    #[error("unknown title {0}")]
    UnknownTitle(TitleId),

    #[error("an actor is required to record an approval decision")]
    MissingActor,
}
