//! Reconciliation engine: merges platform snapshots with local overrides,
//! resolves effective publication dates and runs the approval state machine.
//!
//! Nothing in here does I/O. Every operation takes its clock reading as an
//! argument.

pub mod approval;
pub mod error;
pub mod merge;
pub mod resolve;
pub mod store;

pub use approval::{validate_transition, ApprovalEvent, ApprovalOutcome, AuditLog, Transition};
pub use error::ReconcileError;
pub use merge::{merge_refresh, MergeReport, TitleSet};
pub use resolve::{resolve_publication_date, DateStatus};
pub use store::{OverrideEntry, OverrideImport, SalesTotals, TitleStore};
