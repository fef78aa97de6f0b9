use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::approval::{self, ApprovalOutcome, AuditLog};
use super::error::ReconcileError;
use super::merge::{self, MergeReport, TitleSet};
use super::resolve::resolve_publication_date;
use crate::domain::{
    ApprovalStatus, DateOverride, Money, PlatformTitle, SalesRecord, TitleId, TitleRecord,
};

/// One row of an overrides import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideEntry {
    pub id: TitleId,
    pub date: Date,
    pub note: Option<String>,
}

/// Outcome of applying a batch of overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverrideImport {
    pub applied: usize,
    pub unchanged: usize,
    pub unknown: Vec<TitleId>,
}

/// Quantity and revenue summed over every sales record of a title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SalesTotals {
    pub quantity: u64,
    pub revenue: Money,
}

/// Everything the dashboard knows locally: reconciled titles, the approval
/// audit log and the most recent sales snapshot.
///
/// The store is a plain value. Callers own it and pass it by reference, so a
/// test can build as many isolated stores as it likes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleStore {
    #[serde(default)]
    titles: TitleSet,
    #[serde(default)]
    audit: AuditLog,
    #[serde(default)]
    sales: Vec<SalesRecord>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    last_refresh: Option<OffsetDateTime>,
}

impl TitleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self, id: &TitleId) -> Option<&TitleRecord> {
        self.titles.get(id)
    }

    /// All titles, ordered by id.
    pub fn titles(&self) -> impl Iterator<Item = &TitleRecord> {
        self.titles.values()
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn sales(&self) -> &[SalesRecord] {
        &self.sales
    }

    pub fn last_refresh(&self) -> Option<OffsetDateTime> {
        self.last_refresh
    }

    /// Effective publication date of a stored title.
    pub fn resolve_publication_date(&self, id: &TitleId) -> Result<Date, ReconcileError> {
        resolve_publication_date(self.get(id)?)
    }

    /// Merge a platform snapshot and replace the sales snapshot in one step.
    pub fn apply_refresh(
        &mut self,
        fetched: &[PlatformTitle],
        sales: Vec<SalesRecord>,
        now: OffsetDateTime,
    ) -> MergeReport {
        let report = self.merge_refresh(fetched, now);
        self.sales = sales;
        self.last_refresh = Some(now);
        report
    }

    /// Merge a platform snapshot into the held titles.
    pub fn merge_refresh(&mut self, fetched: &[PlatformTitle], now: OffsetDateTime) -> MergeReport {
        let (merged, report) = merge::merge_refresh(&self.titles, fetched, now);
        self.titles = merged;

        tracing::info!(
            added = report.added,
            updated = report.updated,
            reactivated = report.reactivated,
            deactivated = report.deactivated,
            unchanged = report.unchanged,
            "titles merged"
        );
        report
    }

    pub fn apply_approval(
        &mut self,
        id: &TitleId,
        to: ApprovalStatus,
        actor: &str,
        at: OffsetDateTime,
    ) -> Result<ApprovalOutcome, ReconcileError> {
        let record = self
            .titles
            .get_mut(id)
            .ok_or_else(|| ReconcileError::UnknownTitle(id.clone()))?;
        approval::apply_approval(record, &mut self.audit, to, actor, at)
    }

    /// Set or replace a title's override. Returns the updated record.
    pub fn set_override(
        &mut self,
        id: &TitleId,
        date: Date,
        note: Option<String>,
        actor: &str,
        at: OffsetDateTime,
    ) -> Result<&TitleRecord, ReconcileError> {
        self.write_override(id, date, note, actor, at)?;
        self.get(id)
    }

    /// Returns whether the stored override changed.
    fn write_override(
        &mut self,
        id: &TitleId,
        date: Date,
        note: Option<String>,
        actor: &str,
        at: OffsetDateTime,
    ) -> Result<bool, ReconcileError> {
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(ReconcileError::MissingActor);
        }

        let record = self.get_mut(id)?;
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let unchanged = record
            .date_override
            .as_ref()
            .is_some_and(|current| current.date == date && current.note == note);
        if unchanged {
            return Ok(false);
        }

        record.date_override = Some(DateOverride {
            date,
            note,
            set_by: actor.to_string(),
            set_at: at,
        });
        record.last_modified = at;
        tracing::info!(title_id = %id, %date, actor, "publication date override set");
        Ok(true)
    }

    /// Drop a title's override, falling back to the platform date.
    pub fn clear_override(
        &mut self,
        id: &TitleId,
        at: OffsetDateTime,
    ) -> Result<&TitleRecord, ReconcileError> {
        let record = self.get_mut(id)?;
        if record.date_override.take().is_some() {
            record.last_modified = at;
            tracing::info!(title_id = %id, "publication date override cleared");
        }
        Ok(record)
    }

    /// Apply a batch of overrides, skipping ids the store does not hold.
    pub fn import_overrides(
        &mut self,
        entries: &[OverrideEntry],
        actor: &str,
        at: OffsetDateTime,
    ) -> Result<OverrideImport, ReconcileError> {
        let mut outcome = OverrideImport::default();

        for entry in entries {
            if !self.titles.contains_key(&entry.id) {
                tracing::warn!(title_id = %entry.id, "override for unknown title skipped");
                outcome.unknown.push(entry.id.clone());
                continue;
            }

            if self.write_override(&entry.id, entry.date, entry.note.clone(), actor, at)? {
                outcome.applied += 1;
            } else {
                outcome.unchanged += 1;
            }
        }

        Ok(outcome)
    }

    /// Sales summed per title.
    pub fn sales_totals(&self) -> HashMap<&TitleId, SalesTotals> {
        let mut totals: HashMap<&TitleId, SalesTotals> = HashMap::new();
        for record in &self.sales {
            let entry = totals.entry(&record.title_id).or_default();
            entry.quantity += record.quantity;
            entry.revenue += record.revenue;
        }
        totals
    }

    /// Active, still-Pending titles whose effective date has arrived.
    pub fn ready_for_release(&self, today: Date) -> Vec<&TitleRecord> {
        self.titles
            .values()
            .filter(|title| title.active && title.status == ApprovalStatus::Pending)
            .filter(|title| matches!(resolve_publication_date(title), Ok(date) if date <= today))
            .collect()
    }

    fn get(&self, id: &TitleId) -> Result<&TitleRecord, ReconcileError> {
        self.titles
            .get(id)
            .ok_or_else(|| ReconcileError::UnknownTitle(id.clone()))
    }

    fn get_mut(&mut self, id: &TitleId) -> Result<&mut TitleRecord, ReconcileError> {
        self.titles
            .get_mut(id)
            .ok_or_else(|| ReconcileError::UnknownTitle(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SalesPeriod;
    use time::macros::{date, datetime};

    fn platform(id: &str, date: Option<&str>) -> PlatformTitle {
        PlatformTitle {
            id: id.into(),
            title: format!("Book {id}"),
            pub_date: date.map(str::to_string),
            collections: vec![],
        }
    }

    fn seeded() -> TitleStore {
        let mut store = TitleStore::new();
        store.merge_refresh(
            &[
                platform("9781234567890", Some("2025-04-09")),
                platform("9781234567891", Some("2025-03-07")),
                platform("9781234567893", None),
            ],
            datetime!(2025-03-01 0:00 UTC),
        );
        store
    }

    #[test]
    fn unknown_titles_are_reported() {
        let mut store = seeded();
        let missing = TitleId::new("000");
        let at = datetime!(2025-03-02 0:00 UTC);
        assert_eq!(
            store.apply_approval(&missing, ApprovalStatus::Approved, "alice", at),
            Err(ReconcileError::UnknownTitle(missing.clone()))
        );
        assert!(store.clear_override(&missing, at).is_err());
        assert!(store.resolve_publication_date(&missing).is_err());
    }

    #[test]
    fn override_round_trip_restores_platform_date() {
        let mut store = seeded();
        let id = TitleId::new("9781234567893");
        assert!(matches!(
            store.resolve_publication_date(&id),
            Err(ReconcileError::MissingDate { .. })
        ));

        let at = datetime!(2025-03-02 0:00 UTC);
        store
            .set_override(&id, date!(2025 - 05 - 01), Some(" printer delay ".into()), "alice", at)
            .unwrap();
        assert_eq!(store.resolve_publication_date(&id), Ok(date!(2025 - 05 - 01)));
        assert_eq!(
            store.title(&id).unwrap().date_override.as_ref().unwrap().note.as_deref(),
            Some("printer delay")
        );

        store.clear_override(&id, at).unwrap();
        assert!(store.resolve_publication_date(&id).is_err());
    }

    #[test]
    fn import_skips_unknown_and_counts_unchanged() {
        let mut store = seeded();
        let entries = vec![
            OverrideEntry {
                id: "9781234567890".into(),
                date: date!(2025 - 04 - 24),
                note: None,
            },
            OverrideEntry {
                id: "9999999999999".into(),
                date: date!(2025 - 04 - 24),
                note: None,
            },
        ];

        let first = store
            .import_overrides(&entries, "import", datetime!(2025-03-02 0:00 UTC))
            .unwrap();
        assert_eq!(first.applied, 1);
        assert_eq!(first.unknown, vec![TitleId::new("9999999999999")]);

        let second = store
            .import_overrides(&entries, "import", datetime!(2025-03-03 0:00 UTC))
            .unwrap();
        assert_eq!(second.applied, 0);
        assert_eq!(second.unchanged, 1);
    }

    #[test]
    fn ready_for_release_needs_pending_and_arrived_date() {
        let mut store = seeded();
        let today = date!(2025 - 03 - 10);
        let ready: Vec<_> = store.ready_for_release(today).iter().map(|t| t.id.clone()).collect();
        assert_eq!(ready, vec![TitleId::new("9781234567891")]);

        store
            .apply_approval(
                &"9781234567891".into(),
                ApprovalStatus::Approved,
                "alice",
                datetime!(2025-03-10 9:00 UTC),
            )
            .unwrap();
        assert!(store.ready_for_release(today).is_empty());
    }

    #[test]
    fn sales_totals_sum_per_title() {
        let mut store = seeded();
        let period = SalesPeriod::new(date!(2025 - 03 - 01), date!(2025 - 03 - 07));
        let id = TitleId::new("9781234567890");
        store.apply_refresh(
            &[platform("9781234567890", Some("2025-04-09"))],
            vec![
                SalesRecord {
                    title_id: id.clone(),
                    period,
                    quantity: 2,
                    revenue: Money::from_cents(3000),
                },
                SalesRecord {
                    title_id: id.clone(),
                    period,
                    quantity: 3,
                    revenue: Money::from_cents(4500),
                },
            ],
            datetime!(2025-03-08 0:00 UTC),
        );

        let totals = store.sales_totals();
        assert_eq!(totals[&id].quantity, 5);
        assert_eq!(totals[&id].revenue, Money::from_cents(7500));
        assert_eq!(store.last_refresh(), Some(datetime!(2025-03-08 0:00 UTC)));
    }

    #[test]
    fn snapshot_json_round_trips() {
        let mut store = seeded();
        store
            .apply_approval(
                &"9781234567890".into(),
                ApprovalStatus::Rejected,
                "bob",
                datetime!(2025-03-02 0:00 UTC),
            )
            .unwrap();

        let json = serde_json::to_string(&store).unwrap();
        let back: TitleStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }
}
