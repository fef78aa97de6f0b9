//! The dashboard service: a title store per mode, the upstream adapters for
//! the current mode, and every user-facing operation.
//!
//! Gateway calls never run while the store lock is held. A refresh fetches
//! everything first and only then merges, so a failed refresh leaves the
//! store exactly as it was.

pub mod error;
pub mod query;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use preorder_db::SnapshotFile;
use preorder_kernel::Settings;
use serde::Serialize;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;

use crate::domain::dates::{last_completed_week, trailing_window};
use crate::domain::{ApprovalStatus, SalesPeriod, TitleId};
use crate::gateway::issue_body::{self, ChecklistRow};
use crate::gateway::{with_timeout, ApprovalIssue, Backends, GatewayError, NewIssue};
use crate::reconcile::{
    ApprovalEvent, ApprovalOutcome, MergeReport, OverrideEntry, OverrideImport, ReconcileError,
    TitleStore,
};
use crate::report::{self, email, DashboardSummary, WeeklyReport};

pub use error::DashboardError;
pub use query::{DateFilter, SortKey, TitleQuery, TitleView};

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Tunables taken from settings.
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub recent_window_days: u32,
    pub sales_window_days: u32,
    pub gateway_timeout: Duration,
    pub approval_label: String,
}

impl DashboardOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            recent_window_days: settings.dashboard.recent_window_days,
            sales_window_days: settings.dashboard.sales_window_days,
            gateway_timeout: settings.gateway.timeout(),
            approval_label: settings.github.approval_label.clone(),
        }
    }
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Shown when the last refresh failed and the data on display is older
/// than the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleWarning {
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub failed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_success: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RefreshResult {
    Refreshed {
        report: MergeReport,
        sales_records: usize,
        period: SalesPeriod,
        #[serde(with = "time::serde::rfc3339")]
        refreshed_at: OffsetDateTime,
    },
    Stale {
        warning: StaleWarning,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub test_mode: bool,
    pub live_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_unavailable_reason: Option<String>,
    pub titles: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_refresh: Option<OffsetDateTime>,
    pub stale: Option<StaleWarning>,
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryView {
    #[serde(flatten)]
    pub summary: DashboardSummary,
    pub test_mode: bool,
    pub stale: Option<StaleWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: ApprovalIssue,
    pub checked: Vec<TitleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub title_id: TitleId,
    pub issue: u64,
    pub message: String,
}

/// What an approval sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub issues_checked: usize,
    pub approved: Vec<TitleId>,
    pub unchanged: usize,
    pub unknown: Vec<TitleId>,
    pub failed: Vec<SyncFailure>,
    pub comments_posted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailReceipt {
    pub subject: String,
    pub attachments: Vec<String>,
    pub test_mode: bool,
}

/// One mode's store, its stale flag and where it is saved.
struct ModeState {
    store: Mutex<TitleStore>,
    stale: Mutex<Option<StaleWarning>>,
    snapshot: Option<SnapshotFile>,
    staged: AtomicU64,
    written: Mutex<u64>,
}

/// An encoded store waiting to be written.
struct StagedSave {
    generation: u64,
    body: Vec<u8>,
}

impl ModeState {
    fn new(store: TitleStore) -> Self {
        Self {
            store: Mutex::new(store),
            stale: Mutex::new(None),
            snapshot: None,
            staged: AtomicU64::new(0),
            written: Mutex::new(0),
        }
    }

    fn restore(snapshot: SnapshotFile) -> anyhow::Result<Self> {
        let store: TitleStore = snapshot.load()?.unwrap_or_default();
        tracing::info!(
            path = %snapshot.path().display(),
            titles = store.len(),
            events = store.audit_log().len(),
            "title store restored"
        );
        Ok(Self {
            snapshot: Some(snapshot),
            ..Self::new(store)
        })
    }

    /// Encode `store` for writing. Call with the store lock held so
    /// generations follow mutation order.
    fn stage(&self, store: &TitleStore) -> Option<StagedSave> {
        let snapshot = self.snapshot.as_ref()?;
        match SnapshotFile::encode(store) {
            Ok(body) => Some(StagedSave {
                generation: self.staged.fetch_add(1, Ordering::SeqCst) + 1,
                body,
            }),
            Err(err) => {
                let error = format!("{err:#}");
                tracing::error!(%error, path = %snapshot.path().display(), "failed to encode title store");
                None
            }
        }
    }

    /// Write `staged` on the blocking pool unless a newer save already landed.
    async fn write(&self, staged: StagedSave) -> anyhow::Result<()> {
        let Some(snapshot) = self.snapshot.clone() else {
            return Ok(());
        };
        let mut written = self.written.lock().await;
        if staged.generation <= *written {
            return Ok(());
        }

        let StagedSave { generation, body } = staged;
        tokio::task::spawn_blocking(move || snapshot.save_encoded(&body))
            .await
            .context("snapshot writer stopped")??;
        *written = generation;
        Ok(())
    }

    /// Like `write`, but failures are logged and the in-memory store stays
    /// authoritative.
    async fn persist(&self, staged: Option<StagedSave>) {
        let Some(staged) = staged else {
            return;
        };
        if let Err(err) = self.write(staged).await {
            let error = format!("{err:#}");
            let path = self
                .snapshot
                .as_ref()
                .map(|snapshot| snapshot.path().display().to_string())
                .unwrap_or_default();
            tracing::error!(%error, %path, "failed to persist title store");
        }
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let staged = {
            let store = self.store.lock().await;
            self.stage(&store)
        };
        match staged {
            Some(staged) => self.write(staged).await,
            None => Ok(()),
        }
    }
}

/// Live and test mode each own a store; switching modes never touches the
/// other one.
pub struct Dashboard {
    live_state: ModeState,
    test_state: ModeState,
    fixture: Backends,
    live: Option<Backends>,
    live_unavailable_reason: Option<String>,
    test_mode: AtomicBool,
    options: DashboardOptions,
    clock: Clock,
}

impl Dashboard {
    /// A dashboard in test mode over `fixture`, with empty stores, no live
    /// backends and no persistence.
    pub fn new(fixture: Backends, options: DashboardOptions) -> Self {
        Self {
            live_state: ModeState::new(TitleStore::new()),
            test_state: ModeState::new(TitleStore::new()),
            fixture,
            live: None,
            live_unavailable_reason: Some("live backends were not configured".to_string()),
            test_mode: AtomicBool::new(true),
            options,
            clock: Arc::new(OffsetDateTime::now_utc),
        }
    }

    pub fn with_live(mut self, live: Backends) -> Self {
        self.live = Some(live);
        self.live_unavailable_reason = None;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Seed the store of the mode the dashboard is in now.
    pub fn with_store(self, store: TitleStore) -> Self {
        if self.is_test_mode() {
            Self {
                test_state: ModeState::new(store),
                ..self
            }
        } else {
            Self {
                live_state: ModeState::new(store),
                ..self
            }
        }
    }

    /// Persist the live store to `snapshot` after every mutation, starting
    /// from whatever it already holds.
    pub fn with_snapshot(self, snapshot: SnapshotFile) -> anyhow::Result<Self> {
        Ok(Self {
            live_state: ModeState::restore(snapshot)?,
            ..self
        })
    }

    /// Same as `with_snapshot`, for the test-mode store.
    pub fn with_test_snapshot(self, snapshot: SnapshotFile) -> anyhow::Result<Self> {
        Ok(Self {
            test_state: ModeState::restore(snapshot)?,
            ..self
        })
    }

    /// Switch modes before the dashboard is shared.
    pub fn with_test_mode(self, enabled: bool) -> Result<Self, DashboardError> {
        if !enabled {
            self.ensure_live()?;
        }
        self.test_mode.store(enabled, Ordering::SeqCst);
        Ok(self)
    }

    /// Everything wired from settings: fixtures anchored on today, live
    /// clients when their credentials are present, and one snapshot file
    /// per mode.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let today = OffsetDateTime::now_utc().date();
        let mut dashboard = Self::new(
            Backends::fixture(today),
            DashboardOptions::from_settings(settings),
        );

        match Backends::live(settings) {
            Ok(live) => dashboard = dashboard.with_live(live),
            Err(err) => {
                tracing::info!(reason = %err, "live backends unavailable; test mode only");
                dashboard.live_unavailable_reason = Some(err.to_string());
            }
        }

        if settings.storage.persist {
            let keep = settings.storage.keep_backups;
            dashboard = dashboard
                .with_snapshot(SnapshotFile::new(settings.storage.snapshot_path(), keep))
                .context("failed to restore the title store")?
                .with_test_snapshot(SnapshotFile::new(settings.storage.test_snapshot_path(), keep))
                .context("failed to restore the test-mode title store")?;
        }

        dashboard
            .with_test_mode(settings.dashboard.test_mode)
            .context("failed to select the dashboard mode")
    }

    pub fn now(&self) -> OffsetDateTime {
        (self.clock)()
    }

    pub fn today(&self) -> Date {
        self.now().date()
    }

    pub fn options(&self) -> &DashboardOptions {
        &self.options
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), DashboardError> {
        if self.live.is_some() {
            return Ok(());
        }
        Err(DashboardError::LiveModeUnavailable(
            self.live_unavailable_reason
                .clone()
                .unwrap_or_else(|| "live backends were not configured".to_string()),
        ))
    }

    /// Toggle test mode at runtime. Leaving test mode needs live backends.
    pub async fn set_test_mode(&self, enabled: bool) -> Result<SessionInfo, DashboardError> {
        if !enabled {
            self.ensure_live()?;
        }
        let previous = self.test_mode.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::info!(test_mode = enabled, "dashboard mode switched");
        }
        Ok(self.session().await)
    }

    /// Backends and store for the current mode, read once per operation.
    fn active(&self) -> (&Backends, &ModeState) {
        match (&self.live, self.is_test_mode()) {
            (Some(live), false) => (live, &self.live_state),
            _ => (&self.fixture, &self.test_state),
        }
    }

    fn state(&self) -> &ModeState {
        self.active().1
    }

    pub async fn session(&self) -> SessionInfo {
        let state = self.state();
        let (titles, last_refresh) = {
            let store = state.store.lock().await;
            (store.len(), store.last_refresh())
        };
        SessionInfo {
            test_mode: self.is_test_mode(),
            live_available: self.live.is_some(),
            live_unavailable_reason: self.live_unavailable_reason.clone(),
            titles,
            last_refresh,
            stale: state.stale.lock().await.clone(),
            persisted: state.snapshot.is_some(),
        }
    }

    /// Pull titles and sales from the catalog and merge them. Upstream
    /// failures become a stale warning; nothing local changes.
    pub async fn refresh(&self) -> RefreshResult {
        let (backends, state) = self.active();
        let catalog = backends.catalog.clone();
        let started = self.now();
        let period = trailing_window(started.date(), self.options.sales_window_days);
        let limit = self.options.gateway_timeout;

        let fetched = match with_timeout("catalog", limit, catalog.fetch_titles()).await {
            Ok(fetched) => fetched,
            Err(err) => return self.mark_stale(state, err).await,
        };
        let ids: Vec<TitleId> = fetched.iter().map(|title| title.id.clone()).collect();
        let sales = match with_timeout("catalog", limit, catalog.fetch_sales(&ids, period)).await {
            Ok(sales) => sales,
            Err(err) => return self.mark_stale(state, err).await,
        };

        let refreshed_at = self.now();
        let sales_records = sales.len();
        let (report, staged) = {
            let mut store = state.store.lock().await;
            let report = store.apply_refresh(&fetched, sales, refreshed_at);
            (report, state.stage(&store))
        };
        state.persist(staged).await;
        *state.stale.lock().await = None;

        tracing::info!(
            titles = fetched.len(),
            sales_records,
            test_mode = self.is_test_mode(),
            "refresh complete"
        );
        RefreshResult::Refreshed {
            report,
            sales_records,
            period,
            refreshed_at,
        }
    }

    async fn mark_stale(&self, state: &ModeState, err: GatewayError) -> RefreshResult {
        let last_success = state.store.lock().await.last_refresh();
        let warning = StaleWarning {
            message: format!("Showing data from the last successful refresh: {err}"),
            failed_at: self.now(),
            last_success,
        };
        tracing::warn!(error = %err, service = err.service(), "refresh failed; keeping local data");
        *state.stale.lock().await = Some(warning.clone());
        RefreshResult::Stale { warning }
    }

    /// Write both stores out now, e.g. on shutdown.
    pub async fn flush(&self) -> anyhow::Result<()> {
        self.live_state.flush().await?;
        self.test_state.flush().await
    }

    /// A copy of the current mode's store as it stands.
    pub async fn store_snapshot(&self) -> TitleStore {
        self.state().store.lock().await.clone()
    }

    pub async fn list_titles(&self, query: &TitleQuery) -> Vec<TitleView> {
        let store = self.state().store.lock().await;
        let totals = store.sales_totals();
        query::select_titles(
            store.titles(),
            &totals,
            query,
            self.today(),
            self.options.recent_window_days,
        )
    }

    pub async fn title(&self, id: &TitleId) -> Result<TitleView, DashboardError> {
        let store = self.state().store.lock().await;
        self.view(&store, id)
    }

    fn view(&self, store: &TitleStore, id: &TitleId) -> Result<TitleView, DashboardError> {
        let record = store
            .title(id)
            .ok_or_else(|| ReconcileError::UnknownTitle(id.clone()))?;
        let totals = store.sales_totals();
        Ok(TitleView::new(
            record,
            totals.get(id),
            self.today(),
            self.options.recent_window_days,
        ))
    }

    pub async fn publication_date(&self, id: &TitleId) -> Result<Date, DashboardError> {
        Ok(self.state().store.lock().await.resolve_publication_date(id)?)
    }

    pub async fn set_override(
        &self,
        id: &TitleId,
        date: Date,
        note: Option<String>,
        actor: &str,
    ) -> Result<TitleView, DashboardError> {
        let state = self.state();
        let (view, staged) = {
            let mut store = state.store.lock().await;
            store.set_override(id, date, note, actor, self.now())?;
            (self.view(&store, id)?, state.stage(&store))
        };
        state.persist(staged).await;
        Ok(view)
    }

    pub async fn clear_override(&self, id: &TitleId) -> Result<TitleView, DashboardError> {
        let state = self.state();
        let (view, staged) = {
            let mut store = state.store.lock().await;
            store.clear_override(id, self.now())?;
            (self.view(&store, id)?, state.stage(&store))
        };
        state.persist(staged).await;
        Ok(view)
    }

    pub async fn import_overrides(
        &self,
        entries: &[OverrideEntry],
        actor: &str,
    ) -> Result<OverrideImport, DashboardError> {
        let state = self.state();
        let (outcome, staged) = {
            let mut store = state.store.lock().await;
            let outcome = store.import_overrides(entries, actor, self.now())?;
            let staged = if outcome.applied > 0 {
                state.stage(&store)
            } else {
                None
            };
            (outcome, staged)
        };
        state.persist(staged).await;
        tracing::info!(
            applied = outcome.applied,
            unchanged = outcome.unchanged,
            unknown = outcome.unknown.len(),
            "overrides imported"
        );
        Ok(outcome)
    }

    pub async fn approve(
        &self,
        id: &TitleId,
        to: ApprovalStatus,
        actor: &str,
    ) -> Result<ApprovalOutcome, DashboardError> {
        let state = self.state();
        let (outcome, staged) = {
            let mut store = state.store.lock().await;
            let outcome = store.apply_approval(id, to, actor, self.now())?;
            let staged = match outcome {
                ApprovalOutcome::Recorded { .. } => state.stage(&store),
                _ => None,
            };
            (outcome, staged)
        };
        state.persist(staged).await;
        Ok(outcome)
    }

    /// Audit events, oldest first, optionally for one title.
    pub async fn audit_events(&self, title: Option<&TitleId>) -> Vec<ApprovalEvent> {
        let store = self.state().store.lock().await;
        match title {
            Some(id) => store.audit_log().for_title(id).cloned().collect(),
            None => store.audit_log().iter().cloned().collect(),
        }
    }

    pub async fn summary(&self) -> SummaryView {
        let state = self.state();
        let summary = {
            let store = state.store.lock().await;
            report::build_summary(&store, self.today(), self.options.recent_window_days)
        };
        SummaryView {
            summary,
            test_mode: self.is_test_mode(),
            stale: state.stale.lock().await.clone(),
        }
    }

    pub async fn titles_csv(&self) -> Result<String, DashboardError> {
        Ok(report::titles_csv(&*self.state().store.lock().await)?)
    }

    pub async fn overrides_csv(&self) -> Result<String, DashboardError> {
        Ok(report::overrides_csv(&*self.state().store.lock().await)?)
    }

    /// Sales for `period` (default: the last completed Sunday to Saturday
    /// week), fetched fresh from the catalog.
    pub async fn weekly_report(
        &self,
        period: Option<SalesPeriod>,
    ) -> Result<WeeklyReport, DashboardError> {
        let (backends, state) = self.active();
        let period = period.unwrap_or_else(|| last_completed_week(self.today()));
        let ids: Vec<TitleId> = {
            let store = state.store.lock().await;
            store.titles().map(|title| title.id.clone()).collect()
        };

        let catalog = backends.catalog.clone();
        let sales = with_timeout(
            "catalog",
            self.options.gateway_timeout,
            catalog.fetch_sales(&ids, period),
        )
        .await?;

        let store = state.store.lock().await;
        Ok(report::build_weekly_report(&store, &sales, period))
    }

    pub async fn approval_issues(&self) -> Result<Vec<IssueView>, DashboardError> {
        let tracker = self.active().0.tracker.clone();
        let issues = with_timeout("tracker", self.options.gateway_timeout, tracker.list_open_issues()).await?;
        Ok(issues
            .into_iter()
            .map(|issue| IssueView {
                checked: issue.checked_ids(),
                issue,
            })
            .collect())
    }

    /// Open a checklist issue listing every title ready for release.
    pub async fn create_approval_issue(&self) -> Result<ApprovalIssue, DashboardError> {
        let (backends, state) = self.active();
        let today = self.today();
        let rows: Vec<ChecklistRow> = {
            let store = state.store.lock().await;
            let totals = store.sales_totals();
            store
                .ready_for_release(today)
                .into_iter()
                .map(|title| ChecklistRow {
                    id: title.id.clone(),
                    title: title.title.clone(),
                    pub_date: crate::reconcile::resolve_publication_date(title).ok(),
                    quantity: totals.get(&title.id).map_or(0, |t| t.quantity),
                })
                .collect()
        };

        if rows.is_empty() {
            return Err(DashboardError::InvalidInput(
                "no titles are ready for release".to_string(),
            ));
        }

        let issue = NewIssue {
            title: issue_body::issue_title(today),
            body: issue_body::render_checklist(&rows),
            labels: vec![self.options.approval_label.clone()],
        };
        let tracker = backends.tracker.clone();
        let created = with_timeout("tracker", self.options.gateway_timeout, tracker.create_issue(&issue)).await?;

        tracing::info!(number = created.number, titles = rows.len(), "approval issue created");
        Ok(created)
    }

    /// Record every ticked ISBN in the open approval issues as Approved, by
    /// actor `github#<issue>`, then comment on the issues that changed
    /// something.
    pub async fn sync_approvals(&self) -> Result<SyncReport, DashboardError> {
        let (backends, state) = self.active();
        let tracker = backends.tracker.clone();
        let limit = self.options.gateway_timeout;
        let issues = with_timeout("tracker", limit, tracker.list_open_issues()).await?;

        let mut report = SyncReport {
            issues_checked: issues.len(),
            ..SyncReport::default()
        };
        let mut to_comment: Vec<(u64, Vec<TitleId>)> = Vec::new();

        let staged = {
            let mut store = state.store.lock().await;
            let now = self.now();
            for issue in &issues {
                let actor = format!("github#{}", issue.number);
                let mut recorded = Vec::new();

                for id in issue.checked_ids() {
                    match store.apply_approval(&id, ApprovalStatus::Approved, &actor, now) {
                        Ok(ApprovalOutcome::Recorded { .. }) => recorded.push(id),
                        Ok(ApprovalOutcome::Unchanged { .. }) => report.unchanged += 1,
                        Err(ReconcileError::UnknownTitle(id)) => {
                            if !report.unknown.contains(&id) {
                                report.unknown.push(id);
                            }
                        }
                        Err(err) => report.failed.push(SyncFailure {
                            title_id: id,
                            issue: issue.number,
                            message: err.to_string(),
                        }),
                    }
                }

                if !recorded.is_empty() {
                    report.approved.extend(recorded.iter().cloned());
                    to_comment.push((issue.number, recorded));
                }
            }
            if report.approved.is_empty() {
                None
            } else {
                state.stage(&store)
            }
        };
        state.persist(staged).await;

        for (number, ids) in to_comment {
            let list: Vec<String> = ids.iter().map(|id| format!("- {id}")).collect();
            let body = format!(
                "Recorded approval for {} title(s):\n{}",
                ids.len(),
                list.join("\n")
            );
            match with_timeout("tracker", limit, tracker.comment(number, &body)).await {
                Ok(()) => report.comments_posted += 1,
                Err(err) => {
                    tracing::warn!(issue = number, error = %err, "failed to comment on approval issue");
                }
            }
        }

        tracing::info!(
            issues = report.issues_checked,
            approved = report.approved.len(),
            unchanged = report.unchanged,
            unknown = report.unknown.len(),
            "approvals synced"
        );
        Ok(report)
    }

    pub async fn email_summary(&self) -> Result<EmailReceipt, DashboardError> {
        let (summary, csv) = {
            let store = self.state().store.lock().await;
            (
                report::build_summary(&store, self.today(), self.options.recent_window_days),
                report::titles_csv(&store)?,
            )
        };
        self.send(email::summary_email(&summary, csv)).await
    }

    pub async fn email_weekly(
        &self,
        period: Option<SalesPeriod>,
    ) -> Result<EmailReceipt, DashboardError> {
        let weekly = self.weekly_report(period).await?;
        let csv = weekly.to_csv()?;
        self.send(email::weekly_email(&weekly, csv)).await
    }

    async fn send(&self, message: crate::gateway::EmailMessage) -> Result<EmailReceipt, DashboardError> {
        let mailer = self.active().0.mailer.clone();
        with_timeout("mailer", self.options.gateway_timeout, mailer.send(&message)).await?;
        Ok(EmailReceipt {
            subject: message.subject,
            attachments: message
                .attachments
                .into_iter()
                .map(|attachment| attachment.filename)
                .collect(),
            test_mode: self.is_test_mode(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn dashboard() -> Dashboard {
        let now = datetime!(2025-03-10 9:00 UTC);
        Dashboard::new(Backends::fixture(now.date()), DashboardOptions::default())
            .with_clock(Arc::new(move || now))
    }

    #[tokio::test]
    async fn refresh_loads_the_fixture_catalog() {
        let dashboard = dashboard();
        let result = dashboard.refresh().await;

        let RefreshResult::Refreshed { report, sales_records, .. } = result else {
            panic!("expected a successful refresh");
        };
        assert_eq!(report.added, 5);
        assert_eq!(sales_records, 5);
        assert_eq!(dashboard.session().await.titles, 5);
    }

    #[tokio::test]
    async fn older_staged_save_never_overwrites_a_newer_one() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("state.json"), 0);
        let state = ModeState::restore(file.clone()).unwrap();
        let now = datetime!(2025-03-10 9:00 UTC);

        let (older, newer) = {
            let mut store = state.store.lock().await;
            let older = state.stage(&store).unwrap();
            store.merge_refresh(
                &[crate::domain::PlatformTitle {
                    id: TitleId::new("9781234567890"),
                    title: "Future Release Book".into(),
                    pub_date: None,
                    collections: Vec::new(),
                }],
                now,
            );
            (older, state.stage(&store).unwrap())
        };
        assert!(older.generation < newer.generation);

        state.write(newer).await.unwrap();
        state.write(older).await.unwrap();

        let saved: TitleStore = file.load().unwrap().unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn leaving_test_mode_needs_live_backends() {
        let dashboard = dashboard();
        let err = dashboard.set_test_mode(false).await.unwrap_err();
        assert!(matches!(err, DashboardError::LiveModeUnavailable(_)));
        assert!(dashboard.is_test_mode());
    }

    #[tokio::test]
    async fn sync_approves_ticked_titles_and_comments_once() {
        let dashboard = dashboard();
        dashboard.refresh().await;

        let first = dashboard.sync_approvals().await.unwrap();
        assert_eq!(first.approved, vec![TitleId::new("9781234567891")]);
        assert_eq!(first.comments_posted, 1);

        let events = dashboard.audit_events(None).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "github#123");

        let second = dashboard.sync_approvals().await.unwrap();
        assert!(second.approved.is_empty());
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.comments_posted, 0);
    }

    #[tokio::test]
    async fn approval_issue_lists_ready_titles() {
        let dashboard = dashboard();
        dashboard.refresh().await;

        let issue = dashboard.create_approval_issue().await.unwrap();
        assert_eq!(issue.number, 124);
        assert!(issue.body.contains("| [ ] | 9781234567891 |"));
        assert!(issue.body.contains("| [ ] | 9781234567892 |"));
        assert!(!issue.body.contains("9781234567890"));
    }

    #[tokio::test]
    async fn weekly_report_defaults_to_last_completed_week() {
        let dashboard = dashboard();
        dashboard.refresh().await;

        let weekly = dashboard.weekly_report(None).await.unwrap();
        assert_eq!(
            weekly.period,
            SalesPeriod::new(date!(2025 - 03 - 02), date!(2025 - 03 - 08))
        );
        assert_eq!(weekly.unique_titles, 5);
        assert_eq!(weekly.total_quantity, 22);
    }
}
