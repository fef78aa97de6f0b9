use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{PlatformTitle, TitleId, TitleRecord};

/// Reconciled titles keyed by id.
pub type TitleSet = BTreeMap<TitleId, TitleRecord>;

/// What a refresh changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub added: usize,
    pub updated: usize,
    pub reactivated: usize,
    pub deactivated: usize,
    pub unchanged: usize,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.added + self.updated + self.reactivated + self.deactivated > 0
    }
}

/// Fold a freshly fetched platform snapshot into the local titles.
///
/// Local overrides, approval status and creation time always survive. A
/// record is only touched (and its `last_modified` bumped) when a platform
/// field or its active flag actually changes, so merging the same snapshot
/// twice is a no-op the second time.
pub fn merge_refresh(
    existing: &TitleSet,
    fetched: &[PlatformTitle],
    now: OffsetDateTime,
) -> (TitleSet, MergeReport) {
    // Later duplicates win.
    let fetched: HashMap<&TitleId, &PlatformTitle> =
        fetched.iter().map(|title| (&title.id, title)).collect();

    let mut merged = TitleSet::new();
    let mut report = MergeReport::default();

    for (id, record) in existing {
        let mut next = record.clone();
        match fetched.get(id) {
            Some(platform) => {
                let reactivated = !next.active;
                let fields_changed = next.title != platform.title
                    || next.platform_pub_date != platform.pub_date;

                if reactivated || fields_changed {
                    next.title = platform.title.clone();
                    next.platform_pub_date = platform.pub_date.clone();
                    next.active = true;
                    next.last_modified = now;
                }

                if reactivated {
                    report.reactivated += 1;
                } else if fields_changed {
                    report.updated += 1;
                } else {
                    report.unchanged += 1;
                }
            }
            None if next.active => {
                next.active = false;
                next.last_modified = now;
                report.deactivated += 1;
            }
            None => report.unchanged += 1,
        }
        merged.insert(id.clone(), next);
    }

    for (id, platform) in fetched {
        if !merged.contains_key(id) {
            merged.insert(id.clone(), TitleRecord::from_platform(platform, now));
            report.added += 1;
        }
    }

    (merged, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ApprovalStatus;
    use time::macros::datetime;

    fn platform(id: &str, title: &str, date: Option<&str>) -> PlatformTitle {
        PlatformTitle {
            id: id.into(),
            title: title.into(),
            pub_date: date.map(str::to_string),
            collections: vec!["Preorder".into()],
        }
    }

    #[test]
    fn local_only_titles_are_deactivated_not_dropped() {
        let t0 = datetime!(2024-05-01 0:00 UTC);
        let (local, _) = merge_refresh(
            &TitleSet::new(),
            &[platform("1", "Gone Book", Some("2024-06-01"))],
            t0,
        );

        let t1 = datetime!(2024-05-02 0:00 UTC);
        let (merged, report) = merge_refresh(&local, &[], t1);

        let gone = &merged[&TitleId::new("1")];
        assert!(!gone.active);
        assert_eq!(gone.last_modified, t1);
        assert_eq!(report.deactivated, 1);
    }

    #[test]
    fn returning_titles_are_reactivated_with_history() {
        let t0 = datetime!(2024-05-01 0:00 UTC);
        let (mut local, _) =
            merge_refresh(&TitleSet::new(), &[platform("1", "Book", None)], t0);
        local.get_mut(&TitleId::new("1")).unwrap().status = ApprovalStatus::Rejected;

        let (gone, _) = merge_refresh(&local, &[], t0);
        let (back, report) = merge_refresh(&gone, &[platform("1", "Book", None)], t0);

        let record = &back[&TitleId::new("1")];
        assert!(record.active);
        assert_eq!(record.status, ApprovalStatus::Rejected);
        assert_eq!(report.reactivated, 1);
    }

    #[test]
    fn duplicate_fetched_ids_keep_the_last_one() {
        let (merged, report) = merge_refresh(
            &TitleSet::new(),
            &[
                platform("1", "First", Some("2024-06-01")),
                platform("1", "Second", Some("2024-07-01")),
            ],
            datetime!(2024-05-01 0:00 UTC),
        );
        assert_eq!(report.added, 1);
        assert_eq!(merged[&TitleId::new("1")].title, "Second");
    }

    #[test]
    fn unchanged_snapshot_reports_no_change() {
        let t0 = datetime!(2024-05-01 0:00 UTC);
        let fetched = [platform("1", "Book", Some("2024-06-01"))];
        let (local, first) = merge_refresh(&TitleSet::new(), &fetched, t0);
        assert!(first.changed());

        let (again, second) = merge_refresh(&local, &fetched, datetime!(2024-05-09 0:00 UTC));
        assert!(!second.changed());
        assert_eq!(second.unchanged, 1);
        assert_eq!(again, local);
    }
}
