use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{dates::format_date, Money, SalesPeriod, SalesRecord, TitleId};
use crate::reconcile::TitleStore;

use super::{finish, ReportError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyRow {
    pub id: TitleId,
    pub title: String,
    pub quantity: u64,
    pub revenue: Money,
}

/// Sales of one period, best sellers first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyReport {
    pub period: SalesPeriod,
    pub rows: Vec<WeeklyRow>,
    pub total_quantity: u64,
    pub total_revenue: Money,
    pub unique_titles: usize,
}

impl WeeklyReport {
    pub fn to_csv(&self) -> Result<String, ReportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["identifier", "title", "quantity", "revenue"])?;
        for row in &self.rows {
            writer.write_record([
                row.id.as_str(),
                row.title.as_str(),
                row.quantity.to_string().as_str(),
                row.revenue.to_string().as_str(),
            ])?;
        }
        finish(writer)
    }

    pub fn heading(&self) -> String {
        format!(
            "Preorder sales {} to {}",
            format_date(self.period.start),
            format_date(self.period.end)
        )
    }
}

/// Fold `sales` for `period` into per-title rows. Records from other periods
/// are ignored; titles the store does not know keep their id as a title.
pub fn build_weekly_report(
    store: &TitleStore,
    sales: &[SalesRecord],
    period: SalesPeriod,
) -> WeeklyReport {
    let mut per_title: BTreeMap<&TitleId, (u64, Money)> = BTreeMap::new();
    for record in sales.iter().filter(|record| record.period == period) {
        let entry = per_title.entry(&record.title_id).or_default();
        entry.0 += record.quantity;
        entry.1 += record.revenue;
    }

    let mut rows: Vec<WeeklyRow> = per_title
        .into_iter()
        .filter(|(_, (quantity, _))| *quantity > 0)
        .map(|(id, (quantity, revenue))| WeeklyRow {
            id: id.clone(),
            title: store
                .title(id)
                .map_or_else(|| id.to_string(), |title| title.title.clone()),
            quantity,
            revenue,
        })
        .collect();
    rows.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.id.cmp(&b.id)));

    WeeklyReport {
        period,
        total_quantity: rows.iter().map(|row| row.quantity).sum(),
        total_revenue: rows.iter().map(|row| row.revenue).sum(),
        unique_titles: rows.len(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlatformTitle;
    use time::macros::{date, datetime};

    fn sale(id: &str, period: SalesPeriod, quantity: u64, cents: i64) -> SalesRecord {
        SalesRecord {
            title_id: id.into(),
            period,
            quantity,
            revenue: Money::from_cents(cents),
        }
    }

    #[test]
    fn rows_are_sorted_by_quantity_and_totalled() {
        let week = SalesPeriod::new(date!(2025 - 03 - 02), date!(2025 - 03 - 08));
        let other = SalesPeriod::new(date!(2025 - 02 - 23), date!(2025 - 03 - 01));
        let mut store = TitleStore::new();
        store.merge_refresh(
            &[PlatformTitle {
                id: "9781234567892".into(),
                title: "Past Due Book".into(),
                pub_date: None,
                collections: vec![],
            }],
            datetime!(2025-03-09 0:00 UTC),
        );

        let report = build_weekly_report(
            &store,
            &[
                sale("9781234567891", week, 3, 5550),
                sale("9781234567892", week, 8, 23960),
                sale("9781234567892", other, 100, 1),
                sale("9781234567893", week, 0, 0),
            ],
            week,
        );

        let ids: Vec<&str> = report.rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["9781234567892", "9781234567891"]);
        assert_eq!(report.rows[0].title, "Past Due Book");
        assert_eq!(report.rows[1].title, "9781234567891");
        assert_eq!(report.total_quantity, 11);
        assert_eq!(report.total_revenue, Money::from_cents(29510));
        assert_eq!(report.unique_titles, 2);
        assert_eq!(report.heading(), "Preorder sales 2025-03-02 to 2025-03-08");

        let csv = report.to_csv().unwrap();
        assert!(csv.starts_with("identifier,title,quantity,revenue\n9781234567892,Past Due Book,8,239.60\n"));
    }
}
