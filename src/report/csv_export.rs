use crate::domain::dates::format_date;
use crate::reconcile::{SalesTotals, TitleStore};

use super::{finish, ReportError};

pub const TITLES_CSV_HEADER: [&str; 6] = [
    "identifier",
    "title",
    "effective_publication_date",
    "approval_status",
    "cumulative_quantity",
    "cumulative_revenue",
];

/// One row per title. A title whose date cannot be resolved gets an empty
/// date cell instead of failing the whole export.
pub fn titles_csv(store: &TitleStore) -> Result<String, ReportError> {
    let totals = store.sales_totals();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TITLES_CSV_HEADER)?;

    for title in store.titles() {
        let date = store
            .resolve_publication_date(&title.id)
            .map(format_date)
            .unwrap_or_default();
        let sold = totals.get(&title.id).copied().unwrap_or_default();

        writer.write_record([
            title.id.as_str(),
            title.title.as_str(),
            date.as_str(),
            title.status.as_str(),
            sold.quantity.to_string().as_str(),
            sold.revenue.to_string().as_str(),
        ])?;
    }

    finish(writer)
}

/// Totals across every title in the store.
pub fn grand_total(store: &TitleStore) -> SalesTotals {
    store
        .sales_totals()
        .into_values()
        .fold(SalesTotals::default(), |mut acc, totals| {
            acc.quantity += totals.quantity;
            acc.revenue += totals.revenue;
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Money, PlatformTitle, SalesPeriod, SalesRecord};
    use time::macros::{date, datetime};

    fn store() -> TitleStore {
        let mut store = TitleStore::new();
        let period = SalesPeriod::new(date!(2025 - 03 - 01), date!(2025 - 03 - 07));
        store.apply_refresh(
            &[
                PlatformTitle {
                    id: "9781234567890".into(),
                    title: "Book, With Comma".into(),
                    pub_date: Some("2025-04-09".into()),
                    collections: vec![],
                },
                PlatformTitle {
                    id: "9781234567894".into(),
                    title: "Malformed Date Book".into(),
                    pub_date: Some("Coming Soon".into()),
                    collections: vec![],
                },
            ],
            vec![SalesRecord {
                title_id: "9781234567890".into(),
                period,
                quantity: 5,
                revenue: Money::from_cents(12495),
            }],
            datetime!(2025-03-10 9:00 UTC),
        );
        store
    }

    #[test]
    fn exports_one_row_per_title_with_blank_unresolvable_dates() {
        let csv = titles_csv(&store()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "identifier,title,effective_publication_date,approval_status,cumulative_quantity,cumulative_revenue",
                "9781234567890,\"Book, With Comma\",2025-04-09,pending,5,124.95",
                "9781234567894,Malformed Date Book,,pending,0,0.00",
            ]
        );
    }

    #[test]
    fn grand_total_sums_all_titles() {
        let totals = grand_total(&store());
        assert_eq!(totals.quantity, 5);
        assert_eq!(totals.revenue, Money::from_cents(12495));
    }
}
