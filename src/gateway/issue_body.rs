//! Markdown checklist carried in approval issues.
//!
//! Reviewers tick `[x]` in the first column; the ISBN sits in the second.

use once_cell::sync::Lazy;
use regex::Regex;
use time::{macros::format_description, Date};

use crate::domain::{dates::format_date, TitleId};

static CHECKED_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\|\s*\[x\]\s*\|\s*([0-9]+)").expect("checked-row pattern is valid")
});

/// One title offered for approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistRow {
    pub id: TitleId,
    pub title: String,
    pub pub_date: Option<Date>,
    pub quantity: u64,
}

/// Issue title for the checklist of the week starting on `week_of`.
pub fn issue_title(week_of: Date) -> String {
    let label = week_of
        .format(format_description!(
            "[month repr:long] [day padding:none], [year]"
        ))
        .unwrap_or_else(|_| format_date(week_of));
    format!("Preorder Approvals for Week of {label}")
}

pub fn render_checklist(rows: &[ChecklistRow]) -> String {
    let mut body = String::from(
        "The following preorder titles have reached their publication date.\n\
         Tick a box to approve the release.\n\n\
         | Approve | ISBN | Title | Pub Date | Quantity |\n\
         |---------|------|-------|----------|----------|\n",
    );

    for row in rows {
        let date = row.pub_date.map(format_date).unwrap_or_default();
        body.push_str(&format!(
            "| [ ] | {} | {} | {} | {} |\n",
            row.id,
            escape_cell(&row.title),
            date,
            row.quantity
        ));
    }

    if rows.is_empty() {
        body.push_str("\n_No titles are waiting for approval._\n");
    }
    body
}

/// Ids of ticked rows, in order of first appearance.
pub fn checked_ids(body: &str) -> Vec<TitleId> {
    let mut ids: Vec<TitleId> = Vec::new();
    for line in body.lines() {
        if let Some(captures) = CHECKED_ROW.captures(line) {
            let id = TitleId::new(&captures[1]);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn row(id: &str, title: &str) -> ChecklistRow {
        ChecklistRow {
            id: id.into(),
            title: title.into(),
            pub_date: Some(date!(2025 - 03 - 07)),
            quantity: 3,
        }
    }

    #[test]
    fn renders_one_unticked_row_per_title() {
        let body = render_checklist(&[row("9781234567891", "Recent Release Book")]);
        assert!(body.contains("| Approve | ISBN | Title | Pub Date | Quantity |"));
        assert!(body.contains("| [ ] | 9781234567891 | Recent Release Book | 2025-03-07 | 3 |"));
        assert!(checked_ids(&body).is_empty());
    }

    #[test]
    fn picks_up_ticked_rows_in_either_case() {
        let body = "| [x] | 9781234567891 | A | 2025-03-07 | 3 |\n\
                    | [ ] | 9781234567892 | B | 2025-03-07 | 1 |\n\
                    |[X]|9781234567893| C | | 2 |\n\
                    | [x] | 9781234567891 | A again | | |";
        assert_eq!(
            checked_ids(body),
            vec![TitleId::new("9781234567891"), TitleId::new("9781234567893")]
        );
    }

    #[test]
    fn pipes_in_titles_do_not_break_the_table() {
        let body = render_checklist(&[row("1", "Either | Or")]);
        assert!(body.contains("Either \\| Or"));
    }

    #[test]
    fn title_names_the_week() {
        assert_eq!(
            issue_title(date!(2025 - 03 - 10)),
            "Preorder Approvals for Week of March 10, 2025"
        );
    }
}
