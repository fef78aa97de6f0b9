//! Calendar helpers: `YYYY-MM-DD` parsing and the serde adapters used by the
//! record types.

use time::{macros::format_description, Date, Duration, Weekday};

use super::sales::SalesPeriod;

/// Parse a `YYYY-MM-DD` date, ignoring surrounding whitespace.
pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

/// The most recent Sunday-to-Saturday week that ended before `today`.
pub fn last_completed_week(today: Date) -> SalesPeriod {
    let days_since_sunday = i64::from(today.weekday().number_days_from_sunday());
    let last_saturday = today - Duration::days(days_since_sunday + 1);
    let last_sunday = last_saturday - Duration::days(6);
    debug_assert_eq!(last_sunday.weekday(), Weekday::Sunday);
    SalesPeriod::new(last_sunday, last_saturday)
}

/// The `days`-long window ending on (and including) `today`.
pub fn trailing_window(today: Date, days: u32) -> SalesPeriod {
    let span = i64::from(days.max(1)) - 1;
    SalesPeriod::new(today - Duration::days(span), today)
}

pub mod iso_date {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date '{raw}'")))
    }
}

pub mod iso_date_opt {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_some(&super::format_date(*date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Date>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_date(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid date '{raw}'"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_iso_dates_only() {
        assert_eq!(parse_date(" 2024-06-01 "), Some(date!(2024 - 06 - 01)));
        assert_eq!(parse_date("Coming Soon"), None);
        assert_eq!(parse_date("06/01/2024"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn formats_with_zero_padding() {
        assert_eq!(format_date(date!(2024 - 07 - 01)), "2024-07-01");
    }

    #[test]
    fn last_completed_week_runs_sunday_to_saturday() {
        // 2025-03-12 is a Wednesday.
        let week = last_completed_week(date!(2025 - 03 - 12));
        assert_eq!(week.start, date!(2025 - 03 - 02));
        assert_eq!(week.end, date!(2025 - 03 - 08));

        // On a Sunday the week that just ended is reported.
        let week = last_completed_week(date!(2025 - 03 - 09));
        assert_eq!(week.start, date!(2025 - 03 - 02));
        assert_eq!(week.end, date!(2025 - 03 - 08));
    }

    #[test]
    fn trailing_window_includes_today() {
        let window = trailing_window(date!(2025 - 03 - 30), 30);
        assert_eq!(window.start, date!(2025 - 03 - 01));
        assert_eq!(window.end, date!(2025 - 03 - 30));
    }
}
