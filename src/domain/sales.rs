use serde::{Deserialize, Serialize};
use time::Date;

use super::{money::Money, title::TitleId};

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPeriod {
    #[serde(with = "super::dates::iso_date")]
    pub start: Date,
    #[serde(with = "super::dates::iso_date")]
    pub end: Date,
}

impl SalesPeriod {
    /// Build a period, swapping the bounds if they arrive reversed.
    pub fn new(start: Date, end: Date) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn contains(&self, day: Date) -> bool {
        self.start <= day && day <= self.end
    }
}

/// Aggregated sales of one title over one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub title_id: TitleId,
    pub period: SalesPeriod,
    pub quantity: u64,
    pub revenue: Money,
}
