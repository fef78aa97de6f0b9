//! Record types shared by the gateway, the reconciliation engine and the
//! report renderer.

pub mod dates;
pub mod money;
pub mod sales;
pub mod title;

pub use money::Money;
pub use sales::{SalesPeriod, SalesRecord};
pub use title::{ApprovalStatus, DateOverride, PlatformTitle, TitleId, TitleRecord};
