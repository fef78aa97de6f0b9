//! Preorder admin dashboard.
//!
//! Reconciles preorder titles fetched from the commerce platform with local
//! publication date overrides and approval decisions, and renders summaries,
//! CSV exports and weekly sales reports over an HTTP shell.

pub mod dashboard;
pub mod domain;
pub mod gateway;
pub mod modules;
pub mod reconcile;
pub mod report;

use std::sync::Arc;

use preorder_kernel::ModuleRegistry;

pub use dashboard::{Dashboard, DashboardError, DashboardOptions};

/// Registry with every dashboard module registered over `dashboard`.
pub fn build_registry(dashboard: Arc<Dashboard>) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, dashboard);
    registry
}
