pub mod approvals;
pub mod reports;
pub mod session;
pub mod titles;

use std::sync::Arc;

use preorder_kernel::ModuleRegistry;
use serde_json::{json, Value};

use crate::dashboard::Dashboard;

/// Register every dashboard module. Session state is core; the rest are
/// feature modules over the same dashboard.
pub fn register_all(registry: &mut ModuleRegistry, dashboard: Arc<Dashboard>) {
    registry.register_core(session::create_module(dashboard.clone()));
    registry.register_custom(titles::create_module(dashboard.clone()));
    registry.register_custom(approvals::create_module(dashboard.clone()));
    registry.register_custom(reports::create_module(dashboard));
}

/// OpenAPI operation answering JSON described by `schema`, plus the shared
/// error responses in `errors`.
pub(crate) fn json_operation(summary: &str, tag: &str, schema: Value, errors: &[(&str, &str)]) -> Value {
    let mut responses = json!({
        "200": {
            "description": "OK",
            "content": { "application/json": { "schema": schema } }
        }
    });
    for (status, description) in errors {
        responses[*status] = error_response(description);
    }
    json!({ "summary": summary, "tags": [tag], "responses": responses })
}

pub(crate) fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

pub(crate) fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

pub(crate) fn array_of(name: &str) -> Value {
    json!({ "type": "array", "items": schema_ref(name) })
}
