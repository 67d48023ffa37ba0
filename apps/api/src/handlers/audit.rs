//! Read-only audit trail. There is no route that edits or removes entries.

use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{Json, Query};
use crate::handlers::page_limit;
use crate::state::AppState;
use dukan_core::AuditLog;

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    /// "invoice", "customer", "expense", "product", "settings"
    pub entity: Option<String>,
    /// With `entity`: the full history of one record, oldest first.
    pub entity_id: Option<String>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

/// `GET /audit-logs`
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    let audit = state.db.audit_logs();
    let logs = match (query.entity.as_deref(), query.entity_id.as_deref()) {
        (Some(entity), Some(id)) => audit.for_entity(entity, id).await?,
        (entity, _) => {
            audit
                .list(entity, page_limit(query.limit, 100, 1000), query.offset)
                .await?
        }
    };
    Ok(Json(logs))
}
