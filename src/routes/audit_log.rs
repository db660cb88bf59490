use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{AuditEntry, DbAuditEntry};
use crate::errors::AppResult;
use crate::jwt::Caller;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct AuditListParams {
    pub target_user_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Read the append-only permission audit trail, newest first.
#[utoipa::path(
    get,
    path = "/api/audit-log",
    tag = "Audit",
    params(
        ("target_user_id" = Option<Uuid>, Query, description = "Restrict to one target person"),
        ("limit" = Option<i64>, Query, description = "Max rows, capped at 500"),
    ),
    responses((status = 200, description = "Audit entries", body = [AuditEntry])),
    security(("bearerAuth" = []))
)]
pub async fn list_audit_log(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<AuditListParams>,
) -> AppResult<Json<Vec<AuditEntry>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let rows: Vec<DbAuditEntry> = match params.target_user_id {
        Some(target) => {
            sqlx::query_as(
                "SELECT id, organization_id, action, target_user_id, action_type_id, previous_value, \
                 new_value, performed_by, performed_at, reason, prev_hash, hash \
                 FROM permission_audit_log \
                 WHERE organization_id = ? AND target_user_id = ? \
                 ORDER BY performed_at DESC, rowid DESC LIMIT ?",
            )
            .bind(caller.organization_id.to_string())
            .bind(target.to_string())
            .bind(limit)
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT id, organization_id, action, target_user_id, action_type_id, previous_value, \
                 new_value, performed_by, performed_at, reason, prev_hash, hash \
                 FROM permission_audit_log \
                 WHERE organization_id = ? \
                 ORDER BY performed_at DESC, rowid DESC LIMIT ?",
            )
            .bind(caller.organization_id.to_string())
            .bind(limit)
            .fetch_all(&state.pool)
            .await?
        }
    };

    let entries: Vec<AuditEntry> = rows
        .into_iter()
        .map(AuditEntry::try_from)
        .collect::<Result<_, _>>()?;
    Ok(Json(entries))
}
