//! Raw permission-override administration: list, direct grant, revoke.
//!
//! The transactional upsert here is the single write path for overrides; the
//! delegation endpoint goes through it too, so the one-active-row-per
//! (person, action) invariant has exactly one enforcement point.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::audit::{self, AuditAction, NewAuditEntry};
use crate::authz::Scope;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::overrides::{
    DbOverride, DbOverrideView, Override, OverrideCreateRequest, OverrideView,
};
use crate::utils::utc_now;

use super::auth::fetch_user_by_id;

const OVERRIDE_COLUMNS: &str = "id, organization_id, person_id, action_type_id, is_granted, scope, \
     team_id, expires_at, reason, granted_by, granted_at, revoked_at, revoked_by, revoke_reason";

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OverrideListParams {
    pub person_id: Option<Uuid>,
}

/// List active overrides for one person or the caller's whole organization.
#[utoipa::path(
    get,
    path = "/api/user-overrides",
    tag = "Overrides",
    params(("person_id" = Option<Uuid>, Query, description = "Restrict to one person")),
    responses((status = 200, description = "Active overrides", body = [OverrideView])),
    security(("bearerAuth" = []))
)]
pub async fn list_overrides(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<OverrideListParams>,
) -> AppResult<Json<Vec<OverrideView>>> {
    let person_ids: Vec<String> = match params.person_id {
        Some(person_id) => {
            // Cross-tenant person ids surface as 404, same as every lookup.
            fetch_user_by_id(&state.pool, person_id, caller.organization_id).await?;
            vec![person_id.to_string()]
        }
        None => {
            sqlx::query_scalar("SELECT id FROM users WHERE organization_id = ? AND deleted_at IS NULL")
                .bind(caller.organization_id.to_string())
                .fetch_all(&state.pool)
                .await?
        }
    };

    if person_ids.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let mut builder = sqlx::QueryBuilder::new(
        "SELECT o.id, o.organization_id, o.person_id, o.action_type_id, o.is_granted, o.scope, \
         o.team_id, o.expires_at, o.reason, o.granted_by, o.granted_at, o.revoked_at, o.revoked_by, \
         o.revoke_reason, at.code AS action_code, at.name AS action_name, u.name AS person_name \
         FROM user_permission_overrides o \
         INNER JOIN action_types at ON at.id = o.action_type_id \
         INNER JOIN users u ON u.id = o.person_id \
         WHERE o.revoked_at IS NULL AND o.person_id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in &person_ids {
        separated.push_bind(id);
    }
    builder.push(") ORDER BY o.granted_at DESC");

    let rows: Vec<DbOverrideView> = builder.build_query_as().fetch_all(&state.pool).await?;

    // Expiry is evaluated here, after the query, not in the SQL predicate.
    let now = utc_now();
    let views = rows
        .into_iter()
        .map(OverrideView::try_from)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|view| view.record.is_active(now))
        .collect();

    Ok(Json(views))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OverrideWriteResponse {
    /// "created" or "updated"
    pub status: &'static str,
    #[serde(rename = "override")]
    pub record: Override,
}

/// Directly grant (or explicitly deny) an action for a person.
#[utoipa::path(
    post,
    path = "/api/user-overrides",
    tag = "Overrides",
    request_body = OverrideCreateRequest,
    responses(
        (status = 201, description = "Override stored", body = OverrideWriteResponse),
        (status = 404, description = "Person not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_override(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<OverrideCreateRequest>,
) -> AppResult<(StatusCode, Json<OverrideWriteResponse>)> {
    payload.validate()?;

    fetch_user_by_id(&state.pool, payload.person_id, caller.organization_id).await?;

    let mut tx = state.pool.begin().await?;

    let upsert = OverrideUpsert {
        organization_id: caller.organization_id,
        person_id: payload.person_id,
        action_type_id: payload.action_type_id,
        is_granted: payload.is_granted,
        scope: payload.scope.unwrap_or(Scope::Team),
        team_id: payload.team_id,
        expires_at: payload.expires_at,
        reason: payload.reason.clone(),
        granted_by: caller.person_id,
    };
    let (record, previous, outcome) = upsert_override(&mut tx, upsert).await?;

    audit::record(
        &mut tx,
        NewAuditEntry {
            organization_id: caller.organization_id,
            action: AuditAction::Grant,
            target_user_id: payload.person_id,
            action_type_id: Some(payload.action_type_id),
            previous: previous.as_ref().map(Into::into),
            new: Some((&record).into()),
            performed_by: caller.person_id,
            reason: payload.reason,
        },
    )
    .await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(OverrideWriteResponse {
            status: outcome.as_str(),
            record,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct OverrideRevokeParams {
    pub id: Uuid,
    pub reason: Option<String>,
}

/// Revoke an override the caller granted. Ownership failures are 404 so the
/// row's existence never leaks.
#[utoipa::path(
    delete,
    path = "/api/user-overrides",
    tag = "Overrides",
    params(
        ("id" = Uuid, Query, description = "Override id"),
        ("reason" = Option<String>, Query, description = "Revocation note"),
    ),
    responses(
        (status = 204, description = "Override revoked"),
        (status = 404, description = "Override not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_override(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<OverrideRevokeParams>,
) -> AppResult<StatusCode> {
    let mut tx = state.pool.begin().await?;

    let record = fetch_owned_active_override(&mut tx, params.id, caller).await?;
    revoke_override_row(&mut tx, &record, caller.person_id, params.reason.clone()).await?;

    audit::record(
        &mut tx,
        NewAuditEntry {
            organization_id: caller.organization_id,
            action: AuditAction::Revoke,
            target_user_id: record.person_id,
            action_type_id: Some(record.action_type_id),
            previous: Some((&record).into()),
            new: None,
            performed_by: caller.person_id,
            reason: params.reason,
        },
    )
    .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// WRITE PATH (shared with the delegation endpoint)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
        }
    }
}

#[derive(Debug)]
pub(crate) struct OverrideUpsert {
    pub organization_id: Uuid,
    pub person_id: Uuid,
    pub action_type_id: Uuid,
    pub is_granted: bool,
    pub scope: Scope,
    pub team_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub granted_by: Uuid,
}

/// Store an override for (person, action), keeping at most one non-revoked
/// row per pair. An active row is updated in place; a stale non-revoked row
/// (expired) is revoked before the fresh insert. Must run inside the caller's
/// transaction.
pub(crate) async fn upsert_override(
    conn: &mut SqliteConnection,
    input: OverrideUpsert,
) -> AppResult<(Override, Option<Override>, UpsertOutcome)> {
    let now = utc_now();

    let existing = sqlx::query_as::<_, DbOverride>(&format!(
        "SELECT {OVERRIDE_COLUMNS} FROM user_permission_overrides \
         WHERE person_id = ? AND action_type_id = ? AND revoked_at IS NULL",
    ))
    .bind(input.person_id.to_string())
    .bind(input.action_type_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    let previous: Option<Override> = existing.map(Override::try_from).transpose()?;

    if let Some(prior) = previous.as_ref().filter(|prior| prior.is_active(now)) {
        sqlx::query(
            "UPDATE user_permission_overrides \
             SET is_granted = ?, scope = ?, team_id = ?, expires_at = ?, reason = ?, granted_by = ?, granted_at = ? \
             WHERE id = ?",
        )
        .bind(input.is_granted)
        .bind(input.scope.as_str())
        .bind(input.team_id.map(|v| v.to_string()))
        .bind(input.expires_at)
        .bind(&input.reason)
        .bind(input.granted_by.to_string())
        .bind(now)
        .bind(prior.id.to_string())
        .execute(&mut *conn)
        .await?;

        let updated = fetch_override_by_id(&mut *conn, prior.id).await?;
        return Ok((updated, previous, UpsertOutcome::Updated));
    }

    if let Some(stale) = previous.as_ref() {
        // Non-revoked but expired: close it out so the invariant holds.
        revoke_override_row(&mut *conn, stale, input.granted_by, Some("superseded".to_string())).await?;
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO user_permission_overrides \
         (id, organization_id, person_id, action_type_id, is_granted, scope, team_id, expires_at, reason, granted_by, granted_at, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(input.organization_id.to_string())
    .bind(input.person_id.to_string())
    .bind(input.action_type_id.to_string())
    .bind(input.is_granted)
    .bind(input.scope.as_str())
    .bind(input.team_id.map(|v| v.to_string()))
    .bind(input.expires_at)
    .bind(&input.reason)
    .bind(input.granted_by.to_string())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let created = fetch_override_by_id(&mut *conn, id).await?;
    Ok((created, previous, UpsertOutcome::Created))
}

pub(crate) async fn revoke_override_row(
    conn: &mut SqliteConnection,
    record: &Override,
    revoked_by: Uuid,
    reason: Option<String>,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE user_permission_overrides SET revoked_at = ?, revoked_by = ?, revoke_reason = ? \
         WHERE id = ? AND revoked_at IS NULL",
    )
    .bind(utc_now())
    .bind(revoked_by.to_string())
    .bind(reason)
    .bind(record.id.to_string())
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_override_by_id(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> AppResult<Override> {
    sqlx::query_as::<_, DbOverride>(&format!(
        "SELECT {OVERRIDE_COLUMNS} FROM user_permission_overrides WHERE id = ?",
    ))
    .bind(id.to_string())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::not_found("override not found"))?
    .try_into()
}

/// Load a non-revoked override owned (granted) by the caller, 404 otherwise.
pub(crate) async fn fetch_owned_active_override(
    conn: &mut SqliteConnection,
    id: Uuid,
    caller: Caller,
) -> AppResult<Override> {
    sqlx::query_as::<_, DbOverride>(&format!(
        "SELECT {OVERRIDE_COLUMNS} FROM user_permission_overrides \
         WHERE id = ? AND organization_id = ? AND granted_by = ? AND revoked_at IS NULL",
    ))
    .bind(id.to_string())
    .bind(caller.organization_id.to_string())
    .bind(caller.person_id.to_string())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::not_found("override not found"))?
    .try_into()
}
