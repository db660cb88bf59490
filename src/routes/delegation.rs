//! Delegation workflow: a permission holder grants a delegable action to
//! another person.
//!
//! Authorization derives from the caller's active memberships: position
//! permissions flagged can_delegate form the delegable set. A request naming
//! any action outside that set fails closed before any write.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::audit::{self, AuditAction, NewAuditEntry};
use crate::authz::{count_active_positions, load_delegable_set, DelegablePermission, Scope};
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::overrides::{DbOverrideView, OverrideView};

use super::auth::fetch_user_by_id;
use super::overrides::{fetch_owned_active_override, revoke_override_row, upsert_override, OverrideUpsert};

// =============================================================================
// LIST
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct DelegationOverview {
    pub delegable_permissions: Vec<DelegablePermission>,
    /// Non-revoked overrides granted by the caller.
    pub active_delegations: Vec<OverrideView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// What the caller may delegate, and what they have already delegated.
#[utoipa::path(
    get,
    path = "/api/delegation",
    tag = "Delegation",
    responses((status = 200, description = "Delegable permissions and active delegations", body = DelegationOverview)),
    security(("bearerAuth" = []))
)]
pub async fn list_delegation(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<DelegationOverview>> {
    let delegable = load_delegable_set(&state.pool, caller.person_id).await?;

    let rows = sqlx::query_as::<_, DbOverrideView>(
        "SELECT o.id, o.organization_id, o.person_id, o.action_type_id, o.is_granted, o.scope, \
         o.team_id, o.expires_at, o.reason, o.granted_by, o.granted_at, o.revoked_at, o.revoked_by, \
         o.revoke_reason, at.code AS action_code, at.name AS action_name, u.name AS person_name \
         FROM user_permission_overrides o \
         INNER JOIN action_types at ON at.id = o.action_type_id \
         INNER JOIN users u ON u.id = o.person_id \
         WHERE o.granted_by = ? AND o.revoked_at IS NULL \
         ORDER BY o.granted_at DESC",
    )
    .bind(caller.person_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let active_delegations = rows
        .into_iter()
        .map(OverrideView::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let message = delegable.is_empty().then_some("no delegable permissions");

    Ok(Json(DelegationOverview {
        delegable_permissions: delegable.permissions().into_iter().cloned().collect(),
        active_delegations,
        message,
    }))
}

// =============================================================================
// CREATE (single or bulk)
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DelegationRequest {
    pub target_user_id: Uuid,
    /// Single-action form.
    pub action_type_id: Option<Uuid>,
    /// Bulk form; combined with `action_type_id` when both are present.
    pub action_type_ids: Option<Vec<Uuid>>,
    /// Defaults to the delegable permission's own scope, then to `team`.
    pub scope: Option<Scope>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DelegationResult {
    pub action_type_id: Uuid,
    /// "created" or "updated"
    pub status: &'static str,
    pub override_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DelegationResponse {
    pub target_user_id: Uuid,
    pub results: Vec<DelegationResult>,
}

/// Delegate one or more actions to a person. The whole batch is rejected when
/// any requested action is outside the caller's delegable set.
#[utoipa::path(
    post,
    path = "/api/delegation",
    tag = "Delegation",
    request_body = DelegationRequest,
    responses(
        (status = 201, description = "Delegations stored", body = DelegationResponse),
        (status = 403, description = "Caller lacks delegation rights; details list the unauthorized action ids"),
        (status = 404, description = "Target user not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_delegation(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<DelegationRequest>,
) -> AppResult<(StatusCode, Json<DelegationResponse>)> {
    payload.validate()?;

    let mut action_ids: Vec<Uuid> = Vec::new();
    if let Some(single) = payload.action_type_id {
        action_ids.push(single);
    }
    if let Some(bulk) = &payload.action_type_ids {
        for id in bulk {
            if !action_ids.contains(id) {
                action_ids.push(*id);
            }
        }
    }
    if action_ids.is_empty() {
        return Err(AppError::bad_request("at least one action_type_id is required"));
    }

    match fetch_user_by_id(&state.pool, payload.target_user_id, caller.organization_id).await {
        Ok(_) => {}
        Err(AppError::NotFound(_)) => return Err(AppError::not_found("target user not found")),
        Err(other) => return Err(other),
    }

    let memberships = count_active_positions(&state.pool, caller.person_id).await?;
    if memberships == 0 {
        return Err(AppError::forbidden("no positions with delegation rights"));
    }

    let delegable = load_delegable_set(&state.pool, caller.person_id).await?;
    let unauthorized: Vec<Uuid> = action_ids
        .iter()
        .copied()
        .filter(|action| !delegable.contains(*action))
        .collect();
    if !unauthorized.is_empty() {
        return Err(AppError::DelegationDenied(unauthorized));
    }

    let mut tx = state.pool.begin().await?;
    let mut results = Vec::with_capacity(action_ids.len());

    for action_type_id in action_ids {
        let scope = payload
            .scope
            .or_else(|| delegable.scope_for(action_type_id))
            .unwrap_or(Scope::Team);

        let (record, previous, outcome) = upsert_override(
            &mut tx,
            OverrideUpsert {
                organization_id: caller.organization_id,
                person_id: payload.target_user_id,
                action_type_id,
                is_granted: true,
                scope,
                team_id: None,
                expires_at: payload.expires_at,
                reason: payload.reason.clone(),
                granted_by: caller.person_id,
            },
        )
        .await?;

        audit::record(
            &mut tx,
            NewAuditEntry {
                organization_id: caller.organization_id,
                action: AuditAction::Delegate,
                target_user_id: payload.target_user_id,
                action_type_id: Some(action_type_id),
                previous: previous.as_ref().map(Into::into),
                new: Some((&record).into()),
                performed_by: caller.person_id,
                reason: payload.reason.clone(),
            },
        )
        .await?;

        results.push(DelegationResult {
            action_type_id,
            status: outcome.as_str(),
            override_id: record.id,
        });
    }

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(DelegationResponse {
            target_user_id: payload.target_user_id,
            results,
        }),
    ))
}

// =============================================================================
// REVOKE
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DelegationRevokeParams {
    pub id: Uuid,
    pub reason: Option<String>,
}

/// Revoke a delegation the caller granted. Non-owners get 404, not 403, so
/// the override's existence never leaks.
#[utoipa::path(
    delete,
    path = "/api/delegation",
    tag = "Delegation",
    params(
        ("id" = Uuid, Query, description = "Override id to revoke"),
        ("reason" = Option<String>, Query, description = "Revocation note"),
    ),
    responses(
        (status = 204, description = "Delegation revoked"),
        (status = 404, description = "Delegation not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_delegation(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<DelegationRevokeParams>,
) -> AppResult<StatusCode> {
    let mut tx = state.pool.begin().await?;

    let record = match fetch_owned_active_override(&mut tx, params.id, caller).await {
        Ok(record) => record,
        Err(AppError::NotFound(_)) => return Err(AppError::not_found("delegation not found")),
        Err(other) => return Err(other),
    };
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
