//! Team membership: assignment, position changes, soft removal.
//!
//! A position change is recorded as one `modify` audit row carrying old/new
//! position ids and permission counts. It is a notification of scope change,
//! not a permission recomputation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::audit::{self, AuditAction, AuditSnapshot, NewAuditEntry, PositionSnapshot};
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::member::{
    DbMemberView, DbTeamMember, MemberCreateRequest, MemberUpdateRequest, MemberView, TeamMember,
};
use crate::utils::utc_now;

use super::auth::fetch_user_by_id;

const MEMBER_COLUMNS: &str = "m.id, m.team_id, m.person_id, m.position_id, m.member_role, \
     m.employment_type, m.allocation, m.reports_to_member_id, m.is_active, m.start_date, \
     m.end_date, m.created_at, m.updated_at";

#[utoipa::path(
    get,
    path = "/api/members/{id}",
    tag = "Members",
    params(("id" = Uuid, Path, description = "Member id")),
    responses(
        (status = 200, description = "Member detail", body = MemberView),
        (status = 404, description = "Member not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_member(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MemberView>> {
    let view = fetch_member_view(&state.pool, id, caller.organization_id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/api/members",
    tag = "Members",
    request_body = MemberCreateRequest,
    responses(
        (status = 201, description = "Member assigned", body = MemberView),
        (status = 404, description = "Team, person or position not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_member(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<MemberCreateRequest>,
) -> AppResult<(StatusCode, Json<MemberView>)> {
    payload.validate()?;

    ensure_team_in_org(&state.pool, payload.team_id, caller.organization_id).await?;
    fetch_user_by_id(&state.pool, payload.person_id, caller.organization_id).await?;
    ensure_position_in_org(&state.pool, payload.position_id, caller.organization_id).await?;

    if let Some(reports_to) = payload.reports_to_member_id {
        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM team_members WHERE id = ? AND team_id = ?",
        )
        .bind(reports_to.to_string())
        .bind(payload.team_id.to_string())
        .fetch_one(&state.pool)
        .await?;
        if exists == 0 {
            return Err(AppError::not_found("reports-to member not found in team"));
        }
    }

    let now = utc_now();
    let id = Uuid::new_v4();
    let start_date = payload.start_date.unwrap_or(now);

    sqlx::query(
        "INSERT INTO team_members \
         (id, team_id, person_id, position_id, member_role, employment_type, allocation, reports_to_member_id, is_active, start_date, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(payload.team_id.to_string())
    .bind(payload.person_id.to_string())
    .bind(payload.position_id.to_string())
    .bind(&payload.member_role)
    .bind(&payload.employment_type)
    .bind(payload.allocation)
    .bind(payload.reports_to_member_id.map(|v| v.to_string()))
    .bind(start_date)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let view = fetch_member_view(&state.pool, id, caller.organization_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
    put,
    path = "/api/members/{id}",
    tag = "Members",
    params(("id" = Uuid, Path, description = "Member id")),
    request_body = MemberUpdateRequest,
    responses(
        (status = 200, description = "Member updated", body = MemberView),
        (status = 404, description = "Member not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_member(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<MemberUpdateRequest>,
) -> AppResult<Json<MemberView>> {
    payload.validate()?;

    let mut member = fetch_member(&state.pool, id, caller.organization_id).await?;
    let old_position_id = member.position_id;

    if let Some(position_id) = payload.position_id {
        ensure_position_in_org(&state.pool, position_id, caller.organization_id).await?;
        member.position_id = position_id;
    }
    if let Some(member_role) = payload.member_role {
        member.member_role = member_role;
    }
    if let Some(employment_type) = payload.employment_type {
        member.employment_type = employment_type;
    }
    if let Some(allocation) = payload.allocation {
        member.allocation = allocation;
    }
    if let Some(reports_to) = payload.reports_to_member_id {
        member.reports_to_member_id = Some(reports_to);
    }

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "UPDATE team_members SET position_id = ?, member_role = ?, employment_type = ?, allocation = ?, reports_to_member_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(member.position_id.to_string())
    .bind(&member.member_role)
    .bind(&member.employment_type)
    .bind(member.allocation)
    .bind(member.reports_to_member_id.map(|v| v.to_string()))
    .bind(now)
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    if member.position_id != old_position_id {
        let old_count = count_position_permissions(&mut tx, old_position_id).await?;
        let new_count = count_position_permissions(&mut tx, member.position_id).await?;

        audit::record(
            &mut tx,
            NewAuditEntry {
                organization_id: caller.organization_id,
                action: AuditAction::Modify,
                target_user_id: member.person_id,
                action_type_id: None,
                previous: Some(AuditSnapshot::Position(PositionSnapshot {
                    position_id: old_position_id,
                    permission_count: old_count,
                })),
                new: Some(AuditSnapshot::Position(PositionSnapshot {
                    position_id: member.position_id,
                    permission_count: new_count,
                })),
                performed_by: caller.person_id,
                reason: None,
            },
        )
        .await?;
    }

    tx.commit().await?;

    let view = fetch_member_view(&state.pool, id, caller.organization_id).await?;
    Ok(Json(view))
}

/// Soft removal: the row stays, is_active flips off and end_date is set.
/// Overrides granted to the person are deliberately left untouched.
#[utoipa::path(
    delete,
    path = "/api/members/{id}",
    tag = "Members",
    params(("id" = Uuid, Path, description = "Member id")),
    responses(
        (status = 204, description = "Member removed"),
        (status = 404, description = "Member not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let member = fetch_member(&state.pool, id, caller.organization_id).await?;

    if !member.is_active {
        // Already removed; nothing to change, nothing to audit.
        return Ok(StatusCode::NO_CONTENT);
    }

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE team_members SET is_active = 0, end_date = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    let mut removed = member.clone();
    removed.is_active = false;
    removed.end_date = Some(now);

    audit::record(
        &mut tx,
        NewAuditEntry {
            organization_id: caller.organization_id,
            action: AuditAction::Revoke,
            target_user_id: member.person_id,
            action_type_id: None,
            previous: Some((&member).into()),
            new: Some((&removed).into()),
            performed_by: caller.person_id,
            reason: None,
        },
    )
    .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// HELPERS
// =============================================================================

async fn fetch_member(pool: &SqlitePool, id: Uuid, organization_id: Uuid) -> AppResult<TeamMember> {
    sqlx::query_as::<_, DbTeamMember>(&format!(
        "SELECT {MEMBER_COLUMNS} FROM team_members m \
         INNER JOIN teams t ON t.id = m.team_id \
         WHERE m.id = ? AND t.organization_id = ?",
    ))
    .bind(id.to_string())
    .bind(organization_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("member not found"))?
    .try_into()
}

async fn fetch_member_view(pool: &SqlitePool, id: Uuid, organization_id: Uuid) -> AppResult<MemberView> {
    sqlx::query_as::<_, DbMemberView>(&format!(
        "SELECT {MEMBER_COLUMNS}, u.name AS person_name, u.email AS person_email, tp.name AS position_name \
         FROM team_members m \
         INNER JOIN teams t ON t.id = m.team_id \
         INNER JOIN users u ON u.id = m.person_id \
         INNER JOIN team_positions tp ON tp.id = m.position_id \
         WHERE m.id = ? AND t.organization_id = ?",
    ))
    .bind(id.to_string())
    .bind(organization_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("member not found"))?
    .try_into()
}

pub(crate) async fn ensure_team_in_org(pool: &SqlitePool, team_id: Uuid, organization_id: Uuid) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM teams WHERE id = ? AND organization_id = ? AND deleted_at IS NULL",
    )
    .bind(team_id.to_string())
    .bind(organization_id.to_string())
    .fetch_one(pool)
    .await?;

    if count == 0 {
        return Err(AppError::not_found("team not found"));
    }
    Ok(())
}

pub(crate) async fn ensure_position_in_org(
    pool: &SqlitePool,
    position_id: Uuid,
    organization_id: Uuid,
) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM team_positions WHERE id = ? AND organization_id = ?")
        .bind(position_id.to_string())
        .bind(organization_id.to_string())
        .fetch_one(pool)
        .await?;

    if count == 0 {
        return Err(AppError::not_found("position not found"));
    }
    Ok(())
}

async fn count_position_permissions(conn: &mut SqliteConnection, position_id: Uuid) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM position_permissions WHERE position_id = ?")
        .bind(position_id.to_string())
        .fetch_one(conn)
        .await?;
    Ok(count)
}
