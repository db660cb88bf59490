use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::position::{
    DbPositionPermission, DbTeamPosition, PositionCreateRequest, PositionPermission,
    PositionPermissionRequest, TeamPosition,
};
use crate::utils::utc_now;

use super::members::ensure_position_in_org;

#[utoipa::path(
    get,
    path = "/api/positions",
    tag = "Positions",
    responses((status = 200, description = "Position templates", body = [TeamPosition])),
    security(("bearerAuth" = []))
)]
pub async fn list_positions(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<Vec<TeamPosition>>> {
    let rows = sqlx::query_as::<_, DbTeamPosition>(
        "SELECT id, organization_id, name, level, position_type, created_at, updated_at \
         FROM team_positions WHERE organization_id = ? ORDER BY level DESC, name",
    )
    .bind(caller.organization_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let positions: Vec<TeamPosition> = rows
        .into_iter()
        .map(TeamPosition::try_from)
        .collect::<Result<_, _>>()?;
    Ok(Json(positions))
}

#[utoipa::path(
    post,
    path = "/api/positions",
    tag = "Positions",
    request_body = PositionCreateRequest,
    responses((status = 201, description = "Position created", body = TeamPosition)),
    security(("bearerAuth" = []))
)]
pub async fn create_position(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<PositionCreateRequest>,
) -> AppResult<(StatusCode, Json<TeamPosition>)> {
    payload.validate()?;

    let now = utc_now();
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO team_positions (id, organization_id, name, level, position_type, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(caller.organization_id.to_string())
    .bind(&payload.name)
    .bind(payload.level)
    .bind(&payload.position_type)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let position = TeamPosition {
        id,
        organization_id: caller.organization_id,
        name: payload.name,
        level: payload.level,
        position_type: payload.position_type,
        created_at: now,
        updated_at: now,
    };

    Ok((StatusCode::CREATED, Json(position)))
}

#[utoipa::path(
    get,
    path = "/api/positions/{id}/permissions",
    tag = "Positions",
    params(("id" = Uuid, Path, description = "Position id")),
    responses(
        (status = 200, description = "Action grants attached to the position", body = [PositionPermission]),
        (status = 404, description = "Position not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_position_permissions(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<PositionPermission>>> {
    ensure_position_in_org(&state.pool, id, caller.organization_id).await?;

    let rows = sqlx::query_as::<_, DbPositionPermission>(
        "SELECT id, position_id, action_type_id, scope, can_delegate, created_at \
         FROM position_permissions WHERE position_id = ?",
    )
    .bind(id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let permissions: Vec<PositionPermission> = rows
        .into_iter()
        .map(PositionPermission::try_from)
        .collect::<Result<_, _>>()?;
    Ok(Json(permissions))
}

#[utoipa::path(
    post,
    path = "/api/positions/{id}/permissions",
    tag = "Positions",
    params(("id" = Uuid, Path, description = "Position id")),
    request_body = PositionPermissionRequest,
    responses(
        (status = 201, description = "Permission attached", body = PositionPermission),
        (status = 404, description = "Position or action type not found"),
        (status = 409, description = "Action already attached to the position"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn attach_position_permission(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<PositionPermissionRequest>,
) -> AppResult<(StatusCode, Json<PositionPermission>)> {
    ensure_position_in_org(&state.pool, id, caller.organization_id).await?;

    let action_exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM action_types WHERE id = ?")
        .bind(payload.action_type_id.to_string())
        .fetch_one(&state.pool)
        .await?;
    if action_exists == 0 {
        return Err(AppError::not_found("action type not found"));
    }

    let now = utc_now();
    let permission_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO position_permissions (id, position_id, action_type_id, scope, can_delegate, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(permission_id.to_string())
    .bind(id.to_string())
    .bind(payload.action_type_id.to_string())
    .bind(payload.scope.as_str())
    .bind(payload.can_delegate)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict("action already attached to this position")
        }
        _ => e.into(),
    })?;

    let permission = PositionPermission {
        id: permission_id,
        position_id: id,
        action_type_id: payload.action_type_id,
        scope: payload.scope,
        can_delegate: payload.can_delegate,
        created_at: now,
    };

    Ok((StatusCode::CREATED, Json(permission)))
}
