use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::member::{DbMemberView, MemberView};
use crate::models::team::{DbTeam, Team, TeamCreateRequest, TeamDetail, TeamUpdateRequest};
use crate::utils::utc_now;

const TEAM_COLUMNS: &str =
    "id, organization_id, parent_team_id, name, code, description, created_at, updated_at, deleted_at";

#[utoipa::path(
    get,
    path = "/api/teams",
    tag = "Teams",
    responses((status = 200, description = "Teams in the caller's organization", body = [Team])),
    security(("bearerAuth" = []))
)]
pub async fn list_teams(State(state): State<AppState>, caller: Caller) -> AppResult<Json<Vec<Team>>> {
    let teams = sqlx::query_as::<_, DbTeam>(&format!(
        "SELECT {TEAM_COLUMNS} FROM teams WHERE organization_id = ? AND deleted_at IS NULL ORDER BY name",
    ))
    .bind(caller.organization_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let teams: Vec<Team> = teams.into_iter().map(Team::try_from).collect::<Result<_, _>>()?;
    Ok(Json(teams))
}

#[utoipa::path(
    post,
    path = "/api/teams",
    tag = "Teams",
    request_body = TeamCreateRequest,
    responses(
        (status = 201, description = "Team created", body = Team),
        (status = 409, description = "Team code already in use"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_team(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<TeamCreateRequest>,
) -> AppResult<(StatusCode, Json<Team>)> {
    payload.validate()?;

    if let Some(parent_id) = payload.parent_team_id {
        super::members::ensure_team_in_org(&state.pool, parent_id, caller.organization_id).await?;
    }

    let now = utc_now();
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO teams (id, organization_id, parent_team_id, name, code, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(caller.organization_id.to_string())
    .bind(payload.parent_team_id.map(|v| v.to_string()))
    .bind(&payload.name)
    .bind(&payload.code)
    .bind(&payload.description)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(conflict_on_duplicate_code)?;

    let team = fetch_team(&state.pool, id, caller.organization_id).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

/// Team detail with active members and direct child teams.
#[utoipa::path(
    get,
    path = "/api/teams/{id}",
    tag = "Teams",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Team with members and child teams", body = TeamDetail),
        (status = 404, description = "Team not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_team(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TeamDetail>> {
    let team = fetch_team(&state.pool, id, caller.organization_id).await?;

    let member_rows = sqlx::query_as::<_, DbMemberView>(
        "SELECT m.id, m.team_id, m.person_id, m.position_id, m.member_role, m.employment_type, \
         m.allocation, m.reports_to_member_id, m.is_active, m.start_date, m.end_date, m.created_at, \
         m.updated_at, u.name AS person_name, u.email AS person_email, tp.name AS position_name \
         FROM team_members m \
         INNER JOIN users u ON u.id = m.person_id \
         INNER JOIN team_positions tp ON tp.id = m.position_id \
         WHERE m.team_id = ? AND m.is_active = 1 \
         ORDER BY u.name",
    )
    .bind(id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let members: Vec<MemberView> = member_rows
        .into_iter()
        .map(MemberView::try_from)
        .collect::<Result<_, _>>()?;

    let child_rows = sqlx::query_as::<_, DbTeam>(&format!(
        "SELECT {TEAM_COLUMNS} FROM teams WHERE parent_team_id = ? AND deleted_at IS NULL ORDER BY name",
    ))
    .bind(id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let child_teams: Vec<Team> = child_rows.into_iter().map(Team::try_from).collect::<Result<_, _>>()?;

    Ok(Json(TeamDetail {
        team,
        members,
        child_teams,
    }))
}

#[utoipa::path(
    put,
    path = "/api/teams/{id}",
    tag = "Teams",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = TeamUpdateRequest,
    responses(
        (status = 200, description = "Team updated", body = Team),
        (status = 404, description = "Team not found"),
        (status = 409, description = "Team code already in use"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_team(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<TeamUpdateRequest>,
) -> AppResult<Json<Team>> {
    payload.validate()?;

    let mut team = fetch_team(&state.pool, id, caller.organization_id).await?;

    if let Some(name) = payload.name {
        team.name = name;
    }
    if let Some(code) = payload.code {
        team.code = code;
    }
    if payload.description.is_some() {
        team.description = payload.description;
    }
    if let Some(parent_id) = payload.parent_team_id {
        if parent_id == id {
            return Err(AppError::bad_request("a team cannot be its own parent"));
        }
        super::members::ensure_team_in_org(&state.pool, parent_id, caller.organization_id).await?;
        team.parent_team_id = Some(parent_id);
    }

    let now = utc_now();

    sqlx::query(
        "UPDATE teams SET name = ?, code = ?, description = ?, parent_team_id = ?, updated_at = ? WHERE id = ? AND organization_id = ?",
    )
    .bind(&team.name)
    .bind(&team.code)
    .bind(&team.description)
    .bind(team.parent_team_id.map(|v| v.to_string()))
    .bind(now)
    .bind(id.to_string())
    .bind(caller.organization_id.to_string())
    .execute(&state.pool)
    .await
    .map_err(conflict_on_duplicate_code)?;

    team.updated_at = now;
    Ok(Json(team))
}

async fn fetch_team(pool: &SqlitePool, id: Uuid, organization_id: Uuid) -> AppResult<Team> {
    sqlx::query_as::<_, DbTeam>(&format!(
        "SELECT {TEAM_COLUMNS} FROM teams WHERE id = ? AND organization_id = ? AND deleted_at IS NULL",
    ))
    .bind(id.to_string())
    .bind(organization_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("team not found"))?
    .try_into()
}

fn conflict_on_duplicate_code(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict("team code already in use")
        }
        _ => err.into(),
    }
}
