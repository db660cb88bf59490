use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::organization::DbOrganization;
use crate::models::user::{AuthResponse, DbUser, LoginRequest, RegisterRequest, User};
use crate::utils::{hash_password, slugify, utc_now, verify_password};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 409, description = "Email or organization slug already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    payload.validate()?;
    ensure_email_available(&state.pool, &payload.email).await?;

    let organization_id = resolve_organization(&state.pool, &payload).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, organization_id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(organization_id.to_string())
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let db_user = fetch_user_by_id(&state.pool, user_id, organization_id).await?;
    let user: User = db_user.try_into()?;
    let token = state.jwt.encode(user.id, user.organization_id)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = sqlx::query_as::<_, DbUser>(
        "SELECT id, organization_id, name, email, password_hash, created_at, updated_at, deleted_at FROM users WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(&payload.email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    let password_ok = verify_password(&payload.password, &db_user.password_hash)?;
    if !password_ok {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.try_into()?;
    let token = state.jwt.encode(user.id, user.organization_id)?;

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, caller: Caller) -> AppResult<Json<User>> {
    let db_user = fetch_user_by_id(&state.pool, caller.person_id, caller.organization_id).await?;
    let user: User = db_user.try_into()?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged")),
    security(("bearerAuth" = []))
)]
pub async fn logout(_caller: Caller) -> AppResult<Json<MessageResponse>> {
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// Create a fresh organization or join an existing one.
async fn resolve_organization(pool: &SqlitePool, payload: &RegisterRequest) -> AppResult<Uuid> {
    if let Some(name) = payload.organization_name.as_deref() {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::bad_request("organization_name yields an empty slug"));
        }

        let now = utc_now();
        let organization_id = Uuid::new_v4();

        sqlx::query("INSERT INTO organizations (id, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(organization_id.to_string())
            .bind(name)
            .bind(&slug)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    AppError::conflict("organization slug already in use")
                }
                _ => e.into(),
            })?;

        return Ok(organization_id);
    }

    if let Some(organization_id) = payload.organization_id {
        let existing = sqlx::query_as::<_, DbOrganization>(
            "SELECT id, name, slug, created_at, updated_at FROM organizations WHERE id = ?",
        )
        .bind(organization_id.to_string())
        .fetch_optional(pool)
        .await?;

        return existing
            .map(|_| organization_id)
            .ok_or_else(|| AppError::not_found("organization not found"));
    }

    Err(AppError::bad_request(
        "either organization_name or organization_id is required",
    ))
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND deleted_at IS NULL")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

pub(crate) async fn fetch_user_by_id(
    pool: &SqlitePool,
    person_id: Uuid,
    organization_id: Uuid,
) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, organization_id, name, email, password_hash, created_at, updated_at, deleted_at FROM users WHERE id = ? AND organization_id = ? AND deleted_at IS NULL",
    )
    .bind(person_id.to_string())
    .bind(organization_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))
}
