use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::action_type::{ActionType, ActionTypeCreateRequest, DbActionType};
use crate::utils::utc_now;

/// The seeded catalog of permission-checkable actions.
#[utoipa::path(
    get,
    path = "/api/action-types",
    tag = "Actions",
    responses((status = 200, description = "Action catalog", body = [ActionType])),
    security(("bearerAuth" = []))
)]
pub async fn list_action_types(
    State(state): State<AppState>,
    _caller: Caller,
) -> AppResult<Json<Vec<ActionType>>> {
    let rows = sqlx::query_as::<_, DbActionType>(
        "SELECT id, code, name, category, risk_level, created_at, updated_at FROM action_types ORDER BY code",
    )
    .fetch_all(&state.pool)
    .await?;

    let actions: Vec<ActionType> = rows
        .into_iter()
        .map(ActionType::try_from)
        .collect::<Result<_, _>>()?;
    Ok(Json(actions))
}

#[utoipa::path(
    post,
    path = "/api/action-types",
    tag = "Actions",
    request_body = ActionTypeCreateRequest,
    responses(
        (status = 201, description = "Action type created", body = ActionType),
        (status = 409, description = "Action code already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_action_type(
    State(state): State<AppState>,
    _caller: Caller,
    Json(payload): Json<ActionTypeCreateRequest>,
) -> AppResult<(StatusCode, Json<ActionType>)> {
    payload.validate()?;

    let now = utc_now();
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO action_types (id, code, name, category, risk_level, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(&payload.code)
    .bind(&payload.name)
    .bind(&payload.category)
    .bind(&payload.risk_level)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict("action code already exists")
        }
        _ => e.into(),
    })?;

    let action = ActionType {
        id,
        code: payload.code,
        name: payload.name,
        category: payload.category,
        risk_level: payload.risk_level,
        created_at: now,
        updated_at: now,
    };

    Ok((StatusCode::CREATED, Json(action)))
}
