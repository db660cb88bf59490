#![allow(dead_code)]

use std::collections::HashMap;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use campus_core::create_app;

const BODY_LIMIT: usize = 10_485_760;

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

/// Fresh temp SQLite database, migrations applied, router built. Each caller
/// gets an isolated world.
pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
            .await?;
    migrator.run(&pool).await?;

    // tests run in CI/container; ensure a JWT secret is available for signing tokens
    std::env::set_var("JWT_SECRET", "test-secret");
    // keep the summarizer on the deterministic mock
    std::env::remove_var("GEMINI_API_KEY");

    let app = create_app(pool.clone()).await?;

    Ok(TestApp {
        app,
        pool,
        _dir: dir,
    })
}

/// Issue one request against the router and decode the JSON body (Null for
/// empty bodies).
pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body_json: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let req = match body_json {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
    };

    Ok((status, value))
}

pub fn field_str(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing field {field} in {value}"))
        .to_string()
}

pub fn field_uuid(value: &Value, field: &str) -> Uuid {
    Uuid::parse_str(&field_str(value, field)).expect("field is not a uuid")
}

pub async fn register_with_new_org(
    app: &Router,
    name: &str,
    email: &str,
    organization_name: &str,
) -> Result<(String, Uuid, Uuid)> {
    let (status, body) = request(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "name": name,
            "email": email,
            "password": "S3cureP@ssw0rd",
            "organization_name": organization_name,
        })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "register failed: {status} - {body}");

    let token = field_str(&body, "token");
    let user = body.get("user").context("missing user")?;
    Ok((token, field_uuid(user, "id"), field_uuid(user, "organization_id")))
}

pub async fn register_in_org(
    app: &Router,
    name: &str,
    email: &str,
    organization_id: Uuid,
) -> Result<(String, Uuid)> {
    let (status, body) = request(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "name": name,
            "email": email,
            "password": "S3cureP@ssw0rd",
            "organization_id": organization_id,
        })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "register failed: {status} - {body}");

    let token = field_str(&body, "token");
    let user = body.get("user").context("missing user")?;
    Ok((token, field_uuid(user, "id")))
}

/// A seeded school: a lead who can delegate scheduling and invoicing, and a
/// staff member who cannot delegate anything.
pub struct School {
    pub org_id: Uuid,
    pub team_id: Uuid,
    pub lead_token: String,
    pub lead_id: Uuid,
    pub lead_member_id: Uuid,
    pub lead_position_id: Uuid,
    pub staff_token: String,
    pub staff_id: Uuid,
    pub staff_member_id: Uuid,
    pub staff_position_id: Uuid,
    /// action code -> action type id, from the seeded catalog
    pub actions: HashMap<String, Uuid>,
}

pub async fn setup_school(app: &Router) -> Result<School> {
    let (lead_token, lead_id, org_id) =
        register_with_new_org(app, "Dana Whitfield", "dana@school.example", "Test School").await?;
    let (staff_token, staff_id) =
        register_in_org(app, "Sam Ortiz", "sam@school.example", org_id).await?;

    let (status, team) = request(
        app,
        "POST",
        "/api/teams",
        Some(&lead_token),
        Some(json!({"name": "Lower School Faculty", "code": "LSF"})),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "team create failed: {status} - {team}");
    let team_id = field_uuid(&team, "id");

    let lead_position_id = create_position(app, &lead_token, "Principal", 5).await?;
    let staff_position_id = create_position(app, &staff_token, "Teacher", 1).await?;

    let actions = fetch_actions(app, &lead_token).await?;

    attach_permission(app, &lead_token, lead_position_id, actions["schedule.edit"], "organization", true).await?;
    attach_permission(app, &lead_token, lead_position_id, actions["finance.invoice.issue"], "team", true).await?;
    attach_permission(app, &lead_token, lead_position_id, actions["member.manage"], "organization", false).await?;
    attach_permission(app, &staff_token, staff_position_id, actions["schedule.edit"], "own", false).await?;

    let lead_member_id = create_member(app, &lead_token, team_id, lead_id, lead_position_id, None).await?;
    let staff_member_id =
        create_member(app, &lead_token, team_id, staff_id, staff_position_id, Some(lead_member_id)).await?;

    Ok(School {
        org_id,
        team_id,
        lead_token,
        lead_id,
        lead_member_id,
        lead_position_id,
        staff_token,
        staff_id,
        staff_member_id,
        staff_position_id,
        actions,
    })
}

pub async fn create_position(app: &Router, token: &str, name: &str, level: i64) -> Result<Uuid> {
    let (status, body) = request(
        app,
        "POST",
        "/api/positions",
        Some(token),
        Some(json!({"name": name, "level": level, "position_type": "faculty"})),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "position create failed: {status} - {body}");
    Ok(field_uuid(&body, "id"))
}

pub async fn fetch_actions(app: &Router, token: &str) -> Result<HashMap<String, Uuid>> {
    let (status, body) = request(app, "GET", "/api/action-types", Some(token), None).await?;
    anyhow::ensure!(status == StatusCode::OK, "action list failed: {status} - {body}");

    let mut map = HashMap::new();
    for entry in body.as_array().context("actions not an array")? {
        map.insert(field_str(entry, "code"), field_uuid(entry, "id"));
    }
    Ok(map)
}

pub async fn attach_permission(
    app: &Router,
    token: &str,
    position_id: Uuid,
    action_type_id: Uuid,
    scope: &str,
    can_delegate: bool,
) -> Result<()> {
    let (status, body) = request(
        app,
        "POST",
        &format!("/api/positions/{position_id}/permissions"),
        Some(token),
        Some(json!({
            "action_type_id": action_type_id,
            "scope": scope,
            "can_delegate": can_delegate,
        })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "attach permission failed: {status} - {body}");
    Ok(())
}

pub async fn create_member(
    app: &Router,
    token: &str,
    team_id: Uuid,
    person_id: Uuid,
    position_id: Uuid,
    reports_to: Option<Uuid>,
) -> Result<Uuid> {
    let (status, body) = request(
        app,
        "POST",
        "/api/members",
        Some(token),
        Some(json!({
            "team_id": team_id,
            "person_id": person_id,
            "position_id": position_id,
            "member_role": "member",
            "employment_type": "full_time",
            "allocation": 1.0,
            "reports_to_member_id": reports_to,
        })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "member create failed: {status} - {body}");
    Ok(field_uuid(&body, "id"))
}

/// Count non-revoked override rows for a (person, action) pair straight from
/// the database.
pub async fn count_open_overrides(pool: &SqlitePool, person_id: Uuid, action_type_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM user_permission_overrides WHERE person_id = ? AND action_type_id = ? AND revoked_at IS NULL",
    )
    .bind(person_id.to_string())
    .bind(action_type_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count)
}
