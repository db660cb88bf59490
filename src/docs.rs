use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::audit;
use crate::authz;
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::health::health,
        routes::delegation::list_delegation,
        routes::delegation::create_delegation,
        routes::delegation::revoke_delegation,
        routes::overrides::list_overrides,
        routes::overrides::create_override,
        routes::overrides::revoke_override,
        routes::members::get_member,
        routes::members::create_member,
        routes::members::update_member,
        routes::members::remove_member,
        routes::teams::list_teams,
        routes::teams::create_team,
        routes::teams::get_team,
        routes::teams::update_team,
        routes::positions::list_positions,
        routes::positions::create_position,
        routes::positions::list_position_permissions,
        routes::positions::attach_position_permission,
        routes::action_types::list_action_types,
        routes::action_types::create_action_type,
        routes::audit_log::list_audit_log,
        routes::wiki::list_articles,
        routes::wiki::create_article,
        routes::wiki::get_article,
        routes::wiki::update_article,
        routes::wiki::delete_article,
        routes::wiki::article_action,
        routes::summaries::create_summary,
        routes::summaries::list_summaries,
    ),
    components(
        schemas(
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::organization::Organization,
            models::team::Team,
            models::team::TeamCreateRequest,
            models::team::TeamUpdateRequest,
            models::team::TeamDetail,
            models::member::TeamMember,
            models::member::MemberView,
            models::member::MemberCreateRequest,
            models::member::MemberUpdateRequest,
            models::position::TeamPosition,
            models::position::PositionCreateRequest,
            models::position::PositionPermission,
            models::position::PositionPermissionRequest,
            models::action_type::ActionType,
            models::action_type::ActionTypeCreateRequest,
            models::overrides::Override,
            models::overrides::OverrideState,
            models::overrides::OverrideView,
            models::overrides::OverrideCreateRequest,
            models::wiki::WikiArticle,
            models::wiki::WikiStatus,
            models::wiki::ArticleCreateRequest,
            models::wiki::ArticleUpdateRequest,
            models::wiki::FeedbackRequest,
            models::wiki::WikiFeedback,
            models::summary::MeetingSummary,
            models::summary::SummaryCreateRequest,
            models::summary::SummaryRequestOptions,
            authz::Scope,
            authz::DelegablePermission,
            audit::AuditAction,
            audit::AuditSnapshot,
            audit::OverrideSnapshot,
            audit::PositionSnapshot,
            audit::MembershipSnapshot,
            audit::AuditEntry,
            routes::delegation::DelegationOverview,
            routes::delegation::DelegationRequest,
            routes::delegation::DelegationResult,
            routes::delegation::DelegationResponse,
            routes::overrides::OverrideWriteResponse,
            routes::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Delegation", description = "Delegable permissions and delegations"),
        (name = "Overrides", description = "Per-person permission overrides"),
        (name = "Members", description = "Team membership"),
        (name = "Teams", description = "Teams and hierarchy"),
        (name = "Positions", description = "Position templates and their grants"),
        (name = "Actions", description = "Action catalog"),
        (name = "Audit", description = "Permission audit trail"),
        (name = "Wiki", description = "Knowledge-base articles"),
        (name = "Communicator", description = "Meeting summaries"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
    let mut doc = serde_json::to_value(ApiDoc::openapi())?;

    ensure_security_components(&mut doc);
    ensure_servers(&mut doc, port);

    Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json = Arc::new(serde_json::to_value(&doc).expect("OpenAPI serialization must succeed"));

    let json_route = {
        let doc_json = Arc::clone(&doc_json);
        get(move || {
            let doc_json = Arc::clone(&doc_json);
            async move { Json((*doc_json).clone()) }
        })
    };

    Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn ensure_security_components(doc: &mut Value) {
    let components = doc
        .as_object_mut()
        .expect("OpenAPI root must be an object")
        .entry("components")
        .or_insert_with(|| json!({}));

    if let Some(components) = components.as_object_mut() {
        let schemes = components
            .entry("securitySchemes")
            .or_insert_with(|| json!({}));
        if let Some(schemes) = schemes.as_object_mut() {
            schemes.insert(
                "bearerAuth".to_string(),
                json!({
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT"
                }),
            );
        }
    }
}

fn ensure_servers(doc: &mut Value, port: u16) {
    if doc.get("servers").is_none() {
        doc["servers"] = json!([{ "url": format!("http://localhost:{}", port) }]);
    }
}
