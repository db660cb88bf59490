use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{
    action_types, audit_log, auth, delegation, health, members, overrides, positions, summaries,
    teams, wiki,
};
use crate::summarizer::{self, Summarizer};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub summarizer: Arc<dyn Summarizer>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            summarizer,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let state = AppState::new(pool, jwt_config, summarizer::from_env());

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let delegation_routes = Router::new().route(
        "/",
        get(delegation::list_delegation)
            .post(delegation::create_delegation)
            .delete(delegation::revoke_delegation),
    );

    let override_routes = Router::new().route(
        "/",
        get(overrides::list_overrides)
            .post(overrides::create_override)
            .delete(overrides::revoke_override),
    );

    let member_routes = Router::new()
        .route("/", post(members::create_member))
        .route(
            "/:id",
            get(members::get_member)
                .put(members::update_member)
                .delete(members::remove_member),
        );

    let team_routes = Router::new()
        .route("/", get(teams::list_teams).post(teams::create_team))
        .route("/:id", get(teams::get_team).put(teams::update_team));

    let position_routes = Router::new()
        .route("/", get(positions::list_positions).post(positions::create_position))
        .route(
            "/:id/permissions",
            get(positions::list_position_permissions).post(positions::attach_position_permission),
        );

    let action_type_routes = Router::new().route(
        "/",
        get(action_types::list_action_types).post(action_types::create_action_type),
    );

    let wiki_routes = Router::new()
        .route("/", get(wiki::list_articles).post(wiki::create_article))
        .route(
            "/:slug",
            get(wiki::get_article)
                .put(wiki::update_article)
                .delete(wiki::delete_article)
                .post(wiki::article_action),
        );

    let summary_routes = Router::new().route(
        "/",
        get(summaries::list_summaries).post(summaries::create_summary),
    );

    let router = Router::new()
        .nest("/auth", auth_routes)
        .route("/api/health", get(health::health))
        .nest("/api/delegation", delegation_routes)
        .nest("/api/user-overrides", override_routes)
        .nest("/api/members", member_routes)
        .nest("/api/teams", team_routes)
        .nest("/api/positions", position_routes)
        .nest("/api/action-types", action_type_routes)
        .route("/api/audit-log", get(audit_log::list_audit_log))
        .nest("/api/wiki/articles", wiki_routes)
        .nest("/api/communicator/summaries", summary_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
