//! Wiki article CRUD and feedback.
//!
//! Lifecycle is draft -> active -> enshrined, one step at a time. Enshrined
//! articles are frozen: content edits are refused, only feedback still lands.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::wiki::{
    ArticleCreateRequest, ArticleUpdateRequest, DbWikiArticle, FeedbackRequest, WikiArticle,
    WikiFeedback, WikiStatus,
};
use crate::utils::{slugify, utc_now};

const ARTICLE_COLUMNS: &str = "id, organization_id, slug, title, content, status, author_id, \
     created_at, updated_at, deleted_at";

#[utoipa::path(
    get,
    path = "/api/wiki/articles",
    tag = "Wiki",
    responses((status = 200, description = "Articles in the caller's organization", body = [WikiArticle])),
    security(("bearerAuth" = []))
)]
pub async fn list_articles(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<Vec<WikiArticle>>> {
    let rows = sqlx::query_as::<_, DbWikiArticle>(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM wiki_articles WHERE organization_id = ? AND deleted_at IS NULL ORDER BY updated_at DESC",
    ))
    .bind(caller.organization_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let articles: Vec<WikiArticle> = rows
        .into_iter()
        .map(WikiArticle::try_from)
        .collect::<Result<_, _>>()?;
    Ok(Json(articles))
}

#[utoipa::path(
    post,
    path = "/api/wiki/articles",
    tag = "Wiki",
    request_body = ArticleCreateRequest,
    responses(
        (status = 201, description = "Article created as draft", body = WikiArticle),
        (status = 409, description = "Slug already in use"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_article(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<ArticleCreateRequest>,
) -> AppResult<(StatusCode, Json<WikiArticle>)> {
    payload.validate()?;

    let slug = payload.slug.clone().unwrap_or_else(|| slugify(&payload.title));
    if slug.is_empty() {
        return Err(AppError::bad_request("title yields an empty slug"));
    }

    let now = utc_now();
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO wiki_articles (id, organization_id, slug, title, content, status, author_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(caller.organization_id.to_string())
    .bind(&slug)
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(WikiStatus::Draft.as_str())
    .bind(caller.person_id.to_string())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict("article slug already in use")
        }
        _ => e.into(),
    })?;

    let article = fetch_article(&state.pool, &slug, caller.organization_id).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

#[utoipa::path(
    get,
    path = "/api/wiki/articles/{slug}",
    tag = "Wiki",
    params(("slug" = String, Path, description = "Article slug")),
    responses(
        (status = 200, description = "Article detail", body = WikiArticle),
        (status = 404, description = "Article not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_article(
    State(state): State<AppState>,
    caller: Caller,
    Path(slug): Path<String>,
) -> AppResult<Json<WikiArticle>> {
    let article = fetch_article(&state.pool, &slug, caller.organization_id).await?;
    Ok(Json(article))
}

#[utoipa::path(
    put,
    path = "/api/wiki/articles/{slug}",
    tag = "Wiki",
    params(("slug" = String, Path, description = "Article slug")),
    request_body = ArticleUpdateRequest,
    responses(
        (status = 200, description = "Article updated", body = WikiArticle),
        (status = 404, description = "Article not found"),
        (status = 409, description = "Invalid status transition or enshrined article"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_article(
    State(state): State<AppState>,
    caller: Caller,
    Path(slug): Path<String>,
    Json(payload): Json<ArticleUpdateRequest>,
) -> AppResult<Json<WikiArticle>> {
    payload.validate()?;

    let mut article = fetch_article(&state.pool, &slug, caller.organization_id).await?;

    let edits_content = payload.title.is_some() || payload.content.is_some();
    if article.status == WikiStatus::Enshrined && edits_content {
        return Err(AppError::conflict("enshrined articles are read-only"));
    }

    if let Some(next) = payload.status {
        if next != article.status {
            if !article.status.can_transition_to(next) {
                return Err(AppError::conflict(format!(
                    "cannot transition article from {} to {}",
                    article.status.as_str(),
                    next.as_str()
                )));
            }
            article.status = next;
        }
    }

    if let Some(title) = payload.title {
        article.title = title;
    }
    if let Some(content) = payload.content {
        article.content = content;
    }

    let now = utc_now();

    sqlx::query(
        "UPDATE wiki_articles SET title = ?, content = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&article.title)
    .bind(&article.content)
    .bind(article.status.as_str())
    .bind(now)
    .bind(article.id.to_string())
    .execute(&state.pool)
    .await?;

    article.updated_at = now;
    Ok(Json(article))
}

#[utoipa::path(
    delete,
    path = "/api/wiki/articles/{slug}",
    tag = "Wiki",
    params(("slug" = String, Path, description = "Article slug")),
    responses(
        (status = 204, description = "Article soft deleted"),
        (status = 404, description = "Article not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_article(
    State(state): State<AppState>,
    caller: Caller,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    let article = fetch_article(&state.pool, &slug, caller.organization_id).await?;

    let now = utc_now();
    sqlx::query("UPDATE wiki_articles SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(article.id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ArticleActionParams {
    pub action: Option<String>,
}

/// Feedback submission rides on the article path as `?action=feedback`.
#[utoipa::path(
    post,
    path = "/api/wiki/articles/{slug}",
    tag = "Wiki",
    params(
        ("slug" = String, Path, description = "Article slug"),
        ("action" = String, Query, description = "Must be `feedback`"),
    ),
    request_body = FeedbackRequest,
    responses(
        (status = 201, description = "Feedback stored", body = WikiFeedback),
        (status = 400, description = "Unknown action"),
        (status = 404, description = "Article not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn article_action(
    State(state): State<AppState>,
    caller: Caller,
    Path(slug): Path<String>,
    Query(params): Query<ArticleActionParams>,
    Json(payload): Json<FeedbackRequest>,
) -> AppResult<(StatusCode, Json<WikiFeedback>)> {
    if params.action.as_deref() != Some("feedback") {
        return Err(AppError::bad_request("unsupported action, expected ?action=feedback"));
    }
    payload.validate()?;

    let article = fetch_article(&state.pool, &slug, caller.organization_id).await?;

    let now = utc_now();
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO wiki_feedback (id, article_id, person_id, helpful, comment, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(article.id.to_string())
    .bind(caller.person_id.to_string())
    .bind(payload.helpful)
    .bind(&payload.comment)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let feedback = WikiFeedback {
        id,
        article_id: article.id,
        person_id: caller.person_id,
        helpful: payload.helpful,
        comment: payload.comment,
        created_at: now,
    };

    Ok((StatusCode::CREATED, Json(feedback)))
}

async fn fetch_article(pool: &SqlitePool, slug: &str, organization_id: Uuid) -> AppResult<WikiArticle> {
    sqlx::query_as::<_, DbWikiArticle>(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM wiki_articles WHERE slug = ? AND organization_id = ? AND deleted_at IS NULL",
    ))
    .bind(slug)
    .bind(organization_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("article not found"))?
    .try_into()
}
