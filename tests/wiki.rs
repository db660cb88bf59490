use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{register_with_new_org, request, spawn_app};

async fn create_article(
    app: &axum::Router,
    token: &str,
    title: &str,
) -> Result<(StatusCode, serde_json::Value)> {
    request(
        app,
        "POST",
        "/api/wiki/articles",
        Some(token),
        Some(json!({"title": title, "content": "Initial content."})),
    )
    .await
}

#[tokio::test]
async fn article_lifecycle_draft_active_enshrined() -> Result<()> {
    let test_app = spawn_app().await?;
    let (token, _, _) =
        register_with_new_org(&test_app.app, "Ada", "ada@school.example", "Wiki School").await?;

    let (status, body) = create_article(&test_app.app, &token, "Homework Policy").await?;
    assert_eq!(status, StatusCode::CREATED, "unexpected: {body}");
    assert_eq!(body["slug"].as_str(), Some("homework-policy"));
    assert_eq!(body["status"].as_str(), Some("draft"));

    // Draft cannot jump straight to enshrined.
    let (status, _) = request(
        &test_app.app,
        "PUT",
        "/api/wiki/articles/homework-policy",
        Some(&token),
        Some(json!({"status": "enshrined"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = request(
        &test_app.app,
        "PUT",
        "/api/wiki/articles/homework-policy",
        Some(&token),
        Some(json!({"status": "active", "content": "Reviewed content."})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "unexpected: {body}");
    assert_eq!(body["status"].as_str(), Some("active"));

    let (status, body) = request(
        &test_app.app,
        "PUT",
        "/api/wiki/articles/homework-policy",
        Some(&token),
        Some(json!({"status": "enshrined"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "unexpected: {body}");
    assert_eq!(body["status"].as_str(), Some("enshrined"));

    // Enshrined articles reject content edits and regressions.
    let (status, _) = request(
        &test_app.app,
        "PUT",
        "/api/wiki/articles/homework-policy",
        Some(&token),
        Some(json!({"content": "sneaky edit"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = request(
        &test_app.app,
        "PUT",
        "/api/wiki/articles/homework-policy",
        Some(&token),
        Some(json!({"status": "draft"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn duplicate_slug_is_a_conflict() -> Result<()> {
    let test_app = spawn_app().await?;
    let (token, _, _) =
        register_with_new_org(&test_app.app, "Ada", "ada@school.example", "Wiki School").await?;

    let (status, _) = create_article(&test_app.app, &token, "Homework Policy").await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = create_article(&test_app.app, &token, "Homework  Policy!").await?;
    assert_eq!(status, StatusCode::CONFLICT, "slug should collide: {body}");

    Ok(())
}

#[tokio::test]
async fn feedback_rides_the_action_query_parameter() -> Result<()> {
    let test_app = spawn_app().await?;
    let (token, user_id, _) =
        register_with_new_org(&test_app.app, "Ada", "ada@school.example", "Wiki School").await?;

    create_article(&test_app.app, &token, "Homework Policy").await?;

    let (status, body) = request(
        &test_app.app,
        "POST",
        "/api/wiki/articles/homework-policy?action=feedback",
        Some(&token),
        Some(json!({"helpful": true, "comment": "clear and short"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "unexpected: {body}");
    assert_eq!(body["helpful"].as_bool(), Some(true));
    assert_eq!(body["person_id"].as_str(), Some(user_id.to_string().as_str()));

    // Anything else on the POST path is rejected.
    let (status, _) = request(
        &test_app.app,
        "POST",
        "/api/wiki/articles/homework-policy?action=archive",
        Some(&token),
        Some(json!({"helpful": true})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn soft_deleted_articles_vanish_from_the_api_but_not_the_db() -> Result<()> {
    let test_app = spawn_app().await?;
    let (token, _, _) =
        register_with_new_org(&test_app.app, "Ada", "ada@school.example", "Wiki School").await?;

    create_article(&test_app.app, &token, "Homework Policy").await?;

    let (status, _) = request(
        &test_app.app,
        "DELETE",
        "/api/wiki/articles/homework-policy",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = request(
        &test_app.app,
        "GET",
        "/api/wiki/articles/homework-policy",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let kept: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM wiki_articles WHERE slug = 'homework-policy' AND deleted_at IS NOT NULL",
    )
    .fetch_one(&test_app.pool)
    .await?;
    assert_eq!(kept, 1);

    Ok(())
}

#[tokio::test]
async fn articles_are_tenant_scoped() -> Result<()> {
    let test_app = spawn_app().await?;
    let (token_a, _, _) =
        register_with_new_org(&test_app.app, "Ada", "ada@school.example", "School A").await?;
    let (token_b, _, _) =
        register_with_new_org(&test_app.app, "Bea", "bea@other.example", "School B").await?;

    create_article(&test_app.app, &token_a, "Homework Policy").await?;

    // Same slug is free in the other organization, and A's article is
    // invisible from B.
    let (status, _) = create_article(&test_app.app, &token_b, "Homework Policy").await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, list) = request(&test_app.app, "GET", "/api/wiki/articles", Some(&token_b), None).await?;
    assert_eq!(list.as_array().unwrap().len(), 1);

    Ok(())
}
