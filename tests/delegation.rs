use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{count_open_overrides, register_in_org, request, setup_school, spawn_app};

#[tokio::test]
async fn lead_sees_delegable_set_and_staff_sees_none() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;

    let (status, body) = request(&test_app.app, "GET", "/api/delegation", Some(&school.lead_token), None).await?;
    assert_eq!(status, StatusCode::OK, "unexpected: {body}");

    let delegable = body["delegable_permissions"].as_array().unwrap();
    let codes: Vec<&str> = delegable.iter().map(|p| p["code"].as_str().unwrap()).collect();
    assert_eq!(codes, vec!["finance.invoice.issue", "schedule.edit"]);
    assert!(body.get("message").is_none());

    // Staff holds schedule.edit without can_delegate: explicit empty response.
    let (status, body) = request(&test_app.app, "GET", "/api/delegation", Some(&school.staff_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["delegable_permissions"].as_array().unwrap().is_empty());
    assert_eq!(body["message"].as_str(), Some("no delegable permissions"));

    Ok(())
}

#[tokio::test]
async fn single_delegation_creates_an_active_override() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;
    let action = school.actions["schedule.edit"];

    let (status, body) = request(
        &test_app.app,
        "POST",
        "/api/delegation",
        Some(&school.lead_token),
        Some(json!({
            "target_user_id": school.staff_id,
            "action_type_id": action,
            "scope": "team",
            "reason": "covering for the scheduling office",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "unexpected: {body}");

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["status"].as_str(), Some("created"));

    // The delegate now has one active override with the requested scope.
    let (status, body) = request(
        &test_app.app,
        "GET",
        &format!("/api/user-overrides?person_id={}", school.staff_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let overrides = body.as_array().unwrap();
    assert_eq!(overrides.len(), 1);
    assert_eq!(overrides[0]["scope"].as_str(), Some("team"));
    assert_eq!(overrides[0]["status"].as_str(), Some("active"));
    assert_eq!(overrides[0]["action_code"].as_str(), Some("schedule.edit"));

    assert_eq!(count_open_overrides(&test_app.pool, school.staff_id, action).await?, 1);

    Ok(())
}

#[tokio::test]
async fn scope_falls_back_to_the_permissions_own_scope() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;

    // No explicit scope: finance.invoice.issue was granted to the lead with
    // scope `team`, so the override inherits it.
    let (status, body) = request(
        &test_app.app,
        "POST",
        "/api/delegation",
        Some(&school.lead_token),
        Some(json!({
            "target_user_id": school.staff_id,
            "action_type_id": school.actions["finance.invoice.issue"],
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "unexpected: {body}");

    let (_, body) = request(
        &test_app.app,
        "GET",
        &format!("/api/user-overrides?person_id={}", school.staff_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert_eq!(body[0]["scope"].as_str(), Some("team"));

    Ok(())
}

#[tokio::test]
async fn undelegable_action_fails_closed_with_the_offending_ids() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;
    let delegable = school.actions["schedule.edit"];
    let undelegable = school.actions["member.manage"];

    // Bulk request mixing one legal and one illegal action: nothing applies.
    let (status, body) = request(
        &test_app.app,
        "POST",
        "/api/delegation",
        Some(&school.lead_token),
        Some(json!({
            "target_user_id": school.staff_id,
            "action_type_ids": [delegable, undelegable],
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "unexpected: {body}");

    let unauthorized = body["details"]["unauthorized_actions"].as_array().unwrap();
    assert_eq!(unauthorized.len(), 1);
    assert_eq!(unauthorized[0].as_str(), Some(undelegable.to_string().as_str()));

    // Fails closed: not even the legal half was written.
    assert_eq!(count_open_overrides(&test_app.pool, school.staff_id, delegable).await?, 0);
    assert_eq!(count_open_overrides(&test_app.pool, school.staff_id, undelegable).await?, 0);

    Ok(())
}

#[tokio::test]
async fn staff_without_delegable_positions_gets_forbidden() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;
    let action = school.actions["schedule.edit"];

    // Staff holds a position, but nothing delegable.
    let (status, body) = request(
        &test_app.app,
        "POST",
        "/api/delegation",
        Some(&school.staff_token),
        Some(json!({
            "target_user_id": school.lead_id,
            "action_type_id": action,
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "unexpected: {body}");
    assert_eq!(count_open_overrides(&test_app.pool, school.lead_id, action).await?, 0);

    // A person with no membership at all is rejected before the set lookup.
    let (bench_token, _) =
        register_in_org(&test_app.app, "Bench Warmer", "bench@school.example", school.org_id).await?;
    let (status, body) = request(
        &test_app.app,
        "POST",
        "/api/delegation",
        Some(&bench_token),
        Some(json!({
            "target_user_id": school.staff_id,
            "action_type_id": action,
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "unexpected: {body}");
    assert!(body["message"].as_str().unwrap().contains("no positions"));

    Ok(())
}

#[tokio::test]
async fn delegating_to_an_unknown_target_is_not_found() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;

    let (status, _) = request(
        &test_app.app,
        "POST",
        "/api/delegation",
        Some(&school.lead_token),
        Some(json!({
            "target_user_id": uuid::Uuid::new_v4(),
            "action_type_id": school.actions["schedule.edit"],
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn repeat_delegation_updates_in_place() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;
    let action = school.actions["schedule.edit"];

    let delegate = json!({
        "target_user_id": school.staff_id,
        "action_type_id": action,
        "scope": "team",
    });
    let (status, body) =
        request(&test_app.app, "POST", "/api/delegation", Some(&school.lead_token), Some(delegate)).await?;
    assert_eq!(status, StatusCode::CREATED, "unexpected: {body}");
    let first_id = body["results"][0]["override_id"].as_str().unwrap().to_string();

    let again = json!({
        "target_user_id": school.staff_id,
        "action_type_id": action,
        "scope": "organization",
    });
    let (status, body) =
        request(&test_app.app, "POST", "/api/delegation", Some(&school.lead_token), Some(again)).await?;
    assert_eq!(status, StatusCode::CREATED, "unexpected: {body}");
    assert_eq!(body["results"][0]["status"].as_str(), Some("updated"));
    assert_eq!(body["results"][0]["override_id"].as_str(), Some(first_id.as_str()));

    // Still exactly one open row, now with the widened scope.
    assert_eq!(count_open_overrides(&test_app.pool, school.staff_id, action).await?, 1);
    let (_, body) = request(
        &test_app.app,
        "GET",
        &format!("/api/user-overrides?person_id={}", school.staff_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert_eq!(body[0]["scope"].as_str(), Some("organization"));

    Ok(())
}

#[tokio::test]
async fn bulk_delegation_reports_per_action_results() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;
    let schedule = school.actions["schedule.edit"];
    let invoice = school.actions["finance.invoice.issue"];

    // Pre-existing delegation for schedule.edit.
    let (status, _) = request(
        &test_app.app,
        "POST",
        "/api/delegation",
        Some(&school.lead_token),
        Some(json!({"target_user_id": school.staff_id, "action_type_id": schedule})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(
        &test_app.app,
        "POST",
        "/api/delegation",
        Some(&school.lead_token),
        Some(json!({
            "target_user_id": school.staff_id,
            "action_type_ids": [schedule, invoice],
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "unexpected: {body}");

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    let status_for = |action: uuid::Uuid| {
        results
            .iter()
            .find(|r| r["action_type_id"].as_str() == Some(action.to_string().as_str()))
            .and_then(|r| r["status"].as_str())
            .map(str::to_string)
    };
    assert_eq!(status_for(schedule).as_deref(), Some("updated"));
    assert_eq!(status_for(invoice).as_deref(), Some("created"));

    Ok(())
}

#[tokio::test]
async fn only_the_granter_may_revoke() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;
    let action = school.actions["schedule.edit"];

    let (status, body) = request(
        &test_app.app,
        "POST",
        "/api/delegation",
        Some(&school.lead_token),
        Some(json!({"target_user_id": school.staff_id, "action_type_id": action})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "unexpected: {body}");
    let override_id = body["results"][0]["override_id"].as_str().unwrap().to_string();

    // The delegate did not grant it: 404, not 403, and the row is untouched.
    let (status, _) = request(
        &test_app.app,
        "DELETE",
        &format!("/api/delegation?id={override_id}"),
        Some(&school.staff_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(count_open_overrides(&test_app.pool, school.staff_id, action).await?, 1);

    let (status, _) = request(
        &test_app.app,
        "DELETE",
        &format!("/api/delegation?id={override_id}"),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(count_open_overrides(&test_app.pool, school.staff_id, action).await?, 0);

    // Gone from the active listing.
    let (_, body) = request(
        &test_app.app,
        "GET",
        &format!("/api/user-overrides?person_id={}", school.staff_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert!(body.as_array().unwrap().is_empty());

    Ok(())
}
