use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{create_position, request, setup_school, spawn_app};

#[tokio::test]
async fn member_detail_includes_display_fields() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;

    let (status, body) = request(
        &test_app.app,
        "GET",
        &format!("/api/members/{}", school.staff_member_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "unexpected: {body}");
    assert_eq!(body["person_name"].as_str(), Some("Sam Ortiz"));
    assert_eq!(body["position_name"].as_str(), Some("Teacher"));
    assert_eq!(body["is_active"].as_bool(), Some(true));
    assert_eq!(
        body["reports_to_member_id"].as_str(),
        Some(school.lead_member_id.to_string().as_str())
    );

    Ok(())
}

#[tokio::test]
async fn position_change_writes_exactly_one_modify_audit_row() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;

    let senior_position = create_position(&test_app.app, &school.lead_token, "Senior Teacher", 2).await?;

    let (status, body) = request(
        &test_app.app,
        "PUT",
        &format!("/api/members/{}", school.staff_member_id),
        Some(&school.lead_token),
        Some(json!({"position_id": senior_position})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "unexpected: {body}");
    assert_eq!(body["position_name"].as_str(), Some("Senior Teacher"));

    let (status, body) = request(
        &test_app.app,
        "GET",
        &format!("/api/audit-log?target_user_id={}", school.staff_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let modify_rows: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .filter(|entry| entry["action"].as_str() == Some("modify"))
        .collect();
    assert_eq!(modify_rows.len(), 1, "expected exactly one modify row: {body}");

    let entry = modify_rows[0];
    assert_eq!(entry["previous_value"]["type"].as_str(), Some("position"));
    assert_eq!(
        entry["previous_value"]["position_id"].as_str(),
        Some(school.staff_position_id.to_string().as_str())
    );
    // Old position carried one grant (schedule.edit), the new one carries none.
    assert_eq!(entry["previous_value"]["permission_count"].as_i64(), Some(1));
    assert_eq!(
        entry["new_value"]["position_id"].as_str(),
        Some(senior_position.to_string().as_str())
    );
    assert_eq!(entry["new_value"]["permission_count"].as_i64(), Some(0));

    Ok(())
}

#[tokio::test]
async fn update_without_position_change_writes_no_audit_row() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;

    let (status, _) = request(
        &test_app.app,
        "PUT",
        &format!("/api/members/{}", school.staff_member_id),
        Some(&school.lead_token),
        Some(json!({"member_role": "coordinator", "allocation": 0.8})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(
        &test_app.app,
        "GET",
        &format!("/api/audit-log?target_user_id={}", school.staff_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert!(
        body.as_array().unwrap().iter().all(|e| e["action"].as_str() != Some("modify")),
        "role/allocation edits must not audit as modify: {body}"
    );

    Ok(())
}

#[tokio::test]
async fn allocation_outside_unit_interval_is_rejected() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;

    let (status, body) = request(
        &test_app.app,
        "PUT",
        &format!("/api/members/{}", school.staff_member_id),
        Some(&school.lead_token),
        Some(json!({"allocation": 1.5})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "unexpected: {body}");
    assert!(body["details"].get("allocation").is_some(), "missing field detail: {body}");

    Ok(())
}

#[tokio::test]
async fn removal_is_soft_and_leaves_overrides_alone() -> Result<()> {
    let test_app = spawn_app().await?;
    let school = setup_school(&test_app.app).await?;
    let action = school.actions["schedule.edit"];

    // Grant the staff member a delegation first.
    let (status, _) = request(
        &test_app.app,
        "POST",
        "/api/delegation",
        Some(&school.lead_token),
        Some(json!({"target_user_id": school.staff_id, "action_type_id": action})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = request(
        &test_app.app,
        "DELETE",
        &format!("/api/members/{}", school.staff_member_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Row survives with is_active=0 and an end date.
    let (is_active, end_date): (bool, Option<String>) =
        sqlx::query_as("SELECT is_active, end_date FROM team_members WHERE id = ?")
            .bind(school.staff_member_id.to_string())
            .fetch_one(&test_app.pool)
            .await?;
    assert!(!is_active);
    assert!(end_date.is_some());

    // A revoke-action audit row references the membership.
    let (_, body) = request(
        &test_app.app,
        "GET",
        &format!("/api/audit-log?target_user_id={}", school.staff_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    let revoke = body
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["action"].as_str() == Some("revoke") && e["previous_value"]["type"].as_str() == Some("membership"))
        .expect("membership revoke audit row missing");
    assert_eq!(
        revoke["previous_value"]["team_id"].as_str(),
        Some(school.team_id.to_string().as_str())
    );
    assert_eq!(revoke["new_value"]["is_active"].as_bool(), Some(false));

    // No cascading revocation of the person's overrides.
    let (_, overrides) = request(
        &test_app.app,
        "GET",
        &format!("/api/user-overrides?person_id={}", school.staff_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert_eq!(overrides.as_array().unwrap().len(), 1, "override should survive removal");

    // Removing again is a no-op.
    let (status, _) = request(
        &test_app.app,
        "DELETE",
        &format!("/api/members/{}", school.staff_member_id),
        Some(&school.lead_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}
