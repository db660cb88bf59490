use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::summary::{DbMeetingSummary, MeetingSummary, SummaryCreateRequest};
use crate::summarizer::SummaryOptions;
use crate::utils::utc_now;

/// Generate and persist a summary of the supplied transcript. The model call
/// blocks the request; a provider failure surfaces as a 500.
#[utoipa::path(
    post,
    path = "/api/communicator/summaries",
    tag = "Communicator",
    request_body = SummaryCreateRequest,
    responses(
        (status = 201, description = "Summary generated", body = MeetingSummary),
        (status = 500, description = "Model call failed"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_summary(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<SummaryCreateRequest>,
) -> AppResult<(StatusCode, Json<MeetingSummary>)> {
    payload.validate()?;

    let options = SummaryOptions {
        max_words: payload.options.max_words,
        focus: payload.options.focus.clone(),
    };

    let generated = state
        .summarizer
        .generate(&payload.content, &options)
        .await
        .map_err(|err| AppError::internal(format!("summarizer: {err}")))?;

    let now = utc_now();
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO meeting_summaries (id, organization_id, title, source_content, summary, model, created_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(caller.organization_id.to_string())
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(&generated.text)
    .bind(&generated.model)
    .bind(caller.person_id.to_string())
    .bind(now)
    .execute(&state.pool)
    .await?;

    let summary = MeetingSummary {
        id,
        organization_id: caller.organization_id,
        title: payload.title,
        summary: generated.text,
        model: generated.model,
        created_by: caller.person_id,
        created_at: now,
    };

    Ok((StatusCode::CREATED, Json(summary)))
}

#[utoipa::path(
    get,
    path = "/api/communicator/summaries",
    tag = "Communicator",
    responses((status = 200, description = "Stored summaries", body = [MeetingSummary])),
    security(("bearerAuth" = []))
)]
pub async fn list_summaries(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<Vec<MeetingSummary>>> {
    let rows = sqlx::query_as::<_, DbMeetingSummary>(
        "SELECT id, organization_id, title, summary, model, created_by, created_at \
         FROM meeting_summaries WHERE organization_id = ? ORDER BY created_at DESC",
    )
    .bind(caller.organization_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let summaries: Vec<MeetingSummary> = rows
        .into_iter()
        .map(MeetingSummary::try_from)
        .collect::<Result<_, _>>()?;
    Ok(Json(summaries))
}
