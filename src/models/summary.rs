use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;

use super::organization::parse_id;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeetingSummary {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub summary: String,
    pub model: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMeetingSummary {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub summary: String,
    pub model: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbMeetingSummary> for MeetingSummary {
    type Error = AppError;

    fn try_from(value: DbMeetingSummary) -> Result<Self, Self::Error> {
        Ok(MeetingSummary {
            id: parse_id(&value.id)?,
            organization_id: parse_id(&value.organization_id)?,
            title: value.title,
            summary: value.summary,
            model: value.model,
            created_by: parse_id(&value.created_by)?,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SummaryCreateRequest {
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Staff meeting 2026-08-03")]
    pub title: String,
    /// Raw meeting or conversation transcript to summarize.
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub options: SummaryRequestOptions,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SummaryRequestOptions {
    /// Soft cap on summary length, in words.
    #[schema(example = 120)]
    pub max_words: Option<u32>,
    /// Optional emphasis, e.g. "action items".
    pub focus: Option<String>,
}
