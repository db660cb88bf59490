use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;

use super::organization::parse_id;

/// Article lifecycle. Transitions only move forward one step:
/// draft -> active -> enshrined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WikiStatus {
    Draft,
    Active,
    Enshrined,
}

impl WikiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WikiStatus::Draft => "draft",
            WikiStatus::Active => "active",
            WikiStatus::Enshrined => "enshrined",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "draft" => Ok(WikiStatus::Draft),
            "active" => Ok(WikiStatus::Active),
            "enshrined" => Ok(WikiStatus::Enshrined),
            other => Err(AppError::internal(format!("unknown article status: {other}"))),
        }
    }

    pub fn can_transition_to(&self, next: WikiStatus) -> bool {
        matches!(
            (self, next),
            (WikiStatus::Draft, WikiStatus::Active) | (WikiStatus::Active, WikiStatus::Enshrined)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WikiArticle {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub status: WikiStatus,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbWikiArticle {
    pub id: String,
    pub organization_id: String,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub status: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbWikiArticle> for WikiArticle {
    type Error = AppError;

    fn try_from(value: DbWikiArticle) -> Result<Self, Self::Error> {
        Ok(WikiArticle {
            id: parse_id(&value.id)?,
            organization_id: parse_id(&value.organization_id)?,
            slug: value.slug,
            title: value.title,
            content: value.content,
            status: WikiStatus::parse(&value.status)?,
            author_id: parse_id(&value.author_id)?,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ArticleCreateRequest {
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Homework policy")]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    /// Defaults to a slug derived from the title.
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ArticleUpdateRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    pub status: Option<WikiStatus>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FeedbackRequest {
    pub helpful: bool,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WikiFeedback {
    pub id: Uuid,
    pub article_id: Uuid,
    pub person_id: Uuid,
    pub helpful: bool,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
