use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;

use super::member::MemberView;
use super::organization::{parse_id, parse_opt_id};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Team {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub parent_team_id: Option<Uuid>,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTeam {
    pub id: String,
    pub organization_id: String,
    pub parent_team_id: Option<String>,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbTeam> for Team {
    type Error = AppError;

    fn try_from(value: DbTeam) -> Result<Self, Self::Error> {
        Ok(Team {
            id: parse_id(&value.id)?,
            organization_id: parse_id(&value.organization_id)?,
            parent_team_id: parse_opt_id(&value.parent_team_id)?,
            name: value.name,
            code: value.code,
            description: value.description,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TeamCreateRequest {
    #[validate(length(min = 1, max = 120))]
    #[schema(example = "Lower School Faculty")]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    #[schema(example = "LSF")]
    pub code: String,
    #[schema(example = "Teachers for grades 1-4")]
    pub description: Option<String>,
    pub parent_team_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TeamUpdateRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub code: Option<String>,
    pub description: Option<String>,
    pub parent_team_id: Option<Uuid>,
}

/// Team with its active members and direct child teams.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: Team,
    pub members: Vec<MemberView>,
    pub child_teams: Vec<Team>,
}
