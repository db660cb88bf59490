use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;

use super::organization::{parse_id, parse_opt_id};

/// A person's assignment to a team with a position. Removal is logical:
/// is_active flips to false and end_date is set, the row stays.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamMember {
    pub id: Uuid,
    pub team_id: Uuid,
    pub person_id: Uuid,
    pub position_id: Uuid,
    pub member_role: String,
    pub employment_type: String,
    pub allocation: f64,
    pub reports_to_member_id: Option<Uuid>,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTeamMember {
    pub id: String,
    pub team_id: String,
    pub person_id: String,
    pub position_id: String,
    pub member_role: String,
    pub employment_type: String,
    pub allocation: f64,
    pub reports_to_member_id: Option<String>,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbTeamMember> for TeamMember {
    type Error = AppError;

    fn try_from(value: DbTeamMember) -> Result<Self, Self::Error> {
        Ok(TeamMember {
            id: parse_id(&value.id)?,
            team_id: parse_id(&value.team_id)?,
            person_id: parse_id(&value.person_id)?,
            position_id: parse_id(&value.position_id)?,
            member_role: value.member_role,
            employment_type: value.employment_type,
            allocation: value.allocation,
            reports_to_member_id: parse_opt_id(&value.reports_to_member_id)?,
            is_active: value.is_active,
            start_date: value.start_date,
            end_date: value.end_date,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MemberCreateRequest {
    pub team_id: Uuid,
    pub person_id: Uuid,
    pub position_id: Uuid,
    #[validate(length(min = 1, max = 40))]
    #[schema(example = "member")]
    pub member_role: String,
    #[validate(length(min = 1, max = 40))]
    #[schema(example = "full_time")]
    pub employment_type: String,
    #[validate(range(min = 0.0, max = 1.0))]
    #[schema(example = 1.0)]
    pub allocation: f64,
    pub reports_to_member_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MemberUpdateRequest {
    pub position_id: Option<Uuid>,
    #[validate(length(min = 1, max = 40))]
    pub member_role: Option<String>,
    #[validate(length(min = 1, max = 40))]
    pub employment_type: Option<String>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub allocation: Option<f64>,
    pub reports_to_member_id: Option<Uuid>,
}

/// Member joined with person and position display fields.
#[derive(Debug, Serialize, ToSchema)]
pub struct MemberView {
    #[serde(flatten)]
    pub member: TeamMember,
    pub person_name: String,
    pub person_email: String,
    pub position_name: String,
}

#[derive(Debug, FromRow)]
pub struct DbMemberView {
    #[sqlx(flatten)]
    pub member: DbTeamMember,
    pub person_name: String,
    pub person_email: String,
    pub position_name: String,
}

impl TryFrom<DbMemberView> for MemberView {
    type Error = AppError;

    fn try_from(value: DbMemberView) -> Result<Self, Self::Error> {
        Ok(MemberView {
            member: value.member.try_into()?,
            person_name: value.person_name,
            person_email: value.person_email,
            position_name: value.position_name,
        })
    }
}
