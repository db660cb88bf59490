use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::authz::Scope;
use crate::errors::AppError;

use super::organization::parse_id;

/// A role template carrying a default permission set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamPosition {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub level: i64,
    pub position_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTeamPosition {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub level: i64,
    pub position_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbTeamPosition> for TeamPosition {
    type Error = AppError;

    fn try_from(value: DbTeamPosition) -> Result<Self, Self::Error> {
        Ok(TeamPosition {
            id: parse_id(&value.id)?,
            organization_id: parse_id(&value.organization_id)?,
            name: value.name,
            level: value.level,
            position_type: value.position_type,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PositionCreateRequest {
    #[validate(length(min = 1, max = 120))]
    #[schema(example = "Head of Department")]
    pub name: String,
    #[schema(example = 3)]
    pub level: i64,
    #[validate(length(min = 1, max = 40))]
    #[schema(example = "leadership")]
    pub position_type: String,
}

/// Action grant attached to a position.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PositionPermission {
    pub id: Uuid,
    pub position_id: Uuid,
    pub action_type_id: Uuid,
    pub scope: Scope,
    pub can_delegate: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPositionPermission {
    pub id: String,
    pub position_id: String,
    pub action_type_id: String,
    pub scope: String,
    pub can_delegate: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbPositionPermission> for PositionPermission {
    type Error = AppError;

    fn try_from(value: DbPositionPermission) -> Result<Self, Self::Error> {
        Ok(PositionPermission {
            id: parse_id(&value.id)?,
            position_id: parse_id(&value.position_id)?,
            action_type_id: parse_id(&value.action_type_id)?,
            scope: Scope::parse(&value.scope)?,
            can_delegate: value.can_delegate,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PositionPermissionRequest {
    pub action_type_id: Uuid,
    pub scope: Scope,
    #[serde(default)]
    pub can_delegate: bool,
}
