use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;

use super::organization::parse_id;

/// A permission-checkable operation from the seeded catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActionType {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub category: String,
    pub risk_level: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbActionType {
    pub id: String,
    pub code: String,
    pub name: String,
    pub category: String,
    pub risk_level: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbActionType> for ActionType {
    type Error = AppError;

    fn try_from(value: DbActionType) -> Result<Self, Self::Error> {
        Ok(ActionType {
            id: parse_id(&value.id)?,
            code: value.code,
            name: value.name,
            category: value.category,
            risk_level: value.risk_level,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ActionTypeCreateRequest {
    #[validate(length(min = 3, max = 80))]
    #[schema(example = "library.catalog.edit")]
    pub code: String,
    #[validate(length(min = 1, max = 120))]
    #[schema(example = "Edit the library catalog")]
    pub name: String,
    #[validate(length(min = 1, max = 40))]
    #[schema(example = "library")]
    pub category: String,
    #[validate(length(min = 1, max = 20))]
    #[schema(example = "low")]
    pub risk_level: String,
}
