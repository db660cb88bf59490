use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::authz::Scope;
use crate::errors::AppError;

use super::organization::{parse_id, parse_opt_id};

/// Revocation state of an override. A revoked row keeps its data; the state
/// carries who revoked it and when.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OverrideState {
    Active,
    Revoked {
        revoked_at: DateTime<Utc>,
        revoked_by: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        revoke_reason: Option<String>,
    },
}

/// A per-person permission exception superseding position-derived defaults.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Override {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub person_id: Uuid,
    pub action_type_id: Uuid,
    pub is_granted: bool,
    pub scope: Scope,
    pub team_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: OverrideState,
}

impl Override {
    /// Active means not revoked and not past its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state, OverrideState::Active)
            && self.expires_at.map(|at| at > now).unwrap_or(true)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbOverride {
    pub id: String,
    pub organization_id: String,
    pub person_id: String,
    pub action_type_id: String,
    pub is_granted: bool,
    pub scope: String,
    pub team_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
    pub revoke_reason: Option<String>,
}

impl TryFrom<DbOverride> for Override {
    type Error = AppError;

    fn try_from(value: DbOverride) -> Result<Self, Self::Error> {
        let state = match value.revoked_at {
            Some(revoked_at) => {
                let revoked_by = value
                    .revoked_by
                    .as_deref()
                    .ok_or_else(|| AppError::internal("revoked override without revoked_by"))?;
                OverrideState::Revoked {
                    revoked_at,
                    revoked_by: parse_id(revoked_by)?,
                    revoke_reason: value.revoke_reason,
                }
            }
            None => OverrideState::Active,
        };

        Ok(Override {
            id: parse_id(&value.id)?,
            organization_id: parse_id(&value.organization_id)?,
            person_id: parse_id(&value.person_id)?,
            action_type_id: parse_id(&value.action_type_id)?,
            is_granted: value.is_granted,
            scope: Scope::parse(&value.scope)?,
            team_id: parse_opt_id(&value.team_id)?,
            expires_at: value.expires_at,
            reason: value.reason,
            granted_by: parse_id(&value.granted_by)?,
            granted_at: value.granted_at,
            state,
        })
    }
}

/// Direct override creation (admin path; delegation has its own endpoint).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OverrideCreateRequest {
    pub person_id: Uuid,
    pub action_type_id: Uuid,
    /// false records an explicit denial overriding position defaults.
    #[serde(default = "default_granted")]
    pub is_granted: bool,
    pub scope: Option<Scope>,
    pub team_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

fn default_granted() -> bool {
    true
}

/// Override joined with action-type and person display fields.
#[derive(Debug, Serialize, ToSchema)]
pub struct OverrideView {
    #[serde(flatten)]
    pub record: Override,
    pub action_code: String,
    pub action_name: String,
    pub person_name: String,
}

#[derive(Debug, FromRow)]
pub struct DbOverrideView {
    #[sqlx(flatten)]
    pub record: DbOverride,
    pub action_code: String,
    pub action_name: String,
    pub person_name: String,
}

impl TryFrom<DbOverrideView> for OverrideView {
    type Error = AppError;

    fn try_from(value: DbOverrideView) -> Result<Self, Self::Error> {
        Ok(OverrideView {
            record: value.record.try_into()?,
            action_code: value.action_code,
            action_name: value.action_name,
            person_name: value.person_name,
        })
    }
}
