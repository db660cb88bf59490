//! Append-only permission audit log.
//!
//! Every grant/revoke/delegate/modify writes exactly one row, in the same
//! transaction as the change it records. Snapshots are typed structures
//! serialized with a `type` tag so they stay structurally checkable, and each
//! row is hash-chained (SHA-256 over the previous hash and the row payload)
//! per organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqliteConnection};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Scope;
use crate::errors::AppError;
use crate::models::member::TeamMember;
use crate::models::organization::{parse_id, parse_opt_id};
use crate::models::overrides::Override;
use crate::utils::utc_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Grant,
    Revoke,
    Delegate,
    Modify,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Grant => "grant",
            AuditAction::Revoke => "revoke",
            AuditAction::Delegate => "delegate",
            AuditAction::Modify => "modify",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "grant" => Ok(AuditAction::Grant),
            "revoke" => Ok(AuditAction::Revoke),
            "delegate" => Ok(AuditAction::Delegate),
            "modify" => Ok(AuditAction::Modify),
            other => Err(AppError::internal(format!("unknown audit action: {other}"))),
        }
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditSnapshot {
    Override(OverrideSnapshot),
    Position(PositionSnapshot),
    Membership(MembershipSnapshot),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OverrideSnapshot {
    pub override_id: Uuid,
    pub person_id: Uuid,
    pub action_type_id: Uuid,
    pub is_granted: bool,
    pub scope: Scope,
    pub team_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
}

impl From<&Override> for AuditSnapshot {
    fn from(record: &Override) -> Self {
        AuditSnapshot::Override(OverrideSnapshot {
            override_id: record.id,
            person_id: record.person_id,
            action_type_id: record.action_type_id,
            is_granted: record.is_granted,
            scope: record.scope,
            team_id: record.team_id,
            expires_at: record.expires_at,
            reason: record.reason.clone(),
            granted_by: record.granted_by,
            granted_at: record.granted_at,
        })
    }
}

/// Position id plus its permission count: a position change is audited as a
/// scope-size notification, not a full permission diff.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PositionSnapshot {
    pub position_id: Uuid,
    pub permission_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MembershipSnapshot {
    pub member_id: Uuid,
    pub team_id: Uuid,
    pub position_id: Uuid,
    pub member_role: String,
    pub is_active: bool,
    pub end_date: Option<DateTime<Utc>>,
}

impl From<&TeamMember> for AuditSnapshot {
    fn from(member: &TeamMember) -> Self {
        AuditSnapshot::Membership(MembershipSnapshot {
            member_id: member.id,
            team_id: member.team_id,
            position_id: member.position_id,
            member_role: member.member_role.clone(),
            is_active: member.is_active,
            end_date: member.end_date,
        })
    }
}

// =============================================================================
// APPEND
// =============================================================================

#[derive(Debug)]
pub struct NewAuditEntry {
    pub organization_id: Uuid,
    pub action: AuditAction,
    pub target_user_id: Uuid,
    pub action_type_id: Option<Uuid>,
    pub previous: Option<AuditSnapshot>,
    pub new: Option<AuditSnapshot>,
    pub performed_by: Uuid,
    pub reason: Option<String>,
}

/// Append one audit row. Runs on the caller's connection so the row commits
/// or rolls back together with the change it records.
pub async fn record(conn: &mut SqliteConnection, entry: NewAuditEntry) -> Result<Uuid, AppError> {
    let id = Uuid::new_v4();
    let performed_at = utc_now();

    let previous_value = entry
        .previous
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| AppError::internal(format!("snapshot serialization failed: {err}")))?;
    let new_value = entry
        .new
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| AppError::internal(format!("snapshot serialization failed: {err}")))?;

    let prev_hash: Option<String> = sqlx::query_scalar(
        "SELECT hash FROM permission_audit_log WHERE organization_id = ? ORDER BY performed_at DESC, rowid DESC LIMIT 1",
    )
    .bind(entry.organization_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    let payload = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        id,
        entry.action.as_str(),
        entry.target_user_id,
        entry.action_type_id.map(|v| v.to_string()).unwrap_or_default(),
        previous_value.as_deref().unwrap_or_default(),
        new_value.as_deref().unwrap_or_default(),
        entry.performed_by,
        performed_at.to_rfc3339(),
    );
    let hash = chain_hash(prev_hash.as_deref(), &payload);

    sqlx::query(
        r#"
        INSERT INTO permission_audit_log
            (id, organization_id, action, target_user_id, action_type_id,
             previous_value, new_value, performed_by, performed_at, reason, prev_hash, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(entry.organization_id.to_string())
    .bind(entry.action.as_str())
    .bind(entry.target_user_id.to_string())
    .bind(entry.action_type_id.map(|v| v.to_string()))
    .bind(&previous_value)
    .bind(&new_value)
    .bind(entry.performed_by.to_string())
    .bind(performed_at)
    .bind(&entry.reason)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

pub fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

// =============================================================================
// READ MODEL
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub action: AuditAction,
    pub target_user_id: Uuid,
    pub action_type_id: Option<Uuid>,
    pub previous_value: Option<AuditSnapshot>,
    pub new_value: Option<AuditSnapshot>,
    pub performed_by: Uuid,
    pub performed_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

#[derive(Debug, FromRow)]
pub struct DbAuditEntry {
    pub id: String,
    pub organization_id: String,
    pub action: String,
    pub target_user_id: String,
    pub action_type_id: Option<String>,
    pub previous_value: Option<String>,
    pub new_value: Option<String>,
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

impl TryFrom<DbAuditEntry> for AuditEntry {
    type Error = AppError;

    fn try_from(value: DbAuditEntry) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: parse_id(&value.id)?,
            organization_id: parse_id(&value.organization_id)?,
            action: AuditAction::parse(&value.action)?,
            target_user_id: parse_id(&value.target_user_id)?,
            action_type_id: parse_opt_id(&value.action_type_id)?,
            previous_value: parse_snapshot(value.previous_value.as_deref())?,
            new_value: parse_snapshot(value.new_value.as_deref())?,
            performed_by: parse_id(&value.performed_by)?,
            performed_at: value.performed_at,
            reason: value.reason,
            prev_hash: value.prev_hash,
            hash: value.hash,
        })
    }
}

fn parse_snapshot(raw: Option<&str>) -> Result<Option<AuditSnapshot>, AppError> {
    raw.map(|text| {
        serde_json::from_str(text)
            .map_err(|err| AppError::internal(format!("corrupt audit snapshot: {err}")))
    })
    .transpose()
}
