use std::collections::HashMap;

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

use super::Scope;

/// One action the caller may delegate, with catalog display metadata.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DelegablePermission {
    pub action_type_id: Uuid,
    pub code: String,
    pub name: String,
    pub category: String,
    pub risk_level: String,
    pub scope: Scope,
}

/// The caller's delegable actions, one entry per action type. When several
/// positions grant the same action the broadest scope wins.
#[derive(Debug, Default)]
pub struct DelegableSet {
    by_action: HashMap<Uuid, DelegablePermission>,
}

impl DelegableSet {
    pub fn contains(&self, action_type_id: Uuid) -> bool {
        self.by_action.contains_key(&action_type_id)
    }

    pub fn scope_for(&self, action_type_id: Uuid) -> Option<Scope> {
        self.by_action.get(&action_type_id).map(|p| p.scope)
    }

    pub fn is_empty(&self) -> bool {
        self.by_action.is_empty()
    }

    /// Entries ordered by action code for stable listings.
    pub fn permissions(&self) -> Vec<&DelegablePermission> {
        let mut entries: Vec<_> = self.by_action.values().collect();
        entries.sort_by(|a, b| a.code.cmp(&b.code));
        entries
    }

    fn from_rows(rows: Vec<DelegableRow>) -> Result<Self, AppError> {
        let mut by_action: HashMap<Uuid, DelegablePermission> = HashMap::new();

        for row in rows {
            let permission = row.into_permission()?;
            match by_action.get(&permission.action_type_id) {
                Some(existing) if existing.scope >= permission.scope => {}
                _ => {
                    by_action.insert(permission.action_type_id, permission);
                }
            }
        }

        Ok(Self { by_action })
    }
}

#[derive(Debug, FromRow)]
struct DelegableRow {
    action_type_id: String,
    code: String,
    name: String,
    category: String,
    risk_level: String,
    scope: String,
}

impl DelegableRow {
    fn into_permission(self) -> Result<DelegablePermission, AppError> {
        Ok(DelegablePermission {
            action_type_id: Uuid::parse_str(&self.action_type_id)
                .map_err(|err| AppError::internal(format!("corrupt action type id: {err}")))?,
            code: self.code,
            name: self.name,
            category: self.category,
            risk_level: self.risk_level,
            scope: Scope::parse(&self.scope)?,
        })
    }
}

/// Resolve the caller's delegable set: active memberships -> positions ->
/// position permissions flagged can_delegate, joined to the action catalog.
pub async fn load_delegable_set(pool: &SqlitePool, person_id: Uuid) -> Result<DelegableSet, AppError> {
    let rows = sqlx::query_as::<_, DelegableRow>(
        r#"
        SELECT pp.action_type_id, at.code, at.name, at.category, at.risk_level, pp.scope
        FROM team_members tm
        INNER JOIN team_positions tp ON tp.id = tm.position_id
        INNER JOIN position_permissions pp ON pp.position_id = tp.id
        INNER JOIN action_types at ON at.id = pp.action_type_id
        WHERE tm.person_id = ? AND tm.is_active = 1 AND pp.can_delegate = 1
        "#,
    )
    .bind(person_id.to_string())
    .fetch_all(pool)
    .await?;

    DelegableSet::from_rows(rows)
}

/// Number of active team memberships that carry a position, used to
/// distinguish "no positions at all" from "positions without delegation".
pub async fn count_active_positions(pool: &SqlitePool, person_id: Uuid) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM team_members WHERE person_id = ? AND is_active = 1",
    )
    .bind(person_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(count)
}
