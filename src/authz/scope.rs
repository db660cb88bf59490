use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Breadth of a permission grant, narrowest to broadest. The derived ordering
/// follows declaration order, so `Scope::Own < Scope::Global` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Own,
    Team,
    Department,
    Organization,
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::Team => "team",
            Scope::Department => "department",
            Scope::Organization => "organization",
            Scope::Global => "global",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "own" => Ok(Scope::Own),
            "team" => Ok(Scope::Team),
            "department" => Ok(Scope::Department),
            "organization" => Ok(Scope::Organization),
            "global" => Ok(Scope::Global),
            other => Err(AppError::internal(format!("unknown permission scope: {other}"))),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
