//! Role checks for overrides, purges and policy edits
//!
//! Roles are assigned by the surrounding system in `staff_roles`; this
//! module only reads them.

use crate::error::{AccessError, AccessResult};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Security,
    Resident,
    Viewer,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "administrator" | "admin" => Some(Role::Administrator),
            "security" => Some(Role::Security),
            "resident" => Some(Role::Resident),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Security => "security",
            Role::Resident => "resident",
            Role::Viewer => "viewer",
        }
    }

    /// Access-control staff may override automated outcomes
    pub fn can_override(&self) -> bool {
        matches!(self, Role::Administrator | Role::Security)
    }

    /// Hard deletes and policy edits are administrator-only
    pub fn is_administrator(&self) -> bool {
        matches!(self, Role::Administrator)
    }
}

/// Actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Override,
    Purge,
    EditPolicy,
}

impl Action {
    fn describe(&self) -> &'static str {
        match self {
            Action::Override => "override access attempts",
            Action::Purge => "purge the access ledger",
            Action::EditPolicy => "edit the access policy",
        }
    }

    fn permitted_for(&self, role: Role) -> bool {
        match self {
            Action::Override => role.can_override(),
            Action::Purge | Action::EditPolicy => role.is_administrator(),
        }
    }
}

/// Look up an actor's role; `None` for unknown actors or unknown roles
pub async fn role_of(pool: &SqlitePool, actor: &str) -> AccessResult<Option<Role>> {
    let role: Option<String> = sqlx::query_scalar("SELECT role FROM staff_roles WHERE actor = ?")
        .bind(actor)
        .fetch_optional(pool)
        .await?;
    Ok(role.as_deref().and_then(Role::parse))
}

/// Fail with `Forbidden` unless `actor` may perform `action`
pub async fn require(pool: &SqlitePool, actor: &str, action: Action) -> AccessResult<Role> {
    match role_of(pool, actor).await? {
        Some(role) if action.permitted_for(role) => Ok(role),
        role => {
            warn!(
                actor = %actor,
                role = role.map(|r| r.as_str()).unwrap_or("none"),
                "Rejected: not allowed to {}",
                action.describe()
            );
            Err(AccessError::Forbidden {
                actor: actor.to_string(),
                action: action.describe(),
            })
        }
    }
}

/// Grant or replace a role (used by tooling and tests; the surrounding
/// system owns the table)
pub async fn assign_role(pool: &SqlitePool, actor: &str, role: Role) -> AccessResult<()> {
    sqlx::query(
        r#"
        INSERT INTO staff_roles (actor, role, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(actor) DO UPDATE SET role = excluded.role, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(actor)
    .bind(role.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(Action::Override.permitted_for(Role::Administrator));
        assert!(Action::Override.permitted_for(Role::Security));
        assert!(!Action::Override.permitted_for(Role::Resident));
        assert!(!Action::Override.permitted_for(Role::Viewer));

        assert!(Action::Purge.permitted_for(Role::Administrator));
        assert!(!Action::Purge.permitted_for(Role::Security));
        assert!(!Action::EditPolicy.permitted_for(Role::Security));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("Admin"), Some(Role::Administrator));
        assert_eq!(Role::parse(" security "), Some(Role::Security));
        assert_eq!(Role::parse("janitor"), None);
    }
}
