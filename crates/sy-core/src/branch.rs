//! Branches (campuses) and principal-to-branch assignments.
//!
//! A branch is a sub-division of one tenant, e.g. a campus. Branch scoping is
//! opt-in: the platform never narrows queries by branch automatically, it
//! only exposes [`BranchFacts`] that feature handlers may use. Some
//! principals (school administrators) legitimately operate across branches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::TenantOwned;

/// Role a principal holds within their primary branch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BranchRole {
    /// Branch director / head of campus.
    Director,
    /// Admissions and records staff.
    Registrar,
    /// Fees and accounting staff.
    Accountant,
    /// Teaching staff.
    Teacher,
    /// Other staff.
    Staff,
    /// The principal has no branch assignment in the resolved tenant. This
    /// is a representable state, not an error; callers that require a branch
    /// must check for it explicitly.
    #[default]
    Unassigned,
}

impl BranchRole {
    /// Database string representation (snake_case).
    pub fn as_db_str(&self) -> &'static str {
        match self {
            BranchRole::Director => "director",
            BranchRole::Registrar => "registrar",
            BranchRole::Accountant => "accountant",
            BranchRole::Teacher => "teacher",
            BranchRole::Staff => "staff",
            BranchRole::Unassigned => "unassigned",
        }
    }

    /// Parses the database representation.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "director" => Some(BranchRole::Director),
            "registrar" => Some(BranchRole::Registrar),
            "accountant" => Some(BranchRole::Accountant),
            "teacher" => Some(BranchRole::Teacher),
            "staff" => Some(BranchRole::Staff),
            "unassigned" => Some(BranchRole::Unassigned),
            _ => None,
        }
    }
}

impl std::fmt::Display for BranchRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// A branch (campus) within one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Short code unique within the tenant, e.g. "north".
    pub code: String,
    /// Display name, e.g. "North Campus".
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TenantOwned for Branch {
    const TABLE: &'static str = "branches";

    fn owner(&self) -> Uuid {
        self.tenant_id
    }
}

impl Branch {
    /// Creates a branch for the given tenant.
    pub fn new(tenant_id: Uuid, code: &str, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            code: code.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Relates a principal to a branch within one tenant.
///
/// At most one assignment per (principal, tenant) should be marked primary.
/// That invariant is maintained by the administrative CRUD that writes these
/// rows; the branch scoper reads whichever primary row it finds first and
/// does not re-validate uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchAssignment {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// The branch the principal belongs to.
    pub branch_id: Uuid,
    /// The principal (user) being assigned.
    pub user_id: Uuid,
    /// Role held at this branch.
    pub role: BranchRole,
    /// Whether this is the principal's primary assignment.
    pub is_primary: bool,
    /// Optimistic-concurrency token, incremented on every update.
    pub version: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TenantOwned for BranchAssignment {
    const TABLE: &'static str = "branch_assignments";

    fn owner(&self) -> Uuid {
        self.tenant_id
    }
}

impl BranchAssignment {
    /// Creates a new assignment at version 1.
    pub fn new(tenant_id: Uuid, branch_id: Uuid, user_id: Uuid, role: BranchRole) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            branch_id,
            user_id,
            role,
            is_primary: false,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks this assignment as the principal's primary one.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

/// Request-scoped branch facts produced by the branch scoper.
///
/// `Unassigned` with a `None` branch id is the explicit fallback when the
/// principal has no primary assignment in the resolved tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchFacts {
    /// Primary branch id, if any.
    pub branch_id: Option<Uuid>,
    /// Primary branch code, if any.
    pub branch_code: Option<String>,
    /// Primary branch display name, if any.
    pub branch_name: Option<String>,
    /// Role at the primary branch; `Unassigned` when there is none.
    pub role: BranchRole,
}

impl BranchFacts {
    /// Facts for a principal with no branch assignment.
    pub fn unassigned() -> Self {
        Self {
            branch_id: None,
            branch_code: None,
            branch_name: None,
            role: BranchRole::Unassigned,
        }
    }

    /// Facts for a resolved primary assignment.
    pub fn from_assignment(assignment: &BranchAssignment, branch: &Branch) -> Self {
        Self {
            branch_id: Some(branch.id),
            branch_code: Some(branch.code.clone()),
            branch_name: Some(branch.name.clone()),
            role: assignment.role,
        }
    }

    /// Returns true if the principal has a primary branch.
    pub fn is_assigned(&self) -> bool {
        self.branch_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_db_round_trip() {
        for role in [
            BranchRole::Director,
            BranchRole::Registrar,
            BranchRole::Accountant,
            BranchRole::Teacher,
            BranchRole::Staff,
            BranchRole::Unassigned,
        ] {
            assert_eq!(BranchRole::from_db_str(role.as_db_str()), Some(role));
        }
        assert_eq!(BranchRole::from_db_str("janitor"), None);
    }

    #[test]
    fn assignment_starts_at_version_one() {
        let assignment = BranchAssignment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            BranchRole::Teacher,
        );
        assert_eq!(assignment.version, 1);
        assert!(!assignment.is_primary);
        assert!(assignment.primary().is_primary);
    }

    #[test]
    fn unassigned_facts() {
        let facts = BranchFacts::unassigned();
        assert_eq!(facts.role, BranchRole::Unassigned);
        assert!(facts.branch_id.is_none());
        assert!(!facts.is_assigned());
    }

    #[test]
    fn facts_from_assignment() {
        let tenant_id = Uuid::new_v4();
        let branch = Branch::new(tenant_id, "north", "North Campus");
        let assignment =
            BranchAssignment::new(tenant_id, branch.id, Uuid::new_v4(), BranchRole::Registrar)
                .primary();
        let facts = BranchFacts::from_assignment(&assignment, &branch);
        assert_eq!(facts.branch_id, Some(branch.id));
        assert_eq!(facts.branch_code.as_deref(), Some("north"));
        assert_eq!(facts.role, BranchRole::Registrar);
        assert!(facts.is_assigned());
    }
}
