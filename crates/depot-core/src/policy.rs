//! Role gate: a static (operation, role) policy table.
//!
//! The caller supplies a role tag on every call. Nothing here authenticates
//! it; the gate only decides whether that role may perform an operation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DepotError, Result};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    Elevated,
}

impl Role {
    pub fn all() -> &'static [Role] {
        &[Role::Operator, Role::Elevated]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Operator => "operator",
            Role::Elevated => "elevated",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = DepotError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "operator" | "warehouse" | "clerk" => Ok(Role::Operator),
            "elevated" | "manager" | "supervisor" => Ok(Role::Elevated),
            other => Err(DepotError::invalid(format!("unknown role '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Register,
    AdjustQuantity,
    EditMetadata,
    Remove,
    CompleteEvent,
    RemoveTimed,
    RunReport,
}

impl Operation {
    pub fn all() -> &'static [Operation] {
        &[
            Operation::Register,
            Operation::AdjustQuantity,
            Operation::EditMetadata,
            Operation::Remove,
            Operation::CompleteEvent,
            Operation::RemoveTimed,
            Operation::RunReport,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Register => "register",
            Operation::AdjustQuantity => "adjust quantity",
            Operation::EditMetadata => "edit metadata",
            Operation::Remove => "remove",
            Operation::CompleteEvent => "complete event",
            Operation::RemoveTimed => "remove timed resource",
            Operation::RunReport => "run report",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

pub fn allowed(operation: Operation, role: Role) -> bool {
    match role {
        Role::Elevated => true,
        Role::Operator => matches!(
            operation,
            Operation::Register | Operation::AdjustQuantity | Operation::CompleteEvent
        ),
    }
}

/// `allowed` as a `Result`, for use with `?` at the top of guarded operations.
pub fn authorize(operation: Operation, role: Role) -> Result<()> {
    if allowed(operation, role) {
        Ok(())
    } else {
        Err(DepotError::Forbidden { operation, role })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_table_matches_exactly() {
        let table = [
            (Operation::Register, true, true),
            (Operation::AdjustQuantity, true, true),
            (Operation::EditMetadata, false, true),
            (Operation::Remove, false, true),
            (Operation::CompleteEvent, true, true),
            (Operation::RemoveTimed, false, true),
            (Operation::RunReport, false, true),
        ];
        assert_eq!(table.len(), Operation::all().len());
        for (op, operator, elevated) in table {
            assert_eq!(allowed(op, Role::Operator), operator, "operator / {op}");
            assert_eq!(allowed(op, Role::Elevated), elevated, "elevated / {op}");
        }
    }

    #[test]
    fn authorize_reports_operation_and_role() {
        let err = authorize(Operation::Remove, Role::Operator).unwrap_err();
        match err {
            DepotError::Forbidden { operation, role } => {
                assert_eq!(operation, Operation::Remove);
                assert_eq!(role, Role::Operator);
            }
            other => panic!("expected Forbidden, got {other:?}"),
        }
        assert!(authorize(Operation::Remove, Role::Elevated).is_ok());
    }

    #[test]
    fn role_parses_legacy_tags() {
        assert_eq!("warehouse".parse::<Role>().unwrap(), Role::Operator);
        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Elevated);
        assert_eq!("elevated".parse::<Role>().unwrap(), Role::Elevated);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn role_display_roundtrips() {
        for role in Role::all() {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), *role);
        }
    }
}
