//! Users, roles, and the capability table gating workflow operations.
//!
//! Authorization is a pure function of `(Role, Operation)`. The boundary
//! checks it before the transition engine runs; the engine still defends its
//! own state and payload preconditions independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CovtrackError, Result};

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        UserId(uuid)
    }
}

impl std::ops::Deref for UserId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Role held by a user. Each role unlocks a fixed set of operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Tester,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Tester => "tester",
            Role::Doctor => "doctor",
        }
    }

    /// The capability table: which operations this role may invoke.
    pub fn allows(self, operation: Operation) -> bool {
        matches!(
            (self, operation),
            (Role::Patient, Operation::CreateRequest)
                | (
                    Role::Tester,
                    Operation::AssignForLabTest | Operation::UpdateLabTest
                )
                | (
                    Role::Doctor,
                    Operation::AssignForConsultation | Operation::UpdateConsultation
                )
        )
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "tester" => Ok(Role::Tester),
            "doctor" => Ok(Role::Doctor),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Workflow operations subject to role gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateRequest,
    AssignForLabTest,
    UpdateLabTest,
    AssignForConsultation,
    UpdateConsultation,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateRequest => "create_request",
            Operation::AssignForLabTest => "assign_for_lab_test",
            Operation::UpdateLabTest => "update_lab_test",
            Operation::AssignForConsultation => "assign_for_consultation",
            Operation::UpdateConsultation => "update_consultation",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user known to the system, as produced by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub user_name: String,
    pub role: Role,
}

impl User {
    /// Create a user with a fresh id.
    pub fn new(user_name: impl Into<String>, role: Role) -> Self {
        User {
            id: UserId(Uuid::new_v4()),
            user_name: user_name.into(),
            role,
        }
    }
}

/// Check the capability table for the acting user.
pub fn authorize(user: &User, operation: Operation) -> Result<()> {
    if user.role.allows(operation) {
        Ok(())
    } else {
        tracing::warn!(
            user = %user.id,
            role = %user.role,
            operation = %operation,
            "Operation denied by role gate"
        );
        Err(CovtrackError::AccessDenied(user.role, operation))
    }
}
