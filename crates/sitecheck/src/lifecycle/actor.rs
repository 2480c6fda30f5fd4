//! Caller identity as supplied by the identity collaborator.

use serde::{Deserialize, Serialize};

/// Role of a caller. Authentication happens upstream; the lifecycle only
/// checks that the role and identity fit the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Worker,
    Administrator,
    Requester,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Worker => "worker",
            Role::Administrator => "administrator",
            Role::Requester => "requester",
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn worker(id: &str) -> Self {
        Self {
            id: id.to_string(),
            role: Role::Worker,
        }
    }

    pub fn administrator(id: &str) -> Self {
        Self {
            id: id.to_string(),
            role: Role::Administrator,
        }
    }

    pub fn requester(id: &str) -> Self {
        Self {
            id: id.to_string(),
            role: Role::Requester,
        }
    }

    pub fn is_administrator(&self) -> bool {
        self.role == Role::Administrator
    }
}
