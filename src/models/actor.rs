//! Actor model
//!
//! Identifies who requested a transition. The role drives the permission
//! matrix of the state machine; `System` is the scheduler's identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the party executing a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Receptionist,
    Client,
    /// Background jobs (expiry, no-show marking)
    System,
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActorRole::Admin => "admin",
            ActorRole::Receptionist => "receptionist",
            ActorRole::Client => "client",
            ActorRole::System => "system",
        };
        write!(f, "{}", s)
    }
}

/// The authenticated party behind a transition request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: Uuid, role: ActorRole) -> Self {
        Self { id, role }
    }

    /// The well-known identity used by scheduler jobs
    pub fn system() -> Self {
        Self {
            id: Uuid::nil(),
            role: ActorRole::System,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, ActorRole::Admin | ActorRole::Receptionist)
    }
}
