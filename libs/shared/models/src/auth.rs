use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role attached to an already-authenticated caller by the upstream auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    #[serde(alias = "patient")]
    Subject,
    #[serde(alias = "doctor")]
    Provider,
    Admin,
}

impl fmt::Display for CallerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerRole::Subject => write!(f, "subject"),
            CallerRole::Provider => write!(f, "provider"),
            CallerRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for CallerRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "subject" | "patient" => Ok(CallerRole::Subject),
            "provider" | "doctor" => Ok(CallerRole::Provider),
            "admin" => Ok(CallerRole::Admin),
            other => Err(format!("unknown caller role '{}'", other)),
        }
    }
}

/// Opaque caller identity. The scheduling core never verifies it, it only
/// uses it for ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub id: Uuid,
    pub role: CallerRole,
}

impl CallerIdentity {
    pub fn new(id: Uuid, role: CallerRole) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == CallerRole::Admin
    }

    /// True when the caller is `id` or an admin.
    pub fn is_self_or_admin(&self, id: Uuid) -> bool {
        self.is_admin() || self.id == id
    }

    /// True when the caller may manage `provider_id`'s schedule.
    pub fn can_manage_provider(&self, provider_id: Uuid) -> bool {
        self.is_admin() || (self.role == CallerRole::Provider && self.id == provider_id)
    }
}
