use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Doctor,
    Admin,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Patient => write!(f, "patient"),
            ActorRole::Doctor => write!(f, "doctor"),
            ActorRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(ActorRole::Patient),
            "doctor" => Ok(ActorRole::Doctor),
            "admin" => Ok(ActorRole::Admin),
            other => Err(format!("unknown actor role: {}", other)),
        }
    }
}

/// The signed-in user a dashboard session acts for.
///
/// Authentication itself happens elsewhere; the session only carries the bearer
/// token it was handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
    pub display_name: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn is_doctor(&self) -> bool {
        self.role == ActorRole::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == ActorRole::Patient
    }
}
