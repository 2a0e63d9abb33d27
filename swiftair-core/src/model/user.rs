use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permission class of an account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }
}

/// An account row. Balance is meaningful for customers only; admin accounts
/// keep it at zero and are never debited or credited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub balance: i64,
    pub q1: Option<String>,
    pub q2: Option<String>,
    pub q3: Option<String>,
    pub a1_hash: Option<String>,
    pub a2_hash: Option<String>,
    pub a3_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn answer_hash(&self, idx: u8) -> Option<&str> {
        match idx {
            1 => self.a1_hash.as_deref(),
            2 => self.a2_hash.as_deref(),
            _ => self.a3_hash.as_deref(),
        }
    }
}
