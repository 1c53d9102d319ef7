use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Role a signed-in account acts under.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    Staff,
}

impl UserRole {
    /// Return the canonical string representation used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Staff => "staff",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "customer" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            _ => Err("unknown user role"),
        }
    }
}

/// Server-provided profile of the signed-in account.
///
/// The backend reports staff accounts through `is_staff` and may omit `role`
/// entirely; [`UserProfile::normalized`] folds both into a concrete role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

impl UserProfile {
    /// Resolve the effective role.
    #[must_use]
    pub fn role(&self) -> UserRole {
        match self.role {
            Some(role) => role,
            None if self.is_staff => UserRole::Staff,
            None => UserRole::Customer,
        }
    }

    /// Copy of the profile with `role` filled in.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.role = Some(self.role());
        self
    }
}
