//! Authenticated user profile as issued by the backend at login.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// User role.
///
/// Only `admin` carries meaning on the client (it unlocks the back-office);
/// every other role string is kept verbatim so it round-trips through storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Full access to the back-office.
    Admin,
    /// Any other role the backend assigns.
    Other(String),
}

impl Role {
    /// The role as sent by the backend.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Other(role) => role,
        }
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        if role == "admin" {
            Self::Admin
        } else {
            Self::Other(role)
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => "admin".to_string(),
            Role::Other(role) => role,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile of the signed-in user.
///
/// Fields the client does not interpret are preserved in `extra` so the
/// record survives a storage round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserRecord {
    /// Create a user record with no extra profile fields.
    #[must_use]
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            email: None,
            role,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Whether this user may use admin-only paths.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from("admin".to_string()), Role::Admin);
        assert_eq!(
            Role::from("editor".to_string()),
            Role::Other("editor".to_string())
        );
    }

    #[test]
    fn test_user_record_preserves_unknown_fields() {
        let raw = r#"{"id":1,"email":"ana@example.com","role":"admin","username":"ana"}"#;
        let user: UserRecord = serde_json::from_str(raw).unwrap();

        assert!(user.is_admin());
        assert_eq!(user.extra.get("username").unwrap(), "ana");

        let back: serde_json::Value = serde_json::to_value(&user).unwrap();
        let original: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_non_admin_role() {
        let user = UserRecord::new(UserId::new(2), Role::Other("seller".to_string()));
        assert!(!user.is_admin());
        assert_eq!(user.role.to_string(), "seller");
    }
}
