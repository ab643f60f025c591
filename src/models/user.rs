//! User model
//!
//! Registered members of the association. Admins manage content and payments;
//! group members may publish without approval and organize activities.

use async_graphql::{Enum, InputObject, SimpleObject};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::{Entity, IndexSpec};

/// User entity.
///
/// The email is the login identifier and is stored lowercased.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    /// Exposed through a viewer-aware resolver
    #[graphql(skip)]
    pub email: String,
    /// Password hash (argon2)
    #[graphql(skip)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_group_member: bool,
    /// Profile picture; defaults to the gravatar of the email
    pub avatar: String,
    pub bio: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a regular user. The password must already be hashed.
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        let avatar = gravatar_url(&email);
        Self {
            id: ObjectId::new(),
            name,
            email,
            password_hash,
            role: UserRole::User,
            is_group_member: false,
            avatar,
            bio: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins and group members publish without moderation
    pub fn is_trusted(&self) -> bool {
        self.is_admin() || self.is_group_member
    }

    /// Owners and admins may modify a resource
    pub fn can_manage(&self, owner_id: ObjectId) -> bool {
        self.is_admin() || self.id == owner_id
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> ObjectId {
        self.id
    }

    fn indexes() -> &'static [IndexSpec] {
        &[IndexSpec {
            fields: &["email"],
            unique: true,
        }]
    }
}

/// Gravatar image URL for an email (identicon fallback)
pub fn gravatar_url(email: &str) -> String {
    let digest = md5::compute(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{:x}?s=200&d=identicon", digest)
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Enum)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravatar_is_case_insensitive() {
        assert_eq!(gravatar_url("Ada@Example.org "), gravatar_url("ada@example.org"));
        assert!(gravatar_url("ada@example.org").starts_with("https://www.gravatar.com/avatar/"));
    }

    #[test]
    fn test_permissions() {
        let mut user = User::new("Ada".into(), "ada@example.org".into(), "h".into());
        let other = ObjectId::new();

        assert!(user.can_manage(user.id));
        assert!(!user.can_manage(other));
        assert!(!user.is_trusted());

        user.is_group_member = true;
        assert!(user.is_trusted());
        assert!(!user.can_manage(other));

        user.role = UserRole::Admin;
        assert!(user.can_manage(other));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("editor".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_stored_document_shape() {
        let user = User::new("Ada".into(), "ada@example.org".into(), "h".into());
        let doc = bson::to_document(&user).unwrap();
        assert_eq!(doc.get_object_id("_id").unwrap(), user.id);
        assert_eq!(doc.get_str("role").unwrap(), "user");
        assert!(doc.get_datetime("created_at").is_ok());
    }
}
