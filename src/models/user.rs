use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::require_text;
use super::{Role, ValidationResult};

/// Avatar assigned to users who register without one
pub const DEFAULT_PHOTO_URL: &str = "https://i.ibb.co/4pDNDk1/avatar.png";

/// Registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub role: Role,
}

/// User fields as submitted by a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDraft {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub role: Option<Role>,
}

/// Response of the admin check endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    pub is_admin: bool,
}

impl UserDraft {
    /// Email of the draft, if present and non-blank
    pub fn email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Validate the draft and fill in defaults for `photoURL` and `role`
    pub fn into_user(self, id: String) -> ValidationResult<User> {
        let email = require_text("email", &self.email)?;

        let photo_url = self
            .photo_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PHOTO_URL.to_string());

        Ok(User {
            id,
            name: self.name,
            email,
            photo_url,
            role: self.role.unwrap_or_default(),
        })
    }

    /// Validate into a user with a freshly generated id
    pub fn into_new_user(self) -> ValidationResult<User> {
        self.into_user(Uuid::new_v4().to_string())
    }
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
