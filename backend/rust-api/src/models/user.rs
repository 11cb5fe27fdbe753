use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;

/// User record stored in the "users" collection.
///
/// `subject` is the identifier issued by the external identity provider;
/// `id` is the internal learner id every other record refers to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub subject: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(subject: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: super::new_id(),
            subject: subject.into(),
            email: email.into(),
            role,
            created_at: Utc::now(),
        }
    }

    /// Local part of the email, used where no display name exists.
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    #[default]
    Learner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Learner => "learner",
        }
    }
}

/// Authenticated principal handed over by the identity provider.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterProfileRequest {
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterProfileResponse {
    pub message: &'static str,
    pub role: Role,
}

/// User profile returned to client
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: user.id,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}
