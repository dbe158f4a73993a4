//! User model
//!
//! Defines the magazine's users: students who write, teachers and admins who
//! review, and parents who only read the published magazine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered portal user.
///
/// Users are never hard-deleted; admins deactivate them instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Login name (unique)
    pub username: String,
    /// Plaintext credential.
    ///
    /// The server never returns it. Users created on this device keep it so an
    /// offline login can be checked against the cached copy. Stored and compared
    /// verbatim: a known weakness, kept for compatibility with existing accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Display name
    pub name: String,
    /// Role
    pub role: UserRole,
    /// Talent tag, only meaningful for students
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talent: Option<TalentCategory>,
    /// Whether the account may log in
    #[serde(default = "default_active")]
    pub active: bool,
    /// Last successful login
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Copy of the user safe to hand out (credential removed).
    pub fn without_password(&self) -> Self {
        Self {
            password: None,
            ..self.clone()
        }
    }
}

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
    Admin,
    Parent,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [
        UserRole::Student,
        UserRole::Teacher,
        UserRole::Admin,
        UserRole::Parent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Admin => "admin",
            UserRole::Parent => "parent",
        }
    }

    /// Teachers and admins review pending articles.
    pub fn can_review(&self) -> bool {
        matches!(self, UserRole::Teacher | UserRole::Admin)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Student
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
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "teacher" => Ok(UserRole::Teacher),
            "admin" => Ok(UserRole::Admin),
            "parent" => Ok(UserRole::Parent),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Talent category, shared by students and the articles they write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TalentCategory {
    Sporting,
    Musical,
    Mathematical,
    Linguistic,
    Technological,
    Artistic,
}

impl TalentCategory {
    pub const ALL: [TalentCategory; 6] = [
        TalentCategory::Sporting,
        TalentCategory::Musical,
        TalentCategory::Mathematical,
        TalentCategory::Linguistic,
        TalentCategory::Technological,
        TalentCategory::Artistic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TalentCategory::Sporting => "sporting",
            TalentCategory::Musical => "musical",
            TalentCategory::Mathematical => "mathematical",
            TalentCategory::Linguistic => "linguistic",
            TalentCategory::Technological => "technological",
            TalentCategory::Artistic => "artistic",
        }
    }
}

impl fmt::Display for TalentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TalentCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TalentCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Invalid talent category: {}", s))
    }
}

/// Input for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    pub talent: Option<TalentCategory>,
}

impl NewUser {
    /// Collect every violated rule.
    pub fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().chars().count() < 2 {
            errors.push("Name must be at least 2 characters".to_string());
        }
        if self.username.trim().chars().count() < 3 {
            errors.push("Username must be at least 3 characters".to_string());
        }
        if self.password.chars().count() < 3 {
            errors.push("Password must be at least 3 characters".to_string());
        }
        errors
    }

    /// Talent is dropped for anyone who is not a student.
    pub fn effective_talent(&self) -> Option<TalentCategory> {
        match self.role {
            UserRole::Student => self.talent,
            _ => None,
        }
    }
}
