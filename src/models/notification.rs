//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message shown on a user's dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    /// Recipient
    pub user_id: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub read: bool,
    /// View to open when the notification is clicked
    #[serde(default)]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Visual severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Danger,
}

impl Default for NotificationType {
    fn default() -> Self {
        Self::Info
    }
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Success => "success",
            NotificationType::Warning => "warning",
            NotificationType::Danger => "danger",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(NotificationType::Info),
            "success" => Some(NotificationType::Success),
            "warning" => Some(NotificationType::Warning),
            "danger" => Some(NotificationType::Danger),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    #[serde(default)]
    pub link: Option<String>,
}

impl NewNotification {
    pub fn new(
        user_id: i64,
        title: impl Into<String>,
        content: impl Into<String>,
        kind: NotificationType,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            content: content.into(),
            kind,
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}
