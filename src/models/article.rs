//! Article model
//!
//! This module provides:
//! - `Article` entity with its embedded comments
//! - `ArticleStatus` for the review workflow states
//! - `Chapter`, the magazine section an article belongs to
//! - Input and filter types for creating, editing and listing articles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Comment, TalentCategory};

/// Article entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier
    pub id: i64,
    /// Article title
    pub title: String,
    /// Talent category
    pub category: TalentCategory,
    /// Magazine chapter
    pub chapter: Chapter,
    /// Body text
    pub content: String,
    /// Author user ID
    pub author_id: i64,
    /// Author display name
    #[serde(default)]
    pub author_name: Option<String>,
    /// Image reference
    #[serde(default)]
    pub image_url: Option<String>,
    /// Review status
    pub status: ArticleStatus,
    /// Reviewer's reason, present only while rejected
    #[serde(default)]
    pub rejection_reason: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Publication timestamp, present only while published
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Comments, oldest first
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Article {
    /// Whether the status-dependent fields agree with the status.
    pub fn is_consistent(&self) -> bool {
        let published_ok = (self.status == ArticleStatus::Published) == self.published_at.is_some();
        let rejected_ok =
            (self.status == ArticleStatus::Rejected) == self.rejection_reason.is_some();
        published_ok && rejected_ok
    }

    pub fn matches(&self, filter: &ArticleFilter) -> bool {
        filter.status.map_or(true, |s| s == self.status)
            && filter.category.map_or(true, |c| c == self.category)
            && filter.chapter.map_or(true, |c| c == self.chapter)
            && filter.author_id.map_or(true, |a| a == self.author_id)
    }
}

/// Review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Saved by the author, not yet submitted
    Draft,
    /// Waiting for a teacher or admin
    Pending,
    /// Visible in the magazine
    Published,
    /// Sent back to the author with a reason
    Rejected,
}

impl Default for ArticleStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 4] = [
        ArticleStatus::Draft,
        ArticleStatus::Pending,
        ArticleStatus::Published,
        ArticleStatus::Rejected,
    ];

    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Pending => "pending",
            ArticleStatus::Published => "published",
            ArticleStatus::Rejected => "rejected",
        }
    }

    /// Parse status from database string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(ArticleStatus::Draft),
            "pending" => Some(ArticleStatus::Pending),
            "published" => Some(ArticleStatus::Published),
            "rejected" => Some(ArticleStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Magazine chapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chapter {
    Portfolios,
    Experiences,
    Positioning,
}

impl Chapter {
    pub const ALL: [Chapter; 3] = [Chapter::Portfolios, Chapter::Experiences, Chapter::Positioning];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chapter::Portfolios => "portfolios",
            Chapter::Experiences => "experiences",
            Chapter::Positioning => "positioning",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Chapter::ALL.into_iter().find(|c| c.as_str() == s.to_lowercase())
    }
}

impl std::fmt::Display for Chapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for creating a new article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub category: TalentCategory,
    pub chapter: Chapter,
    pub content: String,
    /// Either `draft` or `pending`
    #[serde(default)]
    pub status: ArticleStatus,
    /// Data URL (`data:image/png;base64,...`), resolved by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    /// Already-hosted image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewArticle {
    pub fn new(
        title: impl Into<String>,
        category: TalentCategory,
        chapter: Chapter,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            category,
            chapter,
            content: content.into(),
            status: ArticleStatus::Draft,
            image_base64: None,
            image_url: None,
        }
    }

    /// Submit for review right away instead of saving a draft.
    pub fn submitted(mut self) -> Self {
        self.status = ArticleStatus::Pending;
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_image_base64(mut self, data_url: impl Into<String>) -> Self {
        self.image_base64 = Some(data_url.into());
        self
    }
}

/// Edited fields of an existing article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleEdit {
    pub title: String,
    pub category: TalentCategory,
    pub chapter: Chapter,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Also send the article to review (`draft`/`rejected` → `pending`)
    #[serde(default)]
    pub submit: bool,
}

/// Listing filter. Every field is optional and they combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ArticleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TalentCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<Chapter>,
    #[serde(default, rename = "user_id", skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
}

impl ArticleFilter {
    pub fn with_status(mut self, status: ArticleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category: TalentCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_chapter(mut self, chapter: Chapter) -> Self {
        self.chapter = Some(chapter);
        self
    }

    pub fn with_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(status: ArticleStatus) -> Article {
        let now = Utc::now();
        Article {
            id: 1,
            title: "Title".into(),
            category: TalentCategory::Musical,
            chapter: Chapter::Experiences,
            content: "content".into(),
            author_id: 3,
            author_name: None,
            image_url: None,
            status,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            published_at: None,
            comments: Vec::new(),
        }
    }

    #[test]
    fn test_status_from_str() {
        for status in ArticleStatus::ALL {
            assert_eq!(ArticleStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ArticleStatus::from_str("PUBLISHED"), Some(ArticleStatus::Published));
        assert_eq!(ArticleStatus::from_str("archived"), None);
    }

    #[test]
    fn test_consistency() {
        let mut a = article(ArticleStatus::Published);
        assert!(!a.is_consistent());
        a.published_at = Some(Utc::now());
        assert!(a.is_consistent());

        let mut r = article(ArticleStatus::Rejected);
        assert!(!r.is_consistent());
        r.rejection_reason = Some("needs sources".into());
        assert!(r.is_consistent());
    }

    #[test]
    fn test_filter_matching() {
        let a = article(ArticleStatus::Pending);
        assert!(a.matches(&ArticleFilter::default()));
        let filter = ArticleFilter::default()
            .with_author(3)
            .with_chapter(Chapter::Experiences);
        assert!(a.matches(&filter));
        assert!(!a.matches(&ArticleFilter::default().with_status(ArticleStatus::Published)));
        assert!(!a.matches(&ArticleFilter::default().with_category(TalentCategory::Sporting)));
    }

    #[test]
    fn test_filter_wire_name() {
        let filter = ArticleFilter::default().with_author(7).with_status(ArticleStatus::Draft);
        let json = serde_json::to_value(filter).unwrap();
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["status"], "draft");
        assert!(json.get("chapter").is_none());
    }
}
