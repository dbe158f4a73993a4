//! Database repositories
//!
//! One repository per table, each a trait plus its SQLx implementation.

pub mod article;
pub mod comment;
pub mod notification;
pub mod user;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use user::{SqlxUserRepository, UserRepository};
