//! Data models
//!
//! Entities shared by the client core, the local snapshot and the server:
//! users, articles with their comments, notifications and game statistics.

mod article;
mod comment;
mod game_stat;
mod notification;
mod user;

pub use article::{Article, ArticleEdit, ArticleFilter, ArticleStatus, Chapter, NewArticle};
pub use comment::{Comment, NewComment};
pub use game_stat::{GameKind, GameOutcome, GameStat};
pub use notification::{NewNotification, Notification, NotificationType};
pub use user::{NewUser, TalentCategory, User, UserRole};
