//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The blog operator. The table permits multiple rows but the application
/// treats the first row as the one meaningful account.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub blog_title: String,
    pub blog_sub_title: String,
    pub name: String,
    pub about: String,
}

/// Partial settings update for the admin profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettings {
    pub blog_title: Option<String>,
    pub blog_sub_title: Option<String>,
    pub name: Option<String>,
    pub about: Option<String>,
}

/// Post category. Id 1 is the default category and can never be renamed or
/// deleted; posts of a deleted category are reassigned to it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Blog post model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub can_comment: bool,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
}

/// New blog post for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub category_id: i64,
}

/// Blog post update; `created_at` is immutable and has no field here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePost {
    pub title: Option<String>,
    pub body: Option<String>,
    pub category_id: Option<i64>,
}

/// A comment on a post. `replied_id` links a reply to its parent comment on
/// the same post; `reviewed` is the moderation gate controlling public
/// visibility.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub author: String,
    pub email: String,
    pub site: Option<String>,
    pub body: String,
    pub from_admin: bool,
    pub reviewed: bool,
    pub post_id: i64,
    pub replied_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// New comment for submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub author: String,
    pub email: String,
    pub site: Option<String>,
    pub body: String,
    pub from_admin: bool,
    pub replied_id: Option<i64>,
}

/// Sidebar link model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub name: String,
    pub url: String,
}

/// New sidebar link for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLink {
    pub name: String,
    pub url: String,
}

/// Sidebar link update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLink {
    pub name: Option<String>,
    pub url: Option<String>,
}
