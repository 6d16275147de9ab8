/**
 * Blog Routes
 * Public endpoints: post listing, post detail with comments, comment
 * submission, categories, sidebar links, about.
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{
    self,
    models::{Admin, Category, Comment, NewComment, Post},
};
use crate::routes::auth::authenticated_claims;
use crate::routes::ErrorResponse;
use crate::{categories, comments, notify, posts};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for paginated listings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

/// Post summary (for list views; the body stays on the detail endpoint)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub category_id: i64,
    pub can_comment: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Post> for PostSummary {
    fn from(p: Post) -> Self {
        Self {
            id: p.id,
            title: p.title,
            category_id: p.category_id,
            can_comment: p.can_comment,
            created_at: p.created_at,
        }
    }
}

/// Response for paginated post listings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListResponse {
    pub items: Vec<PostSummary>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Comment as shown to readers; the author's email stays private.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicComment {
    pub id: i64,
    pub author: String,
    pub site: Option<String>,
    pub body: String,
    pub from_admin: bool,
    pub reviewed: bool,
    pub post_id: i64,
    pub replied_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for PublicComment {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            author: c.author,
            site: c.site,
            body: c.body,
            from_admin: c.from_admin,
            reviewed: c.reviewed,
            post_id: c.post_id,
            replied_id: c.replied_id,
            created_at: c.created_at,
        }
    }
}

/// One page of comments embedded in a post detail response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub items: Vec<PublicComment>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Full post detail with its category and a page of visible comments
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetailResponse {
    pub post: Post,
    pub category: Category,
    pub comments: CommentPage,
}

/// Query parameters for GET /api/posts/{id}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetailQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    /// Honored only for requests carrying a valid admin token.
    #[serde(default)]
    pub include_unreviewed: bool,
}

/// Request body for POST /api/posts/{id}/comments
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub author: Option<String>,
    pub email: Option<String>,
    pub site: Option<String>,
    pub body: String,
    pub reply_to: Option<i64>,
}

/// Blog identity for the public about page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutResponse {
    pub blog_title: String,
    pub blog_sub_title: String,
    pub name: String,
    pub about: String,
    /// Moderation badge, present only for the authenticated operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unreviewed_comments: Option<i64>,
}

// ============================================================================
// Helpers
// ============================================================================

fn bad_request(error: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
            message: None,
        }),
    )
        .into_response()
}

pub(crate) fn database_unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "Database not available".to_string(),
            message: None,
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/posts - List posts with pagination, newest first
pub async fn list_posts(Query(query): Query<PageQuery>) -> Response {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match posts::list(&pool, query.page, query.page_size).await {
        Ok((items, total)) => (
            StatusCode::OK,
            Json(PostListResponse {
                items: items.into_iter().map(PostSummary::from).collect(),
                page: query.page.max(1),
                page_size: query.page_size.clamp(1, 100),
                total,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/posts/{id} - Post detail with a page of its comments
pub async fn get_post(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<PostDetailQuery>,
) -> Response {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    let post = match posts::get(&pool, id).await {
        Ok(post) => post,
        Err(e) => return e.into_response(),
    };

    let category = match categories::get(&pool, post.category_id).await {
        Ok(category) => category,
        Err(e) => return e.into_response(),
    };

    let include_unreviewed =
        query.include_unreviewed && authenticated_claims(&headers).is_some();

    match comments::visible(&pool, id, include_unreviewed, query.page, query.page_size).await {
        Ok((items, total)) => (
            StatusCode::OK,
            Json(PostDetailResponse {
                post,
                category,
                comments: CommentPage {
                    items: items.into_iter().map(PublicComment::from).collect(),
                    page: query.page.max(1),
                    page_size: query.page_size.clamp(1, 100),
                    total,
                },
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/posts/{id}/comments - Submit a comment or a reply
///
/// Visitors must provide author and email. With a valid admin token the
/// comment is admin-authored: identity comes from the admin profile, and it
/// is published without review.
pub async fn create_comment(
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Response {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    if payload.body.trim().is_empty() {
        return bad_request("Comment body is required");
    }

    let new = if authenticated_claims(&headers).is_some() {
        let admin = match sqlx::query_as::<_, Admin>(
            "SELECT id, username, password_hash, blog_title, blog_sub_title, name, about FROM admins LIMIT 1",
        )
        .fetch_optional(pool.as_ref())
        .await
        {
            Ok(Some(admin)) => admin,
            Ok(None) => return bad_request("No admin account configured"),
            Err(e) => {
                tracing::error!("Database error loading admin profile: {}", e);
                return crate::error::AppError::Storage(e).into_response();
            }
        };

        NewComment {
            author: admin.name,
            email: notify::NotifyConfig::default().operator_email,
            site: None,
            body: ammonia::clean(&payload.body),
            from_admin: true,
            replied_id: payload.reply_to,
        }
    } else {
        let author = payload.author.unwrap_or_default();
        let email = payload.email.unwrap_or_default();

        if author.trim().is_empty() {
            return bad_request("Author name is required");
        }
        if email.trim().is_empty() || !email.contains('@') {
            return bad_request("A valid email address is required");
        }

        NewComment {
            author,
            email,
            site: payload.site.filter(|s| !s.trim().is_empty()),
            body: ammonia::clean(&payload.body),
            from_admin: false,
            replied_id: payload.reply_to,
        }
    };

    match comments::submit(&pool, post_id, new).await {
        Ok((comment, notification)) => {
            if let Some(notification) = notification {
                notify::dispatch(notification);
            }
            (StatusCode::CREATED, Json(PublicComment::from(comment))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /api/categories - Sidebar category listing
pub async fn list_categories() -> Response {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match categories::list(&pool).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/categories/{id}/posts - Posts of one category, paginated
pub async fn category_posts(Path(id): Path<i64>, Query(query): Query<PageQuery>) -> Response {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match posts::list_by_category(&pool, id, query.page, query.page_size).await {
        Ok((items, total)) => (
            StatusCode::OK,
            Json(PostListResponse {
                items: items.into_iter().map(PostSummary::from).collect(),
                page: query.page.max(1),
                page_size: query.page_size.clamp(1, 100),
                total,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/links - Sidebar links
pub async fn list_links() -> Response {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match sqlx::query_as::<_, crate::db::models::Link>(
        "SELECT id, name, url FROM links ORDER BY id ASC",
    )
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(links) => (StatusCode::OK, Json(links)).into_response(),
        Err(e) => {
            tracing::error!("Database error fetching links: {}", e);
            crate::error::AppError::Storage(e).into_response()
        }
    }
}

/// GET /api/about - Blog identity; includes the moderation badge for the
/// authenticated operator
pub async fn about(headers: HeaderMap) -> Response {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    let admin = match sqlx::query_as::<_, Admin>(
        "SELECT id, username, password_hash, blog_title, blog_sub_title, name, about FROM admins LIMIT 1",
    )
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(admin)) => admin,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "No admin account configured".to_string(),
                    message: None,
                }),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching admin profile: {}", e);
            return crate::error::AppError::Storage(e).into_response();
        }
    };

    let unreviewed_comments = if authenticated_claims(&headers).is_some() {
        comments::unreviewed_count(&pool).await.ok()
    } else {
        None
    };

    (
        StatusCode::OK,
        Json(AboutResponse {
            blog_title: admin.blog_title,
            blog_sub_title: admin.blog_sub_title,
            name: admin.name,
            about: admin.about,
            unreviewed_comments,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 10);
    }

    #[test]
    fn test_post_summary_drops_body() {
        let summary = PostSummary::from(Post {
            id: 1,
            title: "T".into(),
            body: "very long body".into(),
            can_comment: true,
            category_id: 1,
            created_at: Utc::now(),
        });
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("very long body"));
        assert!(json.contains("\"title\":\"T\""));
    }

    #[test]
    fn test_comment_request_accepts_reply_field() {
        let req: CreateCommentRequest = serde_json::from_str(
            r#"{"author":"A","email":"a@b.c","body":"hi","replyTo":3}"#,
        )
        .unwrap();
        assert_eq!(req.reply_to, Some(3));
    }
}
