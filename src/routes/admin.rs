/**
 * Admin Routes
 * Bearer-token guarded management endpoints: posts, comment moderation,
 * categories, sidebar links and blog settings.
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::comments::CommentFilter;
use crate::db::{
    self,
    models::{Admin, Link, NewLink, NewPost, UpdateLink, UpdatePost, UpdateSettings},
};
use crate::routes::auth::verify_auth;
use crate::routes::blog::database_unavailable;
use crate::routes::{ErrorResponse, SuccessResponse};
use crate::{categories, comments, posts};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationQuery {
    #[serde(default)]
    pub filter: CommentFilter,
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

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentGateResponse {
    pub can_comment: bool,
}

/// Moderation queue page; unlike the public view this keeps the commenter
/// email, which the operator needs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationPage {
    pub items: Vec<crate::db::models::Comment>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

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

// ============================================================================
// Posts
// ============================================================================

/// POST /api/admin/posts - Create a post
pub async fn create_post(headers: HeaderMap, Json(mut payload): Json<NewPost>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    if payload.title.trim().is_empty() {
        return bad_request("Title is required");
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    payload.body = ammonia::clean(&payload.body);

    match posts::create(&pool, payload).await {
        Ok(post) => (StatusCode::CREATED, Json(post)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PATCH /api/admin/posts/{id} - Update title, body or category
pub async fn update_post(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(mut payload): Json<UpdatePost>,
) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    if let Some(title) = &payload.title {
        if title.trim().is_empty() {
            return bad_request("Title cannot be empty");
        }
    }
    payload.body = payload.body.map(|b| ammonia::clean(&b));

    match posts::update(&pool, id, payload).await {
        Ok(post) => (StatusCode::OK, Json(post)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /api/admin/posts/{id} - Delete a post and its comments
pub async fn delete_post(headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match posts::delete(&pool, id).await {
        Ok(()) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/admin/posts/{id}/set-comment - Toggle the comment gate
pub async fn set_comment_gate(headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match posts::toggle_comment_gate(&pool, id).await {
        Ok(can_comment) => {
            (StatusCode::OK, Json(CommentGateResponse { can_comment })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Comment moderation
// ============================================================================

/// GET /api/admin/comments?filter=all|unreviewed|admin - Moderation queue
pub async fn manage_comments(headers: HeaderMap, Query(query): Query<ModerationQuery>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match comments::list_all(&pool, query.filter, query.page, query.page_size).await {
        Ok((items, total)) => (
            StatusCode::OK,
            Json(ModerationPage {
                items,
                page: query.page.max(1),
                page_size: query.page_size.clamp(1, 100),
                total,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/admin/comments/{id}/approve - Open the moderation gate
pub async fn approve_comment(headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match comments::approve(&pool, id).await {
        Ok(()) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /api/admin/comments/{id} - Delete a comment and its reply tree
pub async fn delete_comment(headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match comments::delete(&pool, id).await {
        Ok(()) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Categories
// ============================================================================

/// POST /api/admin/categories - Create a category
pub async fn create_category(headers: HeaderMap, Json(payload): Json<CategoryRequest>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    if payload.name.trim().is_empty() {
        return bad_request("Category name is required");
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match categories::create(&pool, &payload.name).await {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PATCH /api/admin/categories/{id} - Rename a category
pub async fn rename_category(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryRequest>,
) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    if payload.name.trim().is_empty() {
        return bad_request("Category name is required");
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match categories::rename(&pool, id, &payload.name).await {
        Ok(category) => (StatusCode::OK, Json(category)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /api/admin/categories/{id} - Delete a category; its posts move to
/// the default category
pub async fn delete_category(headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match categories::delete(&pool, id).await {
        Ok(()) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Links
// ============================================================================

/// POST /api/admin/links - Create a sidebar link
pub async fn create_link(headers: HeaderMap, Json(payload): Json<NewLink>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    if payload.name.trim().is_empty() || payload.url.trim().is_empty() {
        return bad_request("Link name and url are required");
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match sqlx::query("INSERT INTO links (name, url) VALUES (?, ?)")
        .bind(&payload.name)
        .bind(&payload.url)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) => (
            StatusCode::CREATED,
            Json(Link {
                id: result.last_insert_rowid(),
                name: payload.name,
                url: payload.url,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error creating link: {}", e);
            crate::error::AppError::Storage(e).into_response()
        }
    }
}

/// PATCH /api/admin/links/{id} - Update a sidebar link
pub async fn update_link(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateLink>,
) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    let existing = match sqlx::query_as::<_, Link>("SELECT id, name, url FROM links WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(link)) => link,
        Ok(None) => return crate::error::AppError::NotFound("link", id).into_response(),
        Err(e) => {
            tracing::error!("Database error fetching link: {}", e);
            return crate::error::AppError::Storage(e).into_response();
        }
    };

    let name = payload.name.unwrap_or(existing.name);
    let url = payload.url.unwrap_or(existing.url);

    match sqlx::query("UPDATE links SET name = ?, url = ? WHERE id = ?")
        .bind(&name)
        .bind(&url)
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(_) => (StatusCode::OK, Json(Link { id, name, url })).into_response(),
        Err(e) => {
            tracing::error!("Database error updating link: {}", e);
            crate::error::AppError::Storage(e).into_response()
        }
    }
}

/// DELETE /api/admin/links/{id} - Delete a sidebar link
pub async fn delete_link(headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match sqlx::query("DELETE FROM links WHERE id = ?")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) if result.rows_affected() == 0 => {
            crate::error::AppError::NotFound("link", id).into_response()
        }
        Ok(_) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => {
            tracing::error!("Database error deleting link: {}", e);
            crate::error::AppError::Storage(e).into_response()
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// GET /api/admin/settings - Current blog settings
pub async fn get_settings(headers: HeaderMap) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match sqlx::query_as::<_, Admin>(
        "SELECT id, username, password_hash, blog_title, blog_sub_title, name, about FROM admins LIMIT 1",
    )
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(admin)) => (StatusCode::OK, Json(admin)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No admin account configured".to_string(),
                message: None,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching settings: {}", e);
            crate::error::AppError::Storage(e).into_response()
        }
    }
}

/// PATCH /api/admin/settings - Update blog title, subtitle, display name,
/// about text
pub async fn update_settings(headers: HeaderMap, Json(payload): Json<UpdateSettings>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    let existing = match sqlx::query_as::<_, Admin>(
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
            tracing::error!("Database error fetching settings: {}", e);
            return crate::error::AppError::Storage(e).into_response();
        }
    };

    let blog_title = payload.blog_title.unwrap_or(existing.blog_title);
    let blog_sub_title = payload.blog_sub_title.unwrap_or(existing.blog_sub_title);
    let name = payload.name.unwrap_or(existing.name);
    let about = payload.about.unwrap_or(existing.about);

    match sqlx::query(
        "UPDATE admins SET blog_title = ?, blog_sub_title = ?, name = ?, about = ? WHERE id = ?",
    )
    .bind(&blog_title)
    .bind(&blog_sub_title)
    .bind(&name)
    .bind(&about)
    .bind(existing.id)
    .execute(pool.as_ref())
    .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(Admin {
                blog_title,
                blog_sub_title,
                name,
                about,
                ..existing
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error updating settings: {}", e);
            crate::error::AppError::Storage(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handlers_require_auth() {
        let response = create_category(
            HeaderMap::new(),
            Json(CategoryRequest { name: "Tech".into() }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = delete_comment(HeaderMap::new(), Path(1)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = get_settings(HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_moderation_query_defaults_to_all() {
        let query: ModerationQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.filter, CommentFilter::All);
        assert_eq!(query.page, 1);

        let query: ModerationQuery =
            serde_json::from_str(r#"{"filter":"unreviewed"}"#).unwrap();
        assert_eq!(query.filter, CommentFilter::Unreviewed);

        let query: ModerationQuery = serde_json::from_str(r#"{"filter":"admin"}"#).unwrap();
        assert_eq!(query.filter, CommentFilter::Admin);
    }
}
