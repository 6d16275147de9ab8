//! Post management.
//!
//! Posts always belong to an existing category and carry their creation
//! timestamp forever; editing never touches it. Deleting a post takes all
//! of its comments with it in one transaction.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::{NewPost, Post, UpdatePost};
use crate::error::{AppError, Result};

const MAX_PAGE_SIZE: i64 = 100;

/// Clamp pagination to sane bounds and return the SQL offset.
pub(crate) fn page_window(page: i64, per_page: i64) -> (i64, i64, i64) {
    let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
    let page = page.max(1);
    (page, per_page, (page - 1) * per_page)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Post> {
    sqlx::query_as::<_, Post>(
        "SELECT id, title, body, can_comment, category_id, created_at FROM posts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("post", id))
}

/// Newest-first page of all posts, plus the total row count.
pub async fn list(pool: &SqlitePool, page: i64, per_page: i64) -> Result<(Vec<Post>, i64)> {
    let (_, per_page, offset) = page_window(page, per_page);

    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, title, body, can_comment, category_id, created_at
        FROM posts
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await?;

    Ok((posts, total.0))
}

pub async fn list_by_category(
    pool: &SqlitePool,
    category_id: i64,
    page: i64,
    per_page: i64,
) -> Result<(Vec<Post>, i64)> {
    crate::categories::get(pool, category_id).await?;

    let (_, per_page, offset) = page_window(page, per_page);

    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, title, body, can_comment, category_id, created_at
        FROM posts
        WHERE category_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(category_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE category_id = ?")
        .bind(category_id)
        .fetch_one(pool)
        .await?;

    Ok((posts, total.0))
}

pub async fn create(pool: &SqlitePool, new: NewPost) -> Result<Post> {
    crate::categories::get(pool, new.category_id).await?;

    let created_at = Utc::now();
    let result = sqlx::query(
        "INSERT INTO posts (title, body, can_comment, category_id, created_at) VALUES (?, ?, TRUE, ?, ?)",
    )
    .bind(&new.title)
    .bind(&new.body)
    .bind(new.category_id)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(Post {
        id: result.last_insert_rowid(),
        title: new.title,
        body: new.body,
        can_comment: true,
        category_id: new.category_id,
        created_at,
    })
}

pub async fn update(pool: &SqlitePool, id: i64, update: UpdatePost) -> Result<Post> {
    let existing = get(pool, id).await?;

    if let Some(category_id) = update.category_id {
        crate::categories::get(pool, category_id).await?;
    }

    let title = update.title.unwrap_or(existing.title);
    let body = update.body.unwrap_or(existing.body);
    let category_id = update.category_id.unwrap_or(existing.category_id);

    sqlx::query("UPDATE posts SET title = ?, body = ?, category_id = ? WHERE id = ?")
        .bind(&title)
        .bind(&body)
        .bind(category_id)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(Post {
        id,
        title,
        body,
        can_comment: existing.can_comment,
        category_id,
        created_at: existing.created_at,
    })
}

/// Delete a post and all of its comments together.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    get(pool, id).await?;

    let mut tx = pool.begin().await?;

    // Replies always live on the same post as their parent, so this
    // removes entire reply trees along with their roots.
    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(post_id = id, "post deleted");
    Ok(())
}

/// Flip the comment gate and return the new state. Existing comments are
/// untouched; only future submissions see the change.
pub async fn toggle_comment_gate(pool: &SqlitePool, id: i64) -> Result<bool> {
    let post = get(pool, id).await?;
    let enabled = !post.can_comment;

    sqlx::query("UPDATE posts SET can_comment = ? WHERE id = ?")
        .bind(enabled)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::DEFAULT_CATEGORY_ID;
    use crate::comments;
    use crate::db::models::NewComment;
    use crate::db::test_pool;

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.into(),
            body: "<p>body</p>".into(),
            category_id: DEFAULT_CATEGORY_ID,
        }
    }

    fn guest_comment(body: &str) -> NewComment {
        NewComment {
            author: "Reader".into(),
            email: "reader@example.com".into(),
            site: None,
            body: body.into(),
            from_admin: false,
            replied_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_requires_existing_category() {
        let pool = test_pool().await;

        let err = create(
            &pool,
            NewPost {
                title: "Orphan".into(),
                body: "".into(),
                category_id: 9,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound("category", 9)));
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let pool = test_pool().await;

        let post = create(&pool, new_post("First")).await.unwrap();
        let updated = update(
            &pool,
            post.id,
            UpdatePost {
                title: Some("Second".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "Second");
        assert_eq!(updated.body, post.body);
        assert_eq!(updated.created_at, post.created_at);
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_category() {
        let pool = test_pool().await;

        let post = create(&pool, new_post("First")).await.unwrap();
        let err = update(
            &pool,
            post.id,
            UpdatePost {
                category_id: Some(77),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound("category", 77)));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_comments() {
        let pool = test_pool().await;

        let post = create(&pool, new_post("Commented")).await.unwrap();
        let (root, _) = comments::submit(&pool, post.id, guest_comment("first"))
            .await
            .unwrap();
        comments::submit(
            &pool,
            post.id,
            NewComment {
                replied_id: Some(root.id),
                ..guest_comment("reply")
            },
        )
        .await
        .unwrap();

        delete(&pool, post.id).await.unwrap();

        assert!(matches!(
            get(&pool, post.id).await.unwrap_err(),
            AppError::NotFound("post", _)
        ));
        let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining.0, 0);
    }

    #[tokio::test]
    async fn test_toggle_comment_gate() {
        let pool = test_pool().await;

        let post = create(&pool, new_post("Gated")).await.unwrap();
        assert!(post.can_comment);

        assert!(!toggle_comment_gate(&pool, post.id).await.unwrap());
        assert!(!get(&pool, post.id).await.unwrap().can_comment);

        assert!(toggle_comment_gate(&pool, post.id).await.unwrap());
        assert!(get(&pool, post.id).await.unwrap().can_comment);
    }

    #[tokio::test]
    async fn test_list_pagination_clamps_input() {
        let pool = test_pool().await;

        for i in 0..3 {
            create(&pool, new_post(&format!("Post {i}"))).await.unwrap();
        }

        let (posts, total) = list(&pool, 0, 1000).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(posts.len(), 3);

        let (posts, _) = list(&pool, 2, 2).await.unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn test_list_by_category_filters() {
        let pool = test_pool().await;

        let tech = crate::categories::create(&pool, "Tech").await.unwrap();
        create(&pool, new_post("Default post")).await.unwrap();
        create(
            &pool,
            NewPost {
                title: "Tech post".into(),
                body: "".into(),
                category_id: tech.id,
            },
        )
        .await
        .unwrap();

        let (posts, total) = list_by_category(&pool, tech.id, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(posts[0].title, "Tech post");

        let err = list_by_category(&pool, 404, 1, 10).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("category", 404)));
    }
}
