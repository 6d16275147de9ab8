//! Moderation & threading engine.
//!
//! Comments form reply trees through `replied_id`. Submission enforces the
//! comment gate and same-post reply linkage, decides the single
//! notification event for the submission, and presets the moderation gate
//! for admin-authored comments. Deletion removes the whole reply subtree
//! in one transaction.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db::models::{Comment, NewComment};
use crate::error::{AppError, Result};
use crate::notify::Notification;
use crate::posts;

/// Moderation-queue filter, matching the admin panel's `?filter=` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentFilter {
    #[default]
    All,
    Unreviewed,
    Admin,
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Comment> {
    sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, author, email, site, body, from_admin, reviewed, post_id, replied_id, created_at
        FROM comments
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("comment", id))
}

/// Submit a comment on a post.
///
/// Preconditions enforced here: the post exists and its comment gate is
/// open (admins included); a reply target exists and belongs to the same
/// post. `reviewed` starts true exactly when the comment is admin-authored.
///
/// Returns the stored comment together with the notification decision for
/// this submission - a reply notifies the parent comment's author, anything
/// else from a visitor notifies the operator, an admin comment that is not
/// a reply notifies nobody. Never more than one event.
pub async fn submit(
    pool: &SqlitePool,
    post_id: i64,
    new: NewComment,
) -> Result<(Comment, Option<Notification>)> {
    let post = posts::get(pool, post_id).await?;

    if !post.can_comment {
        return Err(AppError::CommentingDisabled);
    }

    let parent = match new.replied_id {
        Some(replied_id) => {
            let parent = get(pool, replied_id).await?;
            if parent.post_id != post_id {
                return Err(AppError::InvalidReference(format!(
                    "comment {} belongs to post {}, not post {}",
                    replied_id, parent.post_id, post_id
                )));
            }
            Some(parent)
        }
        None => None,
    };

    let reviewed = new.from_admin;
    let created_at = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO comments (author, email, site, body, from_admin, reviewed, post_id, replied_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.author)
    .bind(&new.email)
    .bind(&new.site)
    .bind(&new.body)
    .bind(new.from_admin)
    .bind(reviewed)
    .bind(post_id)
    .bind(new.replied_id)
    .bind(created_at)
    .execute(pool)
    .await?;

    let comment = Comment {
        id: result.last_insert_rowid(),
        author: new.author,
        email: new.email,
        site: new.site,
        body: new.body,
        from_admin: new.from_admin,
        reviewed,
        post_id,
        replied_id: new.replied_id,
        created_at,
    };

    let notification = match parent {
        Some(parent) => Some(Notification::NewReplyToComment {
            post_id,
            post_title: post.title,
            to_email: parent.email,
        }),
        None if !comment.from_admin => Some(Notification::NewCommentOnPost {
            post_id,
            post_title: post.title,
        }),
        None => None,
    };

    Ok((comment, notification))
}

/// Open the moderation gate. Approving an already-reviewed comment is a
/// no-op success.
pub async fn approve(pool: &SqlitePool, id: i64) -> Result<()> {
    let comment = get(pool, id).await?;

    if comment.reviewed {
        return Ok(());
    }

    sqlx::query("UPDATE comments SET reviewed = TRUE WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Delete a comment and, transitively, every reply under it.
///
/// The subtree is collected breadth-first over ids before anything is
/// removed, then deleted in a single transaction.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    get(pool, id).await?;

    let mut doomed = vec![id];
    let mut frontier = vec![id];

    while !frontier.is_empty() {
        let placeholders = vec!["?"; frontier.len()].join(", ");
        let sql = format!("SELECT id FROM comments WHERE replied_id IN ({placeholders})");

        let mut query = sqlx::query_as::<_, (i64,)>(&sql);
        for parent_id in &frontier {
            query = query.bind(parent_id);
        }
        let children = query.fetch_all(pool).await?;

        frontier = children.into_iter().map(|(child_id,)| child_id).collect();
        doomed.extend(&frontier);
    }

    let mut tx = pool.begin().await?;

    let placeholders = vec!["?"; doomed.len()].join(", ");
    let sql = format!("DELETE FROM comments WHERE id IN ({placeholders})");
    let mut query = sqlx::query(&sql);
    for doomed_id in &doomed {
        query = query.bind(doomed_id);
    }
    query.execute(&mut *tx).await?;

    tx.commit().await?;

    tracing::info!(comment_id = id, removed = doomed.len(), "comment deleted");
    Ok(())
}

/// Comments of a post, newest first (id breaks timestamp ties). Unreviewed
/// comments are filtered out unless the caller is privileged.
pub async fn visible(
    pool: &SqlitePool,
    post_id: i64,
    include_unreviewed: bool,
    page: i64,
    per_page: i64,
) -> Result<(Vec<Comment>, i64)> {
    posts::get(pool, post_id).await?;

    let (_, per_page, offset) = posts::page_window(page, per_page);

    let comments = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, author, email, site, body, from_admin, reviewed, post_id, replied_id, created_at
        FROM comments
        WHERE post_id = ? AND (reviewed = TRUE OR ?)
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(post_id)
    .bind(include_unreviewed)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM comments WHERE post_id = ? AND (reviewed = TRUE OR ?)",
    )
    .bind(post_id)
    .bind(include_unreviewed)
    .fetch_one(pool)
    .await?;

    Ok((comments, total.0))
}

/// The admin moderation queue across all posts.
pub async fn list_all(
    pool: &SqlitePool,
    filter: CommentFilter,
    page: i64,
    per_page: i64,
) -> Result<(Vec<Comment>, i64)> {
    let (_, per_page, offset) = posts::page_window(page, per_page);

    let condition = match filter {
        CommentFilter::All => "1 = 1",
        CommentFilter::Unreviewed => "reviewed = FALSE",
        CommentFilter::Admin => "from_admin = TRUE",
    };

    let sql = format!(
        r#"
        SELECT id, author, email, site, body, from_admin, reviewed, post_id, replied_id, created_at
        FROM comments
        WHERE {condition}
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#
    );

    let comments = sqlx::query_as::<_, Comment>(&sql)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let count_sql = format!("SELECT COUNT(*) FROM comments WHERE {condition}");
    let total: (i64,) = sqlx::query_as(&count_sql).fetch_one(pool).await?;

    Ok((comments, total.0))
}

/// Number of comments still waiting for review, shown as the admin badge.
pub async fn unreviewed_count(pool: &SqlitePool) -> Result<i64> {
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM comments WHERE reviewed = FALSE")
            .fetch_one(pool)
            .await?;
    Ok(count.0)
}
