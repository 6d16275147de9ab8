//! Category lifecycle.
//!
//! Categories own posts. The default category (id 1, seeded at bootstrap)
//! can never be renamed or deleted; deleting any other category moves its
//! posts to the default category in the same transaction that removes the
//! row, so no post is ever left pointing at a missing category.

use sqlx::SqlitePool;

use crate::db::models::Category;
use crate::error::{AppError, Result};

/// The permanent category that absorbs posts from any deleted category.
pub const DEFAULT_CATEGORY_ID: i64 = 1;

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Category> {
    sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("category", id))
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Category>> {
    let categories =
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name ASC")
            .fetch_all(pool)
            .await?;
    Ok(categories)
}

/// Name collisions are matched case-sensitively and exactly.
async fn name_taken(pool: &SqlitePool, name: &str) -> Result<bool> {
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM categories WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
    Ok(existing.is_some())
}

pub async fn create(pool: &SqlitePool, name: &str) -> Result<Category> {
    if name_taken(pool, name).await? {
        return Err(AppError::DuplicateName(name.to_string()));
    }

    let result = sqlx::query("INSERT INTO categories (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(Category {
        id: result.last_insert_rowid(),
        name: name.to_string(),
    })
}

pub async fn rename(pool: &SqlitePool, id: i64, new_name: &str) -> Result<Category> {
    if id == DEFAULT_CATEGORY_ID {
        return Err(AppError::Protected);
    }

    get(pool, id).await?;

    if name_taken(pool, new_name).await? {
        return Err(AppError::DuplicateName(new_name.to_string()));
    }

    sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
        .bind(new_name)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(Category {
        id,
        name: new_name.to_string(),
    })
}

/// Delete a category, reassigning every post it owns to the default
/// category first. Reassignment and removal commit together or not at all.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    if id == DEFAULT_CATEGORY_ID {
        return Err(AppError::Protected);
    }

    get(pool, id).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE posts SET category_id = ? WHERE category_id = ?")
        .bind(DEFAULT_CATEGORY_ID)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(category_id = id, "category deleted, posts moved to default");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::posts;

    #[tokio::test]
    async fn test_create_and_get() {
        let pool = test_pool().await;

        let tech = create(&pool, "Tech").await.unwrap();
        assert_eq!(tech.id, 2);

        let fetched = get(&pool, tech.id).await.unwrap();
        assert_eq!(fetched.name, "Tech");
    }

    #[tokio::test]
    async fn test_create_duplicate_name_rejected() {
        let pool = test_pool().await;

        let err = create(&pool, "Default").await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateName(ref n) if n == "Default"));
    }

    #[tokio::test]
    async fn test_duplicate_check_is_case_sensitive() {
        let pool = test_pool().await;

        // "default" differs from the seeded "Default" by case only.
        create(&pool, "default").await.unwrap();
    }

    #[tokio::test]
    async fn test_default_category_is_protected() {
        let pool = test_pool().await;

        assert!(matches!(
            rename(&pool, DEFAULT_CATEGORY_ID, "Renamed").await.unwrap_err(),
            AppError::Protected
        ));
        assert!(matches!(
            delete(&pool, DEFAULT_CATEGORY_ID).await.unwrap_err(),
            AppError::Protected
        ));

        let still_there = get(&pool, DEFAULT_CATEGORY_ID).await.unwrap();
        assert_eq!(still_there.name, "Default");
    }

    #[tokio::test]
    async fn test_rename_rejects_taken_name() {
        let pool = test_pool().await;

        let tech = create(&pool, "Tech").await.unwrap();
        create(&pool, "Life").await.unwrap();

        let err = rename(&pool, tech.id, "Life").await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateName(_)));

        // Renaming to its own current name collides with itself.
        let err = rename(&pool, tech.id, "Tech").await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn test_rename_unknown_category() {
        let pool = test_pool().await;

        let err = rename(&pool, 99, "Whatever").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("category", 99)));
    }

    #[tokio::test]
    async fn test_delete_reassigns_posts_to_default() {
        let pool = test_pool().await;

        let tech = create(&pool, "Tech").await.unwrap();
        let post = posts::create(
            &pool,
            crate::db::models::NewPost {
                title: "Hello".into(),
                body: "<p>world</p>".into(),
                category_id: tech.id,
            },
        )
        .await
        .unwrap();
        assert_eq!(post.category_id, tech.id);

        delete(&pool, tech.id).await.unwrap();

        let moved = posts::get(&pool, post.id).await.unwrap();
        assert_eq!(moved.category_id, DEFAULT_CATEGORY_ID);

        let err = get(&pool, tech.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("category", _)));
    }

    #[tokio::test]
    async fn test_delete_unknown_category() {
        let pool = test_pool().await;

        let err = delete(&pool, 42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("category", 42)));
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_name() {
        let pool = test_pool().await;

        create(&pool, "Zig").await.unwrap();
        create(&pool, "Ada").await.unwrap();

        let names: Vec<String> = list(&pool).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Ada", "Default", "Zig"]);
    }
}
