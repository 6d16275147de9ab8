pub mod models;

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::OnceCell;

use crate::categories::DEFAULT_CATEGORY_ID;

static DB_POOL: OnceCell<Arc<SqlitePool>> = OnceCell::const_new();

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://blog.db".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        }
    }
}

pub async fn init_pool(config: Option<DbConfig>) -> Result<Arc<SqlitePool>, sqlx::Error> {
    let config = config.unwrap_or_default();

    tracing::info!("Initializing database connection pool...");

    // Cascades are performed in explicit transactions, but the FK pragma
    // still guards against dangling references slipping in elsewhere.
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    let pool = Arc::new(pool);
    let _ = DB_POOL.set(pool.clone());

    Ok(pool)
}

pub fn get_pool() -> Option<Arc<SqlitePool>> {
    DB_POOL.get().cloned()
}

pub async fn health_check() -> Result<std::time::Duration, sqlx::Error> {
    let pool = get_pool()
        .ok_or_else(|| sqlx::Error::Configuration("Database pool not initialized".into()))?;

    let start = std::time::Instant::now();
    sqlx::query("SELECT 1").fetch_one(pool.as_ref()).await?;

    Ok(start.elapsed())
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS admins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            blog_title TEXT NOT NULL DEFAULT 'My Blog',
            blog_sub_title TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT 'Admin',
            about TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            can_comment BOOLEAN NOT NULL DEFAULT TRUE,
            category_id INTEGER NOT NULL REFERENCES categories(id),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_category_id ON posts(category_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author TEXT NOT NULL,
            email TEXT NOT NULL,
            site TEXT,
            body TEXT NOT NULL,
            from_admin BOOLEAN NOT NULL DEFAULT FALSE,
            reviewed BOOLEAN NOT NULL DEFAULT FALSE,
            post_id INTEGER NOT NULL REFERENCES posts(id),
            replied_id INTEGER REFERENCES comments(id),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_replied_id ON comments(replied_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_created_at ON comments(created_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            url TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

/// Seed the default category and, when the table is empty, the singleton
/// admin account from `ADMIN_USERNAME` + `ADMIN_PASSWORD_HASH` (or plain
/// `ADMIN_PASSWORD`). Safe to run on every startup.
pub async fn bootstrap(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO categories (id, name) VALUES (?, 'Default')")
        .bind(DEFAULT_CATEGORY_ID)
        .execute(pool)
        .await?;

    let admin_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
        .fetch_one(pool)
        .await?;

    if admin_count.0 == 0 {
        let username =
            std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());

        let password_hash = if let Ok(hash) = std::env::var("ADMIN_PASSWORD_HASH") {
            hash
        } else if let Ok(plain) = std::env::var("ADMIN_PASSWORD") {
            bcrypt::hash(&plain, bcrypt::DEFAULT_COST).unwrap_or_default()
        } else {
            tracing::warn!(
                "SECURITY: neither ADMIN_PASSWORD_HASH nor ADMIN_PASSWORD is set. \
                 The admin account is created without a usable credential; \
                 set one and restart, or use the hash-password helper."
            );
            String::new()
        };

        sqlx::query(
            r#"
            INSERT INTO admins (username, password_hash, blog_title, blog_sub_title, name, about)
            VALUES (?, ?, 'My Blog', 'No, I''m the real thing.', 'Admin', 'Anything about you.')
            "#,
        )
        .bind(&username)
        .bind(&password_hash)
        .execute(pool)
        .await?;

        tracing::info!("Created the admin account '{}'", username);
    }

    Ok(())
}

/// In-memory pool for tests. A single connection with idle reaping disabled,
/// so the `:memory:` database lives as long as the pool.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("failed to open in-memory database");

    run_migrations(&pool).await.expect("migrations failed");

    sqlx::query("INSERT OR IGNORE INTO categories (id, name) VALUES (?, 'Default')")
        .bind(DEFAULT_CATEGORY_ID)
        .execute(&pool)
        .await
        .expect("failed to seed default category");

    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default_uses_env_or_fallback() {
        let config = DbConfig::default();
        assert!(config.max_connections >= 1);
        assert!(!config.url.is_empty());
    }

    #[tokio::test]
    async fn test_migrations_create_all_tables() {
        let pool = test_pool().await;

        for table in ["admins", "categories", "posts", "comments", "links"] {
            let count: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(count.0, 1, "missing table {table}");
        }
    }

    #[tokio::test]
    async fn test_test_pool_seeds_default_category() {
        let pool = test_pool().await;

        let row: (i64, String) =
            sqlx::query_as("SELECT id, name FROM categories WHERE id = ?")
                .bind(DEFAULT_CATEGORY_ID)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(row.0, 1);
        assert_eq!(row.1, "Default");
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = test_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();
    }
}
