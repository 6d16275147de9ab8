//! Blog Backend - library for app logic and testing

pub mod categories;
pub mod comments;
pub mod db;
pub mod error;
pub mod logging;
pub mod notify;
pub mod posts;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local dev frontend.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                "http://localhost:3000".parse().unwrap(),
                "http://127.0.0.1:3000".parse().unwrap(),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app() -> Router {
    let cors = configure_cors();
    tracing::info!("CORS configured");

    Router::new()
        // Public blog surface
        .route("/api/posts", get(routes::blog::list_posts))
        .route("/api/posts/{id}", get(routes::blog::get_post))
        .route(
            "/api/posts/{id}/comments",
            post(routes::blog::create_comment),
        )
        .route("/api/categories", get(routes::blog::list_categories))
        .route(
            "/api/categories/{id}/posts",
            get(routes::blog::category_posts),
        )
        .route("/api/links", get(routes::blog::list_links))
        .route("/api/about", get(routes::blog::about))
        // Auth
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/verify", post(routes::auth::verify_token))
        .route("/api/auth/logout", post(routes::auth::logout))
        // Admin panel
        .route("/api/admin/posts", post(routes::admin::create_post))
        .route(
            "/api/admin/posts/{id}",
            axum::routing::patch(routes::admin::update_post).delete(routes::admin::delete_post),
        )
        .route(
            "/api/admin/posts/{id}/set-comment",
            post(routes::admin::set_comment_gate),
        )
        .route("/api/admin/comments", get(routes::admin::manage_comments))
        .route(
            "/api/admin/comments/{id}/approve",
            post(routes::admin::approve_comment),
        )
        .route(
            "/api/admin/comments/{id}",
            axum::routing::delete(routes::admin::delete_comment),
        )
        .route(
            "/api/admin/categories",
            post(routes::admin::create_category),
        )
        .route(
            "/api/admin/categories/{id}",
            axum::routing::patch(routes::admin::rename_category)
                .delete(routes::admin::delete_category),
        )
        .route("/api/admin/links", post(routes::admin::create_link))
        .route(
            "/api/admin/links/{id}",
            axum::routing::patch(routes::admin::update_link).delete(routes::admin::delete_link),
        )
        .route(
            "/api/admin/settings",
            get(routes::admin::get_settings).patch(routes::admin::update_settings),
        )
        .route("/api/admin/uploads", post(routes::upload::upload_image))
        .route(
            "/api/admin/uploads/{filename}",
            axum::routing::delete(routes::upload::delete_image),
        )
        // Uploaded images are served as plain static files
        .nest_service("/uploads", ServeDir::new("uploads"))
        // Health
        .route("/health", get(routes::health::health_ping))
        .route("/health/database", get(routes::health::health_database))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses automatically
        .layer(CompressionLayer::new())
        // Global 8 MB request body cap - covers the 5 MB image limit plus
        // multipart framing; prevents unbounded buffering
        .layer(RequestBodyLimitLayer::new(8 * 1024 * 1024))
        .layer(cors)
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init();

    match db::init_pool(None).await {
        Ok(pool) => {
            if let Err(e) = db::run_migrations(&pool).await {
                tracing::error!("Failed to run database migrations: {}", e);
            } else if let Err(e) = db::bootstrap(&pool).await {
                tracing::error!("Failed to bootstrap initial records: {}", e);
            }
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize database pool: {}. Continuing without database.",
                e
            );
        }
    }

    // Comment notifications drain through a background worker; the mail
    // collaborator only logs, actual delivery is out of scope.
    notify::init(notify::Notifier::spawn(
        Arc::new(notify::LogMailer),
        notify::NotifyConfig::default(),
    ));

    let app = create_app();

    // Bind address is configurable via HOST / PORT env vars, defaulting to
    // 127.0.0.1:3001 so existing dev setups keep working unchanged.
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3001);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Invalid HOST/PORT configuration");
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_app_returns_router() {
        let _app = create_app();
        // Just test that it compiles and doesn't panic
    }
}
