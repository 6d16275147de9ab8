/**
 * Upload Routes
 * Image uploads for the post editor. Files are stored under a local
 * directory and served statically; filenames are regenerated, never taken
 * from the client.
 */
use axum::{
    extract::{Multipart, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::routes::auth::verify_auth;
use crate::routes::ErrorResponse;

const UPLOAD_DIR: &str = "uploads/images";
const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub size: usize,
    pub mime_type: String,
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

/// Sniff the image type from the first bytes; the client-supplied content
/// type and extension are advisory only.
fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 12 {
        return None;
    }
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Reject path traversal and filesystem-hostile names.
fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains('\0')
}

/// POST /api/admin/uploads - Store one image from a multipart form
pub async fn upload_image(headers: HeaderMap, mut multipart: Multipart) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => return bad_request("No file provided"),
        Err(e) => {
            tracing::error!("Multipart error: {}", e);
            return bad_request("Invalid multipart data");
        }
    };

    let original_name = field.file_name().unwrap_or("unknown").to_string();
    let claimed_ext = original_name
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&claimed_ext.as_str()) {
        return bad_request("Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.");
    }

    let bytes = match field.bytes().await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to read upload bytes: {}", e);
            return bad_request("Failed to read file data");
        }
    };

    if bytes.is_empty() {
        return bad_request("Empty file");
    }
    if bytes.len() > MAX_FILE_SIZE {
        return bad_request("File too large. Maximum size is 5MB.");
    }

    let mime_type = match sniff_image_type(&bytes) {
        Some(mime) => mime,
        None => return bad_request("File content does not match an allowed image type."),
    };

    let upload_path = PathBuf::from(UPLOAD_DIR);
    if let Err(e) = tokio::fs::create_dir_all(&upload_path).await {
        tracing::error!("Failed to create upload directory: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to initialize upload directory".to_string(),
                message: None,
            }),
        )
            .into_response();
    }

    let filename = format!("{}.{}", Uuid::new_v4(), extension_for(mime_type));
    if let Err(e) = tokio::fs::write(upload_path.join(&filename), &bytes).await {
        tracing::error!("Failed to write upload file: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to save file".to_string(),
                message: None,
            }),
        )
            .into_response();
    }

    tracing::info!("Image uploaded: {} ({} bytes)", filename, bytes.len());

    (
        StatusCode::CREATED,
        Json(UploadResponse {
            url: format!("/uploads/images/{}", filename),
            filename,
            size: bytes.len(),
            mime_type: mime_type.to_string(),
        }),
    )
        .into_response()
}

/// DELETE /api/admin/uploads/{filename} - Remove a stored image
pub async fn delete_image(headers: HeaderMap, Path(filename): Path<String>) -> Response {
    if let Err(err) = verify_auth(&headers) {
        return err.into_response();
    }

    if !is_safe_filename(&filename) {
        return bad_request("Invalid filename");
    }

    let file_path = PathBuf::from(UPLOAD_DIR).join(&filename);
    if !file_path.exists() {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "File not found".to_string(),
                message: None,
            }),
        )
            .into_response();
    }

    if let Err(e) = tokio::fs::remove_file(&file_path).await {
        tracing::error!("Failed to delete file {}: {}", filename, e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to delete file".to_string(),
                message: None,
            }),
        )
            .into_response();
    }

    tracing::info!("Image deleted: {}", filename);
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_image_type() {
        let mut png = vec![0x89, 0x50, 0x4E, 0x47];
        png.resize(16, 0);
        assert_eq!(sniff_image_type(&png), Some("image/png"));

        let mut jpeg = vec![0xFF, 0xD8, 0xFF];
        jpeg.resize(16, 0);
        assert_eq!(sniff_image_type(&jpeg), Some("image/jpeg"));

        let mut webp = vec![0x52, 0x49, 0x46, 0x46, 0, 0, 0, 0, 0x57, 0x45, 0x42, 0x50];
        webp.resize(16, 0);
        assert_eq!(sniff_image_type(&webp), Some("image/webp"));

        assert_eq!(sniff_image_type(b"plain text, not an image"), None);
        assert_eq!(sniff_image_type(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn test_filename_safety() {
        assert!(is_safe_filename("a1b2c3.png"));
        assert!(!is_safe_filename("../../etc/passwd"));
        assert!(!is_safe_filename("dir/file.png"));
        assert!(!is_safe_filename("dir\\file.png"));
        assert!(!is_safe_filename(""));
    }

    #[test]
    fn test_extension_follows_sniffed_type() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/webp"), "webp");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }
}
