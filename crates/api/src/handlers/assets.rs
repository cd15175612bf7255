//! Static file handlers for the asset root and the upload directory.
//!
//! Routes:
//! - `GET /images/{*path}`  : file below `ASSET_ROOT`
//! - `GET /uploads/{*path}` : file below `UPLOAD_DIR`
//!
//! The path is checked lexically first, then canonicalized and required to
//! stay below the canonical root, so symlinks cannot leak files either.

use std::io;
use std::path::Path;

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use kura_core::assets::{ensure_within, sanitize_relative};
use kura_core::error::CoreError;
use tokio::fs::File;
use tokio_util::codec::{BytesCodec, FramedRead};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /images/{*path}
pub async fn serve_image(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> AppResult<Response> {
    serve_file(&state.config.asset_root, &path).await
}

/// GET /uploads/{*path}
pub async fn serve_upload(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> AppResult<Response> {
    serve_file(&state.config.upload_dir, &path).await
}

/// Stream `requested` (already percent-decoded) from below `root`.
async fn serve_file(root: &Path, requested: &str) -> AppResult<Response> {
    let relative = sanitize_relative(requested)?;

    let root_canon = tokio::fs::canonicalize(root)
        .await
        .map_err(|e| io_error(e, requested))?;
    let file_canon = tokio::fs::canonicalize(root.join(&relative))
        .await
        .map_err(|e| io_error(e, requested))?;

    if let Err(e) = ensure_within(&root_canon, &file_canon) {
        tracing::warn!(path = %requested, "Blocked path escaping the serving root");
        return Err(e.into());
    }

    let metadata = tokio::fs::metadata(&file_canon)
        .await
        .map_err(|e| io_error(e, requested))?;
    if !metadata.is_file() {
        return Err(not_found(requested));
    }

    let file = File::open(&file_canon)
        .await
        .map_err(|e| io_error(e, requested))?;

    let stream = FramedRead::new(file, BytesCodec::new());
    let mime_type = mime_guess::from_path(&file_canon).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type.as_ref())
        .header(header::CONTENT_LENGTH, metadata.len())
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(format!("Failed to build file response: {e}")))
}

fn not_found(requested: &str) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Asset",
        id: requested.to_string(),
    })
}

fn io_error(err: io::Error, requested: &str) -> AppError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => not_found(requested),
        io::ErrorKind::PermissionDenied => {
            AppError::Core(CoreError::Forbidden(format!("Permission denied: {requested}")))
        }
        _ => AppError::InternalError(format!("Failed to read {requested}: {err}")),
    }
}
