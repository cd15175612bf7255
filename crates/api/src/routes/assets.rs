use axum::routing::get;
use axum::Router;

use crate::handlers::assets;
use crate::state::AppState;

/// URL prefix the asset root is served under.
pub const IMAGES_PATH: &str = "/images";
/// URL prefix the upload directory is served under.
pub const UPLOADS_PATH: &str = "/uploads";

/// Static file routes.
///
/// ```text
/// GET /images/{*path}     file below ASSET_ROOT
/// GET /uploads/{*path}    file below UPLOAD_DIR
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images/{*path}", get(assets::serve_image))
        .route("/uploads/{*path}", get(assets::serve_upload))
}
