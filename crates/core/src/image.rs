//! Reference image descriptors produced by the image locator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Provider tag stamped on images read from the local asset tree.
pub const PROVIDER_LOCAL_FILES: &str = "local-files";

/// Nominal dimensions reported for located images. The files are not
/// decoded, so these are placeholders the client uses for layout.
pub const DEFAULT_IMAGE_WIDTH: u32 = 800;
pub const DEFAULT_IMAGE_HEIGHT: u32 = 600;

/// Basic image facts carried alongside every located or generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// File extension without the leading dot (e.g. `jpeg`).
    pub format: String,
}

/// A candidate asset returned by the locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImage {
    /// Position-based identifier, `ref-<n>`.
    pub id: String,
    /// Absolute or root-relative path on the local filesystem.
    pub path: PathBuf,
    /// Style label drawn from the category's palette.
    pub style: String,
    pub provider: String,
    pub metadata: ImageMetadata,
}

impl ReferenceImage {
    /// Build a reference for the `index`-th file of a category listing.
    pub fn local(index: usize, path: PathBuf, style: impl Into<String>) -> Self {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();

        Self {
            id: format!("ref-{index}"),
            path,
            style: style.into(),
            provider: PROVIDER_LOCAL_FILES.to_string(),
            metadata: ImageMetadata {
                width: DEFAULT_IMAGE_WIDTH,
                height: DEFAULT_IMAGE_HEIGHT,
                format,
            },
        }
    }
}
