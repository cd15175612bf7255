//! Image locator: supplies reference images for a category.
//!
//! [`LocalImageLocator`] lists image files from one subdirectory of an asset
//! root per category, after a simulated lookup delay.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use kura_core::category::{Category, FALLBACK_STYLE};
use kura_core::image::ReferenceImage;
use rand::seq::IndexedRandom;

use crate::latency::SimulatedLatency;

/// Maximum number of reference images returned per search.
pub const MAX_REFERENCE_IMAGES: usize = 30;

/// File extensions (lowercase, no dot) treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png"];

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("No images found in directory: {}", directory.display())]
    EmptyCategory {
        category: &'static str,
        directory: PathBuf,
    },

    #[error("Failed to read image directory {}: {source}", directory.display())]
    Io {
        directory: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Source of reference images for the orchestrator.
///
/// Implementations return at most [`MAX_REFERENCE_IMAGES`] items in a
/// stable order.
#[async_trait]
pub trait ImageLocator: Send + Sync {
    async fn locate(&self, category: &Category) -> Result<Vec<ReferenceImage>, LocatorError>;
}

/// Locator backed by a directory tree (`<root>/<category.directory>/*`).
pub struct LocalImageLocator {
    root: PathBuf,
    latency: SimulatedLatency,
}

impl LocalImageLocator {
    pub fn new(root: impl Into<PathBuf>, latency: SimulatedLatency) -> Self {
        Self {
            root: root.into(),
            latency,
        }
    }
}

#[async_trait]
impl ImageLocator for LocalImageLocator {
    async fn locate(&self, category: &Category) -> Result<Vec<ReferenceImage>, LocatorError> {
        self.latency.wait().await;

        let directory = self.root.join(category.directory);
        tracing::debug!(
            category = category.key,
            directory = %directory.display(),
            "Searching for reference images",
        );

        let mut files = list_image_files(&directory)
            .await
            .map_err(|source| LocatorError::Io {
                directory: directory.clone(),
                source,
            })?;

        if files.is_empty() {
            return Err(LocatorError::EmptyCategory {
                category: category.key,
                directory,
            });
        }

        files.sort();
        files.truncate(MAX_REFERENCE_IMAGES);

        let mut rng = rand::rng();
        let images: Vec<_> = files
            .into_iter()
            .enumerate()
            .map(|(index, path)| {
                let style = category
                    .styles
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or(FALLBACK_STYLE);
                ReferenceImage::local(index, path, style)
            })
            .collect();

        tracing::info!(
            category = category.key,
            count = images.len(),
            "Found reference images",
        );

        Ok(images)
    }
}

/// List regular files in `directory` whose extension is an image type.
async fn list_image_files(directory: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(directory).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() || !is_image_file(&path) {
            continue;
        }
        files.push(path);
    }

    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
