//! Mapping between local asset paths and the URLs they are served under.
//!
//! Outbound: [`asset_url`] turns a file below an asset root into a URL
//! path, percent-encoding each segment on its own so that spaces and
//! reserved characters in file names survive while `/` separators stay
//! literal.
//!
//! Inbound: [`sanitize_relative`] and [`ensure_within`] form the
//! containment check applied before any file is served.

use std::path::{Component, Path, PathBuf};

use crate::error::CoreError;

/// Build the URL for `path` relative to `root`, mounted at `prefix`.
///
/// Returns `None` when `path` is not below `root` or contains components
/// that cannot be expressed as URL segments (`..`, non-UTF-8 names).
pub fn asset_url(root: &Path, prefix: &str, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                segments.push(urlencoding::encode(segment.to_str()?).into_owned());
            }
            Component::CurDir => {}
            _ => return None,
        }
    }

    if segments.is_empty() {
        return None;
    }

    Some(format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        segments.join("/")
    ))
}

/// Lexically validate a requested relative path.
///
/// The input is the already percent-decoded remainder of a request path.
/// Empty and `.` segments are dropped; `..`, absolute roots and Windows
/// prefixes are refused outright.
pub fn sanitize_relative(requested: &str) -> Result<PathBuf, CoreError> {
    let mut clean = PathBuf::new();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(segment) => clean.push(segment),
            Component::CurDir => {}
            Component::RootDir if clean.as_os_str().is_empty() => {}
            _ => {
                return Err(CoreError::Forbidden(format!(
                    "Path escapes the asset root: {requested}"
                )))
            }
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(CoreError::NotFound {
            entity: "Asset",
            id: requested.to_string(),
        });
    }

    Ok(clean)
}

/// Verify that a canonicalized `candidate` lives inside the canonicalized
/// `root`. Catches escapes through symlinks that the lexical check cannot
/// see.
pub fn ensure_within(root: &Path, candidate: &Path) -> Result<(), CoreError> {
    if candidate.starts_with(root) && candidate != root {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Path is outside the asset root: {}",
            candidate.display()
        )))
    }
}
