//! Mapping from local paths to object keys and content types

use crate::error::PathError;
use crate::FALLBACK_CONTENT_TYPE;
use std::path::{Component, Path};

/// Compute the object key for `path`: its location relative to `base`,
/// with every component joined by `/`.
///
/// Fails when `path` is not below `base`, when the remainder would climb
/// out of it or carry a root/drive component, or when a component is not
/// valid UTF-8.
pub fn resolve_key(base: &Path, path: &Path) -> Result<String, PathError> {
    let not_under_base = || PathError::NotUnderBase {
        base: base.to_path_buf(),
        path: path.to_path_buf(),
    };

    let relative = path.strip_prefix(base).map_err(|_| not_under_base())?;

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(part) => parts.push(part.to_string()),
                None => return Err(PathError::NonUtf8(path.to_path_buf())),
            },
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(not_under_base())
            }
        }
    }

    if parts.is_empty() {
        return Err(PathError::Empty(path.to_path_buf()));
    }

    Ok(parts.join("/"))
}

/// Look up the MIME type for the file's extension.
pub fn resolve_content_type(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| mime_guess::from_ext(&ext).first_raw())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Join an optional key prefix and a key with exactly one `/`.
pub fn join_key(prefix: Option<&str>, key: &str) -> String {
    match prefix.map(|p| p.trim_matches('/')) {
        None | Some("") => key.to_string(),
        Some(p) => format!("{}/{}", p, key),
    }
}
