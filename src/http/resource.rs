//! Static resource resolution under the server root directory.
//!
//! # Resolution order for a request path
//! 1. The path names a file → that file
//! 2. The path is empty or a directory → its `index.html`, if present
//! 3. For each configured resource name `r` → `<path>/<r>`, if present
//!
//! Paths with `..` components never resolve.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

pub const INDEX_FILE: &str = "index.html";

/// Join `request_path` onto `root`, refusing anything that could escape it.
fn join_under(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    let mut joined = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(joined)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Resolve a request path to a file under `root`.
pub async fn resolve_resource_path(
    root: &Path,
    request_path: &str,
    resource_paths: &BTreeSet<String>,
) -> Option<PathBuf> {
    let candidate = join_under(root, request_path)?;

    if candidate != root && is_file(&candidate).await {
        return Some(candidate);
    }

    if is_dir(&candidate).await {
        let index = candidate.join(INDEX_FILE);
        if is_file(&index).await {
            return Some(index);
        }
    }

    for resource in resource_paths {
        let Some(path) = join_under(&candidate, resource) else {
            continue;
        };
        if is_file(&path).await {
            return Some(path);
        }
    }

    None
}

/// Extension of a resolved file, used for the content type.
pub fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}
