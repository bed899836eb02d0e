//! Writes request files into the working directory before aider starts

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{AiderApiError, Result};

/// Check that `name` is a relative path that stays inside the working directory
pub fn validate_file_name(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if name.trim().is_empty() {
        return Err(AiderApiError::InvalidRequest("file name must not be empty".to_string()));
    }

    let mut has_normal = false;
    for component in path.components() {
        match component {
            // aider would parse it as an option
            Component::Normal(part) if !has_normal && part.to_string_lossy().starts_with('-') => {
                return Err(AiderApiError::InvalidRequest(format!(
                    "file name {:?} must not start with '-'",
                    name
                )));
            }
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(AiderApiError::InvalidRequest(format!(
                    "file name {:?} must be relative to the working directory",
                    name
                )));
            }
        }
    }

    if !has_normal {
        return Err(AiderApiError::InvalidRequest(format!("file name {:?} names no file", name)));
    }
    Ok(path.to_path_buf())
}

/// Validate every name first, then write the files under `root`.
///
/// `root` must already exist; only directories below it are created.
pub async fn materialize_files(
    root: &Path,
    files: &HashMap<String, String>,
) -> Result<Vec<PathBuf>> {
    if !tokio::fs::metadata(root).await.is_ok_and(|m| m.is_dir()) {
        return Err(AiderApiError::Staging {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let mut targets = Vec::with_capacity(files.len());
    for (name, content) in files {
        targets.push((root.join(validate_file_name(name)?), content));
    }

    let mut written = Vec::with_capacity(targets.len());
    for (path, content) in targets {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| AiderApiError::Staging {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| AiderApiError::Staging {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), bytes = content.len(), "Staged file");
        written.push(path);
    }

    Ok(written)
}
