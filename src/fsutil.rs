use std::io;
use std::path::{Path, PathBuf};

/// Error that occurs when listing a directory fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to list directory `{path}`: {source}")]
pub struct ListDirError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Returns the entry names of `path`, sorted for deterministic traversal.
///
/// Entries whose name cannot be obtained are skipped with a warning rather
/// than failing the whole listing.
///
/// # Errors
///
/// Returns a [`ListDirError`] if the directory itself cannot be read.
pub fn list_dir_names(path: impl AsRef<Path>) -> Result<Vec<String>, ListDirError> {
    let path = path.as_ref();
    let entries = std::fs::read_dir(path).map_err(|source| ListDirError {
        path: path.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => names.push(entry.file_name().to_string_lossy().into_owned()),
            Err(err) => log::warn!("skipping unreadable entry in `{}`: {}", path.display(), err),
        }
    }
    names.sort();
    Ok(names)
}
