use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ImportError, Location};

/// Lists the bundle files of `dir`: regular, non-hidden files whose
/// extension matches `extension` (case-insensitive), sorted by path.
///
/// Subdirectories are not descended into. Symlinks count when they point at
/// a regular file. Entries whose metadata cannot be read, such as dangling
/// symlinks, are skipped with a warning.
///
/// # Errors
///
/// Returns `ImportError::Io` if the directory cannot be listed.
pub async fn discover_bundle_files(
    dir: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>, ImportError> {
    let extension = extension.trim_start_matches('.');
    let dir_error = |e: io::Error| ImportError::io(Location::file(dir), e);

    let mut listing = tokio::fs::read_dir(dir).await.map_err(dir_error)?;
    let mut files = Vec::new();

    while let Some(entry) = listing.next_entry().await.map_err(dir_error)? {
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| name.starts_with('.'));
        let matches = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if hidden || !matches {
            continue;
        }

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if metadata.is_file() {
            files.push(path);
        }
    }

    files.sort();
    debug!(dir = %dir.display(), files = files.len(), "Bundle files discovered");
    Ok(files)
}
