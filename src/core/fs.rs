//! Filesystem helpers for template trees
//!
//! Enumeration is always lexicographic by relative path so that compiling the
//! same template twice processes files in the same order.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Lists all files below `dir` as `/`-separated paths relative to `dir`,
/// sorted lexicographically. A missing directory yields an empty list.
pub fn list_files(dir: &Path) -> io::Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(io::Error::other)?;
        files.push(to_slash(relative));
    }
    files.sort();
    Ok(files)
}

/// Recursively copies `src` into `dst`, creating `dst` if needed.
pub async fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    debug!(src = %src.display(), dst = %dst.display(), "Copying directory tree");
    fs::create_dir_all(dst).await?;

    for entry in WalkDir::new(src).follow_links(true).min_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).await?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(entry.path(), &target).await?;
        }
    }
    Ok(())
}

/// Removes an installed template directory. Symbolic links are unlinked,
/// never followed.
pub async fn remove_tree(path: &Path) -> io::Result<()> {
    if is_symlink(path) {
        debug!(path = %path.display(), "Unlinking symlinked directory");
        #[cfg(windows)]
        {
            return fs::remove_dir(path).await;
        }
        #[cfg(not(windows))]
        {
            return fs::remove_file(path).await;
        }
    }
    debug!(path = %path.display(), "Removing directory tree");
    fs::remove_dir_all(path).await
}

/// Creates a directory symlink at `link` pointing to `target`.
pub async fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        fs::symlink(target, link).await
    }
    #[cfg(windows)]
    {
        fs::symlink_dir(target, link).await
    }
}

/// True if `path` itself is a symbolic link.
pub fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Resolves `path` to an absolute, canonical path.
pub fn resolve(path: &Path) -> io::Result<PathBuf> {
    std::fs::canonicalize(path)
}

/// Joins the components of a relative path with `/`.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
