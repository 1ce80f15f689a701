//! Target file discovery
//!
//! Tools only ever receive a list of paths. These helpers produce such a list
//! from the git index and narrow it down with glob patterns.

use std::path::{Component, Path, PathBuf};

use git2::Repository;
use glob::Pattern;
use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilesError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),
    #[error("Repository at {0} has no working directory")]
    Bare(String),
    #[error("Unable to resolve {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn canonicalize(path: &Path) -> Result<PathBuf, FilesError> {
    path.canonicalize().map_err(|e| FilesError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Paths of the files tracked in the git index below `dir`, relative to
/// `dir` and in index order.
///
/// # Errors
///
/// Returns `FilesError::Git` if no repository is found or the index cannot be
/// read, `FilesError::Bare` for bare repositories and `FilesError::Io` if
/// `dir` cannot be resolved.
pub fn tracked_files(dir: &Path) -> Result<Vec<String>, FilesError> {
    let repo = Repository::discover(dir)?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| FilesError::Bare(repo.path().display().to_string()))?;
    let root = canonicalize(workdir)?;
    let base = canonicalize(dir)?;
    let prefix = base.strip_prefix(&root).unwrap_or(Path::new(""));

    let index = repo.index()?;
    let files: Vec<String> = index
        .iter()
        .filter_map(|entry| {
            let path = PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned());
            path.strip_prefix(prefix)
                .ok()
                .map(|relative| relative.to_string_lossy().into_owned())
        })
        .collect();
    debug!(
        "Found {} tracked files below {}",
        files.len(),
        base.display()
    );
    Ok(files)
}

/// Keep the paths matching `pattern`, or with `invert` the ones that don't.
#[must_use]
pub fn filter(files: &[String], pattern: &Pattern, invert: bool) -> Vec<String> {
    files
        .iter()
        .filter(|file| pattern.matches(file) != invert)
        .cloned()
        .collect()
}

/// Re-express `files`, given relative to `invoked_from`, relative to `root`.
///
/// Tools run in `root`, so paths typed elsewhere have to be moved over before
/// they reach a tool or a file pattern. Paths that end up outside `root` are
/// returned absolute. The files themselves need not exist.
///
/// # Errors
///
/// Returns `FilesError::Io` if either directory cannot be resolved.
pub fn rebase(
    files: &[String],
    invoked_from: &Path,
    root: &Path,
) -> Result<Vec<String>, FilesError> {
    let invoked_from = canonicalize(invoked_from)?;
    let root = canonicalize(root)?;
    let rebased = files
        .iter()
        .map(|file| {
            let absolute = normalize(&invoked_from.join(file));
            match absolute.strip_prefix(&root) {
                Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
                Ok(relative) => relative.to_string_lossy().into_owned(),
                Err(_) => absolute.to_string_lossy().into_owned(),
            }
        })
        .collect();
    debug!("Rebased {files:?} from {} onto {}", invoked_from.display(), root.display());
    Ok(rebased)
}

/// Resolve `.` and `..` lexically
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
