// src/discovery.rs
//
// Walks a project tree and classifies matching source files.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::DiscoveryError;
use crate::state::{Category, ProjectFile};

pub const DEFAULT_PAGE_MARKER: &str = "page.tsx";

/// Maps a file name to a category tag.
pub trait Classifier: Send + Sync {
    fn classify(&self, file_name: &str) -> Category;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> Category + Send + Sync,
{
    fn classify(&self, file_name: &str) -> Category {
        self(file_name)
    }
}

/// One marker file name is a page, everything else is a component.
#[derive(Debug, Clone)]
pub struct PageMarker {
    marker: String,
}

impl PageMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for PageMarker {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_MARKER)
    }
}

impl Classifier for PageMarker {
    fn classify(&self, file_name: &str) -> Category {
        if file_name == self.marker {
            Category::Page
        } else {
            Category::Component
        }
    }
}

/// Recursively collect files under `root` whose name ends with `extension`.
///
/// A directory is pruned (with its whole subtree) when its path relative to
/// `root` contains any of `excluded`. Files themselves are not re-checked.
/// Entries are yielded in name-sorted traversal order.
pub fn discover(
    root: &Path,
    extension: &str,
    classifier: &dyn Classifier,
    excluded: &BTreeSet<String>,
) -> Result<Vec<ProjectFile>, DiscoveryError> {
    let root = canonical_root(root)?;
    let mut out = Vec::new();

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, &root, excluded));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed"));
                return Err(DiscoveryError::Unreadable {
                    path: root.clone(),
                    source,
                });
            }
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        // symlinked files count; symlinked directories are not descended
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        if !name.ends_with(extension) {
            continue;
        }

        let relative = match entry.path().strip_prefix(&root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => continue,
        };

        let category = classifier.classify(name);
        debug!(file = %relative.display(), %category, "discovered");
        out.push(ProjectFile::new(entry.path().to_path_buf(), relative, category));
    }

    let pages = out.iter().filter(|f| *f.category() == Category::Page).count();
    info!(
        root = %root.display(),
        total = out.len(),
        pages,
        others = out.len() - pages,
        "discovery complete"
    );

    Ok(out)
}

/// Canonical absolute form of `root`, which must be an existing directory.
pub fn canonical_root(root: &Path) -> Result<PathBuf, DiscoveryError> {
    let canonical = match fs::canonicalize(root) {
        Ok(p) => p,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(DiscoveryError::NotFound(root.to_path_buf()))
        }
        Err(source) => {
            return Err(DiscoveryError::Unreadable {
                path: root.to_path_buf(),
                source,
            })
        }
    };

    if !canonical.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    Ok(canonical)
}

fn is_excluded_dir(entry: &DirEntry, root: &Path, excluded: &BTreeSet<String>) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }

    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    let relative = relative.to_string_lossy();
    excluded.iter().any(|name| relative.contains(name.as_str()))
}
