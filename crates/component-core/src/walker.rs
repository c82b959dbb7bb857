use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use component_manifest::machine_name::machine_name_from_file;
use walkdir::WalkDir;

use crate::{
    cancel::CancelSignal,
    diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Severity},
};

/// A manifest file found beneath a search root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub machine_name: String,
    pub path: PathBuf,
    /// Directory containing the manifest.
    pub dir: PathBuf,
    /// `dir` relative to the search root, `/`-separated, empty for the root.
    pub subpath: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("walk of {} cancelled", .0.display())]
    Cancelled(PathBuf),
}

/// Recursive manifest finder. Follows symbolic links, prunes ignored
/// directory names and never enters the same canonical directory twice.
#[derive(Debug, Clone)]
pub struct Walker {
    suffix: String,
    ignore: HashSet<String>,
    follow_links: bool,
}

impl Walker {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            ignore: HashSet::new(),
            follow_links: true,
        }
    }

    pub fn ignoring<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Maps machine name to manifest file for everything beneath `root`.
    /// A missing root yields an empty map; unreadable subtrees are reported
    /// to `sink` and skipped.
    pub fn walk(
        &self,
        root: &Path,
        cancel: &CancelSignal,
        sink: &dyn DiagnosticSink,
    ) -> Result<BTreeMap<String, DiscoveredFile>, WalkError> {
        let mut found = BTreeMap::new();
        if !root.is_dir() {
            tracing::debug!(root = %root.display(), "component root missing; nothing to walk");
            return Ok(found);
        }

        let ignore = &self.ignore;
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let entries = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                let ignored = entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| ignore.contains(name));
                if ignored {
                    tracing::trace!(dir = %entry.path().display(), "pruning ignored directory");
                    return false;
                }
                let canonical =
                    fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
                visited.insert(canonical)
            });

        for entry in entries {
            if cancel.is_cancelled() {
                return Err(WalkError::Cancelled(root.to_path_buf()));
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let mut diagnostic = Diagnostic::new(
                        Severity::Info,
                        DiagnosticKind::WalkError,
                        format!("skipping unreadable entry: {err}"),
                    )
                    .with("root", root.display());
                    if let Some(path) = err.path() {
                        diagnostic = diagnostic.at(path);
                    }
                    sink.report(diagnostic);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            let Some(machine_name) = machine_name_from_file(file_name, &self.suffix) else {
                continue;
            };

            let path = entry.into_path();
            let dir = path.parent().unwrap_or(root).to_path_buf();
            let subpath = relative_subpath(root, &dir);
            tracing::trace!(machine_name = %machine_name, path = %path.display(), "found manifest");
            found.insert(
                machine_name.clone(),
                DiscoveredFile {
                    machine_name,
                    path,
                    dir,
                    subpath,
                },
            );
        }

        tracing::debug!(root = %root.display(), manifests = found.len(), "walked component root");
        Ok(found)
    }
}

fn relative_subpath(root: &Path, dir: &Path) -> String {
    dir.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}
