use std::{
    collections::HashSet,
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    config::ScanOrder,
    host::{Extension, ExtensionKind},
};

/// Where a search directory came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RootOrigin {
    Extension { name: String, kind: ExtensionKind },
    TopLevel,
}

/// One existing `components` directory to walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRoot {
    pub origin: RootOrigin,
    /// Extension or application base directory.
    pub base: PathBuf,
    /// `base` joined with the components subdirectory.
    pub dir: PathBuf,
}

impl fmt::Display for SearchRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            RootOrigin::Extension { name, kind } => write!(f, "{kind} `{name}`"),
            RootOrigin::TopLevel => f.write_str("top-level root"),
        }
    }
}

/// Builds the ordered list of search directories: every extension base
/// joined with `subdirectory`, then the top-level root last. Relative bases
/// are resolved against the working directory. Directories that do not exist
/// are dropped, and a directory reached twice keeps its first position.
pub fn resolve_roots(
    extensions: &[Extension],
    top_level: Option<&Path>,
    subdirectory: &str,
    order: ScanOrder,
) -> Vec<SearchRoot> {
    let mut roots: Vec<SearchRoot> = extensions
        .iter()
        .map(|ext| {
            let base = absolute(&ext.path);
            SearchRoot {
                origin: RootOrigin::Extension {
                    name: ext.name.clone(),
                    kind: ext.kind,
                },
                dir: base.join(subdirectory),
                base,
            }
        })
        .collect();

    if order == ScanOrder::Lexical {
        roots.sort_by(|a, b| a.dir.cmp(&b.dir));
    }

    if let Some(base) = top_level {
        let base = absolute(base);
        roots.push(SearchRoot {
            origin: RootOrigin::TopLevel,
            dir: base.join(subdirectory),
            base,
        });
    }

    let mut seen = HashSet::new();
    roots.retain(|root| {
        if !root.dir.is_dir() {
            tracing::debug!(dir = %root.dir.display(), "skipping missing component directory");
            return false;
        }
        let key = fs::canonicalize(&root.dir).unwrap_or_else(|_| root.dir.clone());
        seen.insert(key)
    });
    roots
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
