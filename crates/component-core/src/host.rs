//! Contract with the application hosting the components: which extensions
//! are active, which modules are enabled, and which directory names are
//! never scanned.

use std::{collections::HashSet, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    #[default]
    Module,
    Theme,
    Profile,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExtensionKind::Module => "module",
            ExtensionKind::Theme => "theme",
            ExtensionKind::Profile => "profile",
        };
        f.write_str(label)
    }
}

/// An active extension and its base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub name: String,
    pub kind: ExtensionKind,
    pub path: PathBuf,
}

/// Host collaborator consulted at the start of every discovery run.
pub trait ExtensionHost: Send + Sync + 'static {
    /// Active extensions in host order. An error here aborts discovery.
    fn active_extensions(&self) -> anyhow::Result<Vec<Extension>>;
    fn module_exists(&self, name: &str) -> bool;
    /// Directory names pruned from every walk.
    fn ignored_directories(&self) -> Vec<String>;
}

/// Host backed by the `[[extensions]]` tables of a configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredHost {
    extensions: Vec<Extension>,
    modules: HashSet<String>,
    ignore: Vec<String>,
}

impl ConfiguredHost {
    pub fn from_config(config: &Config) -> Self {
        let extensions = config
            .extensions
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| Extension {
                name: entry.name.clone(),
                kind: entry.kind,
                path: entry.path.clone(),
            })
            .collect();
        Self {
            extensions,
            modules: config.enabled_modules().map(String::from).collect(),
            ignore: config.ignore_directories.clone(),
        }
    }

    pub fn with_extension(
        mut self,
        name: impl Into<String>,
        kind: ExtensionKind,
        path: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        if kind == ExtensionKind::Module {
            self.modules.insert(name.clone());
        }
        self.extensions.push(Extension {
            name,
            kind,
            path: path.into(),
        });
        self
    }

    pub fn with_ignored<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(dirs.into_iter().map(Into::into));
        self
    }
}

impl ExtensionHost for ConfiguredHost {
    fn active_extensions(&self) -> anyhow::Result<Vec<Extension>> {
        Ok(self.extensions.clone())
    }

    fn module_exists(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    fn ignored_directories(&self) -> Vec<String> {
        self.ignore.clone()
    }
}
