use std::{
    collections::{BTreeMap, HashSet},
    path::{Component, Path, PathBuf},
};

use anyhow::{bail, Result};
use component_manifest::{is_machine_name, DEFAULT_MANIFEST_SUFFIX, DEFAULT_SUBDIRECTORY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{host::ExtensionKind, parser::ManifestFormat};

/// Root configuration structure deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application root whose `components` directory is scanned after every
    /// extension.
    pub top_level_root: Option<PathBuf>,
    pub subdirectory: String,
    pub manifest_suffix: String,
    pub ignore_directories: Vec<String>,
    pub scan_order: ScanOrder,
    pub concurrent: bool,
    pub follow_links: bool,
    pub report_collisions: bool,
    pub extensions: Vec<ExtensionEntry>,
    /// Per-type default overlays, keyed by component type tag.
    pub defaults: BTreeMap<String, Map<String, Value>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            top_level_root: None,
            subdirectory: DEFAULT_SUBDIRECTORY.to_string(),
            manifest_suffix: DEFAULT_MANIFEST_SUFFIX.to_string(),
            ignore_directories: vec!["node_modules".into(), "bower_components".into()],
            scan_order: ScanOrder::default(),
            concurrent: false,
            follow_links: true,
            report_collisions: true,
            extensions: Vec::new(),
            defaults: BTreeMap::new(),
        }
    }
}

/// Order in which extension roots are scanned. Later roots win collisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOrder {
    /// Host order, as the extensions are listed.
    #[default]
    Declared,
    /// Sorted by resolved search directory.
    Lexical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionEntry {
    pub name: String,
    #[serde(default)]
    pub kind: ExtensionKind,
    pub path: PathBuf,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Config {
    /// Validates structural invariants and provides actionable error messages.
    pub fn validate(&self) -> Result<()> {
        validate_subdirectory(&self.subdirectory)?;

        if !self.manifest_suffix.starts_with('.') {
            bail!(
                "manifest_suffix `{}` must start with a dot",
                self.manifest_suffix
            );
        }
        if ManifestFormat::from_suffix(&self.manifest_suffix).is_none() {
            bail!(
                "manifest_suffix `{}` must end in .yml, .yaml, .json or .toml",
                self.manifest_suffix
            );
        }

        for dir in &self.ignore_directories {
            if dir.trim().is_empty() || dir.contains(['/', '\\']) {
                bail!("ignore_directories entry `{dir}` must be a bare directory name");
            }
        }

        let mut names = HashSet::new();
        for extension in &self.extensions {
            extension.validate()?;
            if !names.insert(extension.name.as_str()) {
                bail!("duplicate extension name `{}`", extension.name);
            }
        }

        if let Some(root) = &self.top_level_root {
            if root.as_os_str().is_empty() {
                bail!("top_level_root must not be empty when set");
            }
        }
        Ok(())
    }

    /// Names of enabled extensions of kind module.
    pub fn enabled_modules(&self) -> impl Iterator<Item = &str> {
        self.extensions
            .iter()
            .filter(|ext| ext.enabled && ext.kind == ExtensionKind::Module)
            .map(|ext| ext.name.as_str())
    }
}

impl ExtensionEntry {
    pub fn validate(&self) -> Result<()> {
        if !is_machine_name(&self.name) {
            bail!("extension name `{}` is not a valid machine name", self.name);
        }
        if self.path.as_os_str().is_empty() {
            bail!("extension `{}` must declare a path", self.name);
        }
        Ok(())
    }
}

fn validate_subdirectory(subdirectory: &str) -> Result<()> {
    let mut components = Path::new(subdirectory).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => bail!("subdirectory `{subdirectory}` must be a single relative directory name"),
    }
}
