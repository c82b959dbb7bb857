use std::collections::BTreeMap;

use component_manifest::{ComponentManifest, ComponentType};
use serde::{Deserialize, Serialize};

/// Discovered components grouped by type tag, then machine name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    types: BTreeMap<String, BTreeMap<String, ComponentManifest>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `manifest` under its type and machine name, returning the entry
    /// it replaced. Machine names are unique across types, so an entry of a
    /// different type with the same name is replaced as well.
    pub fn insert(&mut self, manifest: ComponentManifest) -> Option<ComponentManifest> {
        let previous = self.take(&manifest.machine_name);
        self.types
            .entry(manifest.component_type.as_str().to_string())
            .or_default()
            .insert(manifest.machine_name.clone(), manifest);
        previous
    }

    /// Removes the entry with this machine name, whatever its type.
    pub fn take(&mut self, machine_name: &str) -> Option<ComponentManifest> {
        let tag = self
            .types
            .iter()
            .find(|(_, bucket)| bucket.contains_key(machine_name))
            .map(|(tag, _)| tag.clone())?;
        self.remove(&tag, machine_name)
    }

    pub fn get(&self, tag: &str, machine_name: &str) -> Option<&ComponentManifest> {
        self.types.get(tag)?.get(machine_name)
    }

    pub fn get_mut(&mut self, tag: &str, machine_name: &str) -> Option<&mut ComponentManifest> {
        self.types.get_mut(tag)?.get_mut(machine_name)
    }

    pub fn of_type(&self, tag: &str) -> Option<&BTreeMap<String, ComponentManifest>> {
        self.types.get(tag)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &ComponentManifest> {
        self.of_type(ComponentType::BLOCK)
            .into_iter()
            .flat_map(|bucket| bucket.values())
    }

    /// The entry with this machine name, whatever its type.
    pub fn find(&self, machine_name: &str) -> Option<&ComponentManifest> {
        self.types
            .values()
            .find_map(|bucket| bucket.get(machine_name))
    }

    pub fn remove(&mut self, tag: &str, machine_name: &str) -> Option<ComponentManifest> {
        let bucket = self.types.get_mut(tag)?;
        let removed = bucket.remove(machine_name);
        if bucket.is_empty() {
            self.types.remove(tag);
        }
        removed
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&ComponentManifest) -> bool) {
        for bucket in self.types.values_mut() {
            bucket.retain(|_, manifest| keep(manifest));
        }
        self.types.retain(|_, bucket| !bucket.is_empty());
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentManifest> {
        self.types.values().flat_map(|bucket| bucket.values())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ComponentManifest> {
        self.types.values_mut().flat_map(|bucket| bucket.values_mut())
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
