use std::collections::BTreeMap;

use component_manifest::{keys, ComponentType, DEFAULT_PACKAGE, DEFAULT_TEMPLATE};
use serde_json::{json, Map, Value};

/// Defaults merged underneath every authored manifest. A base record applies
/// to all types; per-type overlays refine it.
#[derive(Debug, Clone)]
pub struct ManifestDefaults {
    base: Map<String, Value>,
    per_type: BTreeMap<String, Map<String, Value>>,
}

impl Default for ManifestDefaults {
    fn default() -> Self {
        let base = [
            (keys::TYPE, json!(ComponentType::BLOCK)),
            (keys::TEMPLATE, json!(DEFAULT_TEMPLATE)),
            (keys::JS, json!([])),
            (keys::CSS, json!([])),
            (keys::DEPENDENCIES, json!([])),
            (keys::FORM_CONFIGURATION, json!({})),
            (keys::STATIC_CONFIGURATION, json!({})),
            (keys::CACHE, json!({ "max-age": 0 })),
            (keys::PACKAGE, json!(DEFAULT_PACKAGE)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
        Self {
            base,
            per_type: BTreeMap::new(),
        }
    }
}

impl ManifestDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base defaults plus the configured overlays.
    pub fn from_overlays(overlays: &BTreeMap<String, Map<String, Value>>) -> Self {
        overlays
            .iter()
            .fold(Self::default(), |defaults, (tag, overlay)| {
                defaults.with_type_overlay(tag.clone(), overlay.clone())
            })
    }

    pub fn with_type_overlay(mut self, tag: impl Into<String>, overlay: Map<String, Value>) -> Self {
        self.per_type.entry(tag.into()).or_default().extend(overlay);
        self
    }

    /// The full defaults record for one type tag.
    pub fn for_type(&self, tag: &str) -> Map<String, Value> {
        let mut record = self.base.clone();
        if let Some(overlay) = self.per_type.get(tag) {
            record.extend(overlay.clone());
        }
        record.insert(keys::TYPE.to_string(), Value::String(tag.to_string()));
        record
    }

    /// Merges `document` over the defaults for its declared type (or the
    /// base type when it declares none). Authored keys win.
    pub fn apply(&self, document: Map<String, Value>) -> Map<String, Value> {
        let tag = document
            .get(keys::TYPE)
            .and_then(Value::as_str)
            .or_else(|| self.base.get(keys::TYPE).and_then(Value::as_str))
            .unwrap_or(ComponentType::BLOCK)
            .to_string();
        merge(self.for_type(&tag), document)
    }
}

/// Shallow overlay: every key of `document` replaces the same key in `defaults`.
pub fn merge(mut defaults: Map<String, Value>, document: Map<String, Value>) -> Map<String, Value> {
    defaults.extend(document);
    defaults
}
