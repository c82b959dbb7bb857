//! Turns block-typed registry entries into block plugin definitions for the
//! presentation layer.

use std::{collections::BTreeMap, sync::Arc};

use component_manifest::{is_machine_name, CachePolicy, ComponentManifest};
use serde::Serialize;
use serde_json::Value;

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Severity, TracingSink},
    registry::Registry,
};

/// Plugin id prefix of every derived block; derivative ids are
/// `component:<machine name>`.
pub const BASE_PLUGIN_ID: &str = "component";

const ASSET_REGIONS: [&str; 2] = ["header", "footer"];

/// A context value the block needs from its placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDefinition {
    /// Typed data identifier, e.g. `entity:node`.
    pub data_type: String,
    pub required: bool,
}

impl ContextDefinition {
    pub fn entity(entity_type: &str) -> Self {
        Self {
            data_type: format!("entity:{entity_type}"),
            required: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDefinition {
    pub id: String,
    pub admin_label: String,
    pub cache_policy: CachePolicy,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context_requirements: BTreeMap<String, ContextDefinition>,
    /// Asset libraries to attach, `component/<machine name>/<region>`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    pub info: ComponentManifest,
}

/// Builds a context definition from the value a manifest gives for one
/// context kind, or explains why the value is unusable.
pub type ContextBuilder = Box<dyn Fn(&Value) -> Result<ContextDefinition, String> + Send + Sync>;

/// Context kinds the deriver can translate, keyed by kind name.
pub struct ContextHandlers {
    builders: BTreeMap<String, ContextBuilder>,
}

impl Default for ContextHandlers {
    fn default() -> Self {
        let mut handlers = Self::empty();
        handlers.register("entity", entity_context);
        handlers
    }
}

impl ContextHandlers {
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, builder: F)
    where
        F: Fn(&Value) -> Result<ContextDefinition, String> + Send + Sync + 'static,
    {
        self.builders.insert(kind.into(), Box::new(builder));
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    /// `None` when no handler is registered for `kind`.
    pub fn build(&self, kind: &str, value: &Value) -> Option<Result<ContextDefinition, String>> {
        self.builders.get(kind).map(|builder| builder(value))
    }
}

impl std::fmt::Debug for ContextHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.kinds()).finish()
    }
}

fn entity_context(value: &Value) -> Result<ContextDefinition, String> {
    match value.as_str() {
        Some(entity_type) if is_machine_name(entity_type) => {
            Ok(ContextDefinition::entity(entity_type))
        }
        Some(entity_type) => Err(format!("`{entity_type}` is not a valid entity type id")),
        None => Err("entity context must name an entity type".to_string()),
    }
}

pub struct BlockDeriver {
    handlers: ContextHandlers,
    sink: Arc<dyn DiagnosticSink>,
}

impl std::fmt::Debug for BlockDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDeriver")
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl Default for BlockDeriver {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl BlockDeriver {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            handlers: ContextHandlers::default(),
            sink,
        }
    }

    pub fn with_handlers(mut self, handlers: ContextHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn handlers_mut(&mut self) -> &mut ContextHandlers {
        &mut self.handlers
    }

    /// One definition per block-typed entry, keyed by machine name.
    pub fn derive(&self, registry: &Registry) -> BTreeMap<String, BlockDefinition> {
        registry
            .blocks()
            .map(|manifest| (manifest.machine_name.clone(), self.derive_one(manifest)))
            .collect()
    }

    pub fn derive_one(&self, manifest: &ComponentManifest) -> BlockDefinition {
        BlockDefinition {
            id: format!("{BASE_PLUGIN_ID}:{}", manifest.machine_name),
            admin_label: manifest.name.clone(),
            cache_policy: manifest.cache.clone(),
            context_requirements: self.contexts_for(manifest),
            libraries: libraries_for(manifest),
            settings: manifest.settings.clone(),
            info: manifest.clone(),
        }
    }

    fn contexts_for(&self, manifest: &ComponentManifest) -> BTreeMap<String, ContextDefinition> {
        let mut requirements = BTreeMap::new();
        let contexts = match &manifest.contexts {
            None => return requirements,
            Some(Value::Object(contexts)) => contexts,
            Some(_) => {
                self.sink.report(
                    Diagnostic::new(
                        Severity::Warning,
                        DiagnosticKind::InvalidContext,
                        format!(
                            "component `{}` declares contexts that are not a mapping",
                            manifest.machine_name
                        ),
                    )
                    .at(&manifest.path)
                    .with("machine_name", &manifest.machine_name)
                    .with("context", "contexts"),
                );
                return requirements;
            }
        };
        for (kind, value) in contexts {
            match self.handlers.build(kind, value) {
                Some(Ok(definition)) => {
                    requirements.insert(kind.clone(), definition);
                }
                Some(Err(reason)) => self.sink.report(
                    Diagnostic::new(
                        Severity::Warning,
                        DiagnosticKind::InvalidContext,
                        format!(
                            "component `{}` declares an invalid `{kind}` context: {reason}",
                            manifest.machine_name
                        ),
                    )
                    .at(&manifest.path)
                    .with("machine_name", &manifest.machine_name)
                    .with("context", kind),
                ),
                None => self.sink.report(
                    Diagnostic::new(
                        Severity::Warning,
                        DiagnosticKind::UnsupportedContext,
                        format!(
                            "component `{}` declares unsupported context kind `{kind}`",
                            manifest.machine_name
                        ),
                    )
                    .at(&manifest.path)
                    .with("machine_name", &manifest.machine_name)
                    .with("context", kind),
                ),
            }
        }
        requirements
    }
}

fn libraries_for(manifest: &ComponentManifest) -> Vec<String> {
    ASSET_REGIONS
        .into_iter()
        .filter(|region| manifest.has_assets_in(region))
        .map(|region| format!("{BASE_PLUGIN_ID}/{}/{region}", manifest.machine_name))
        .collect()
}

/// A component offered as an entity field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOption {
    pub machine_name: String,
    pub label: String,
}

/// Components of any type with `enableField: true`, sorted by machine name.
pub fn field_options(registry: &Registry) -> Vec<FieldOption> {
    let mut options: Vec<FieldOption> = registry
        .iter()
        .filter(|manifest| manifest.enable_field)
        .map(|manifest| FieldOption {
            machine_name: manifest.machine_name.clone(),
            label: manifest.name.clone(),
        })
        .collect();
    options.sort_by(|a, b| a.machine_name.cmp(&b.machine_name));
    options.dedup_by(|a, b| a.machine_name == b.machine_name);
    options
}
