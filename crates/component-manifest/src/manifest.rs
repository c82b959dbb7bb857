use std::{fmt, path::PathBuf};

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{DEFAULT_PACKAGE, DEFAULT_TEMPLATE};

/// A discovered component after defaults have been merged in and the
/// discovery-computed fields have been stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentManifest {
    pub machine_name: String,
    #[serde(rename = "type", default)]
    pub component_type: ComponentType,
    pub name: String,
    pub description: String,
    /// Absolute directory holding the manifest file.
    pub path: PathBuf,
    /// Directory holding the manifest, relative to its search root, `/`-separated.
    pub subpath: String,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub js: Vec<String>,
    #[serde(default)]
    pub css: Vec<String>,
    #[serde(default = "empty_tree")]
    pub form_configuration: Value,
    #[serde(default = "empty_tree")]
    pub static_configuration: Value,
    #[serde(default)]
    pub cache: CachePolicy,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_package")]
    pub package: String,
    /// Authored version, kept as written (`1.0` stays a number).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    /// Module that must be enabled for the component to be registered.
    /// Numeric and boolean names are read as their text.
    #[serde(
        default,
        deserialize_with = "scalar_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub module: Option<String>,
    /// Context kind to value. Checked when blocks are derived, not here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_js: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_css: Option<Value>,
    #[serde(default)]
    pub enable_field: bool,
    /// Authored keys with no dedicated field, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentManifest {
    pub fn is_block(&self) -> bool {
        self.component_type == ComponentType::Block
    }

    pub fn depends_on(&self, component: &str) -> bool {
        self.dependencies.iter().any(|dep| dep == component)
    }

    /// Whether the `addJs`/`addCss` sections declare assets for `region`
    /// (`header` or `footer`).
    pub fn has_assets_in(&self, region: &str) -> bool {
        [&self.add_css, &self.add_js]
            .into_iter()
            .flatten()
            .any(|section| section.get(region).is_some())
    }
}

/// Consumer tag of a manifest. Only blocks are derived; every other tag is
/// stored in the registry untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentType {
    #[default]
    Block,
    Other(String),
}

impl ComponentType {
    pub const BLOCK: &'static str = "block";

    pub fn as_str(&self) -> &str {
        match self {
            ComponentType::Block => Self::BLOCK,
            ComponentType::Other(tag) => tag,
        }
    }
}

impl From<String> for ComponentType {
    fn from(tag: String) -> Self {
        if tag == Self::BLOCK {
            ComponentType::Block
        } else {
            ComponentType::Other(tag)
        }
    }
}

impl From<&str> for ComponentType {
    fn from(tag: &str) -> Self {
        ComponentType::from(tag.to_string())
    }
}

impl From<ComponentType> for String {
    fn from(value: ComponentType) -> Self {
        match value {
            ComponentType::Block => ComponentType::BLOCK.to_string(),
            ComponentType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render cache policy. `max-age` is in seconds; `0` disables caching and
/// a negative value means permanent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachePolicy {
    #[serde(rename = "max-age", alias = "max_age", default)]
    pub max_age: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CachePolicy {
    pub fn uncacheable() -> Self {
        Self::default()
    }

    pub fn is_cacheable(&self) -> bool {
        self.max_age != 0
    }

    pub fn is_permanent(&self) -> bool {
        self.max_age < 0
    }
}

fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(_) => Err(de::Error::custom("expected a module name")),
    }
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_package() -> String {
    DEFAULT_PACKAGE.to_string()
}

fn empty_tree() -> Value {
    Value::Object(Map::new())
}
