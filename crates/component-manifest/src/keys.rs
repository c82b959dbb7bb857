//! Canonical manifest keys and the authored spellings folded into them.

use serde_json::{Map, Value};

pub const MACHINE_NAME: &str = "machineName";
pub const TYPE: &str = "type";
pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const PATH: &str = "path";
pub const SUBPATH: &str = "subpath";
pub const TEMPLATE: &str = "template";
pub const JS: &str = "js";
pub const CSS: &str = "css";
pub const FORM_CONFIGURATION: &str = "formConfiguration";
pub const STATIC_CONFIGURATION: &str = "staticConfiguration";
pub const CACHE: &str = "cache";
pub const DEPENDENCIES: &str = "dependencies";
pub const PACKAGE: &str = "package";
pub const CONTEXTS: &str = "contexts";

/// Keys every manifest must author itself.
pub const REQUIRED: [&str; 2] = [NAME, DESCRIPTION];

/// Keys stamped by discovery; authored values for these are overwritten.
pub const COMPUTED: [&str; 3] = [MACHINE_NAME, PATH, SUBPATH];

const ALIASES: [(&str, &str); 6] = [
    ("machine_name", MACHINE_NAME),
    ("form_configuration", FORM_CONFIGURATION),
    ("static_configuration", STATIC_CONFIGURATION),
    ("enable_field", "enableField"),
    ("add_js", "addJs"),
    ("add_css", "addCss"),
];

/// Rewrites snake_case spellings of canonical keys in place. When a document
/// carries both spellings the canonical one is kept.
pub fn normalize_keys(document: &mut Map<String, Value>) {
    for (alias, canonical) in ALIASES {
        if let Some(value) = document.remove(alias) {
            document.entry(canonical).or_insert(value);
        }
    }
}
