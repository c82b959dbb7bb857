pub mod keys;
pub mod machine_name;
pub mod manifest;

pub use machine_name::is_machine_name;
pub use manifest::{CachePolicy, ComponentManifest, ComponentType};

/// File suffix of a component manifest unless configured otherwise.
pub const DEFAULT_MANIFEST_SUFFIX: &str = ".component.yml";

/// Directory name looked up beneath every extension root.
pub const DEFAULT_SUBDIRECTORY: &str = "components";

/// Markup template used when a manifest does not name one.
pub const DEFAULT_TEMPLATE: &str = "index.htm";

/// Package label applied to components that do not declare one.
pub const DEFAULT_PACKAGE: &str = "Component";
