pub mod alter;
pub mod cancel;
pub mod config;
pub mod defaults;
pub mod deriver;
pub mod diagnostics;
pub mod discovery;
pub mod host;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod walker;

pub use alter::{AlterPipeline, FnAlter, RegistryAlter};
pub use cancel::{CancelHandle, CancelSignal};
pub use config::Config;
pub use deriver::{field_options, BlockDefinition, BlockDeriver, ContextDefinition, ContextHandlers};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};
pub use discovery::{ComponentDiscovery, DiscoveryError, DiscoveryOptions};
pub use host::{ConfiguredHost, Extension, ExtensionHost, ExtensionKind};
pub use registry::Registry;
