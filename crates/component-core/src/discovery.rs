//! The discovery entry point: resolve roots, walk each one, parse and merge
//! every manifest, group the results, then run the alter pipeline.

use std::{path::PathBuf, sync::Arc};

use component_manifest::{keys, ComponentManifest};
use serde_json::Value;
use tokio::task::JoinSet;

use crate::{
    alter::{AlterPipeline, RegistryAlter},
    cancel::CancelSignal,
    config::{Config, ScanOrder},
    defaults::ManifestDefaults,
    diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Severity, TracingSink},
    host::{ConfiguredHost, ExtensionHost},
    parser::{ManifestError, ManifestParser},
    registry::Registry,
    resolver::{resolve_roots, SearchRoot},
    walker::{DiscoveredFile, WalkError, Walker},
};

/// Failures that abort a whole discovery run. Problems with individual
/// manifests are reported as diagnostics instead.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("extension host unavailable")]
    Host(#[source] anyhow::Error),
    #[error("manifest suffix `{0}` does not name a supported format")]
    UnsupportedSuffix(String),
    #[error("component discovery cancelled")]
    Cancelled,
    #[error("component scan task failed")]
    Task(#[source] tokio::task::JoinError),
}

impl From<WalkError> for DiscoveryError {
    fn from(err: WalkError) -> Self {
        match err {
            WalkError::Cancelled(_) => DiscoveryError::Cancelled,
        }
    }
}

/// Knobs of a discovery run that are not supplied by the host.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub top_level_root: Option<PathBuf>,
    pub subdirectory: String,
    pub manifest_suffix: String,
    pub scan_order: ScanOrder,
    pub follow_links: bool,
    pub report_collisions: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        DiscoveryOptions::from(&Config::default())
    }
}

impl From<&Config> for DiscoveryOptions {
    fn from(config: &Config) -> Self {
        Self {
            top_level_root: config.top_level_root.clone(),
            subdirectory: config.subdirectory.clone(),
            manifest_suffix: config.manifest_suffix.clone(),
            scan_order: config.scan_order,
            follow_links: config.follow_links,
            report_collisions: config.report_collisions,
        }
    }
}

/// Manifests accepted from one search root, in walk order.
#[derive(Debug, Default)]
struct RootScan {
    manifests: Vec<ComponentManifest>,
}

pub struct ComponentDiscovery {
    host: Arc<dyn ExtensionHost>,
    sink: Arc<dyn DiagnosticSink>,
    options: DiscoveryOptions,
    parser: ManifestParser,
    defaults: ManifestDefaults,
    pipeline: AlterPipeline,
}

impl ComponentDiscovery {
    pub fn new(
        host: Arc<dyn ExtensionHost>,
        options: DiscoveryOptions,
    ) -> Result<Self, DiscoveryError> {
        let parser = ManifestParser::for_suffix(&options.manifest_suffix)
            .ok_or_else(|| DiscoveryError::UnsupportedSuffix(options.manifest_suffix.clone()))?;
        Ok(Self {
            host,
            sink: Arc::new(TracingSink),
            options,
            parser,
            defaults: ManifestDefaults::default(),
            pipeline: AlterPipeline::new(),
        })
    }

    /// Discovery over the extensions listed in `config`.
    pub fn from_config(config: &Config) -> Result<Self, DiscoveryError> {
        let host = Arc::new(ConfiguredHost::from_config(config));
        Ok(Self::new(host, DiscoveryOptions::from(config))?
            .with_defaults(ManifestDefaults::from_overlays(&config.defaults)))
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_defaults(mut self, defaults: ManifestDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_alter(mut self, stage: impl RegistryAlter) -> Self {
        self.pipeline.register(stage);
        self
    }

    /// Search directories for the current host state, in scan order.
    pub fn roots(&self) -> Result<Vec<SearchRoot>, DiscoveryError> {
        let extensions = self
            .host
            .active_extensions()
            .map_err(DiscoveryError::Host)?;
        Ok(resolve_roots(
            &extensions,
            self.options.top_level_root.as_deref(),
            &self.options.subdirectory,
            self.options.scan_order,
        ))
    }

    pub fn discover(&self) -> Result<Registry, DiscoveryError> {
        self.discover_with(&CancelSignal::never())
    }

    /// Scans every root on the calling thread, checking `cancel` between
    /// filesystem entries.
    pub fn discover_with(&self, cancel: &CancelSignal) -> Result<Registry, DiscoveryError> {
        let roots = self.roots()?;
        let walker = self.walker();
        let mut registry = Registry::new();
        for root in &roots {
            let scan = self.scan_root(&walker, root, cancel)?;
            self.absorb(&mut registry, root, scan);
        }
        Ok(self.finish(registry, roots.len()))
    }

    /// Scans roots in parallel on the blocking pool. Results are merged in
    /// resolved root order, so the outcome matches [`discover_with`].
    ///
    /// [`discover_with`]: ComponentDiscovery::discover_with
    pub async fn discover_concurrent(
        self: &Arc<Self>,
        cancel: CancelSignal,
    ) -> Result<Registry, DiscoveryError> {
        let roots = self.roots()?;
        let walker = Arc::new(self.walker());
        let mut join_set = JoinSet::new();
        for (index, root) in roots.iter().cloned().enumerate() {
            let this = Arc::clone(self);
            let walker = Arc::clone(&walker);
            let cancel = cancel.clone();
            join_set.spawn_blocking(move || (index, this.scan_root(&walker, &root, &cancel)));
        }

        let mut scans: Vec<Option<RootScan>> = roots.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (index, scan) = joined.map_err(DiscoveryError::Task)?;
            scans[index] = Some(scan?);
        }

        let mut registry = Registry::new();
        for (root, scan) in roots.iter().zip(scans) {
            if let Some(scan) = scan {
                self.absorb(&mut registry, root, scan);
            }
        }
        Ok(self.finish(registry, roots.len()))
    }

    fn walker(&self) -> Walker {
        Walker::new(self.options.manifest_suffix.clone())
            .ignoring(self.host.ignored_directories())
            .follow_links(self.options.follow_links)
    }

    fn scan_root(
        &self,
        walker: &Walker,
        root: &SearchRoot,
        cancel: &CancelSignal,
    ) -> Result<RootScan, DiscoveryError> {
        let files = walker.walk(&root.dir, cancel, self.sink.as_ref())?;
        let mut scan = RootScan::default();
        for file in files.into_values() {
            if cancel.is_cancelled() {
                return Err(DiscoveryError::Cancelled);
            }
            match self.load(&file) {
                Ok(manifest) => scan.manifests.push(manifest),
                Err(err) => {
                    metrics::counter!("component_manifests_total", "outcome" => "rejected")
                        .increment(1);
                    self.sink.report(err.to_diagnostic().with("root", root));
                }
            }
        }
        Ok(scan)
    }

    /// Parses one file, merges it over the defaults for its type and stamps
    /// the computed fields.
    fn load(&self, file: &DiscoveredFile) -> Result<ComponentManifest, ManifestError> {
        let document = self.parser.parse(&file.path)?;
        let mut merged = self.defaults.apply(document);
        merged.insert(
            keys::MACHINE_NAME.to_string(),
            Value::String(file.machine_name.clone()),
        );
        merged.insert(
            keys::PATH.to_string(),
            Value::String(file.dir.to_string_lossy().into_owned()),
        );
        merged.insert(keys::SUBPATH.to_string(), Value::String(file.subpath.clone()));

        let manifest: ComponentManifest =
            serde_json::from_value(Value::Object(merged)).map_err(|err| {
                ManifestError::InvalidField {
                    path: file.path.clone(),
                    key: "manifest".to_string(),
                    reason: err.to_string(),
                }
            })?;
        tracing::debug!(
            machine_name = %manifest.machine_name,
            component_type = %manifest.component_type,
            path = %file.path.display(),
            "parsed component manifest"
        );
        Ok(manifest)
    }

    fn absorb(&self, registry: &mut Registry, root: &SearchRoot, scan: RootScan) {
        for manifest in scan.manifests {
            if let Some(module) = manifest.module.as_deref() {
                if !self.host.module_exists(module) {
                    metrics::counter!("component_manifests_total", "outcome" => "unmet_module")
                        .increment(1);
                    self.sink.report(
                        Diagnostic::new(
                            Severity::Info,
                            DiagnosticKind::UnmetModule,
                            format!(
                                "component `{}` requires module `{module}`, which is not enabled",
                                manifest.machine_name
                            ),
                        )
                        .at(&manifest.path)
                        .with("machine_name", &manifest.machine_name)
                        .with("module", module),
                    );
                    continue;
                }
            }

            let machine_name = manifest.machine_name.clone();
            let component_type = manifest.component_type.clone();
            let path = manifest.path.clone();
            metrics::counter!("component_manifests_total", "outcome" => "accepted").increment(1);
            if let Some(previous) = registry.insert(manifest) {
                if self.options.report_collisions {
                    self.sink.report(
                        Diagnostic::new(
                            Severity::Info,
                            DiagnosticKind::Collision,
                            format!(
                                "component `{component_type}:{machine_name}` from {root} replaces an earlier definition"
                            ),
                        )
                        .at(&path)
                        .with("machine_name", &machine_name)
                        .with("replaced", previous.path.display()),
                    );
                }
            }
        }
    }

    fn finish(&self, mut registry: Registry, roots: usize) -> Registry {
        self.pipeline.apply(&mut registry);
        tracing::info!(
            roots,
            components = registry.len(),
            types = registry.types().count(),
            "component discovery complete"
        );
        registry
    }
}

impl std::fmt::Debug for ComponentDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDiscovery")
            .field("options", &self.options)
            .field("parser", &self.parser)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
