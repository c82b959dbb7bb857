use crate::registry::Registry;

/// Post-processing stage run over the assembled registry before discovery
/// returns it. Stages may filter, annotate or remove entries.
pub trait RegistryAlter: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn alter(&self, registry: &mut Registry);
}

/// Adapts a closure into a named [`RegistryAlter`].
pub struct FnAlter<F> {
    name: String,
    f: F,
}

impl<F> FnAlter<F>
where
    F: Fn(&mut Registry) + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> RegistryAlter for FnAlter<F>
where
    F: Fn(&mut Registry) + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn alter(&self, registry: &mut Registry) {
        (self.f)(registry)
    }
}

/// Ordered list of alter stages, applied first to last.
#[derive(Default)]
pub struct AlterPipeline {
    stages: Vec<Box<dyn RegistryAlter>>,
}

impl AlterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, stage: impl RegistryAlter) {
        self.stages.push(Box::new(stage));
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut Registry) + Send + Sync + 'static,
    {
        self.register(FnAlter::new(name, f));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|stage| stage.name())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn apply(&self, registry: &mut Registry) {
        for stage in &self.stages {
            let before = registry.len();
            stage.alter(registry);
            tracing::debug!(
                stage = stage.name(),
                before,
                after = registry.len(),
                "applied registry alter"
            );
        }
    }
}

impl std::fmt::Debug for AlterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
