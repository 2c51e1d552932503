//! ModuleRegistry - catalog of module factories
//!
//! Keyed by `(group, stage type, name)`. Each lookup produces a fresh
//! instance, so no module state is ever shared between runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{FieldSpec, Module, ModuleGroup, ModuleKey, StageType};
use serde::Serialize;
use tracing::{debug, warn};

/// Produces a fresh, unconfigured module instance
pub type ModuleFactory = Arc<dyn Fn() -> Box<dyn Module> + Send + Sync>;

/// Module catalog
///
/// Built once at startup and then shared read-only (`Arc<ModuleRegistry>`).
#[derive(Default)]
pub struct ModuleRegistry {
    factories: BTreeMap<ModuleKey, ModuleFactory>,
}

/// Registry entry summary, for listings
#[derive(Debug, Clone, Serialize)]
pub struct ModuleDescription {
    #[serde(flatten)]
    pub key: ModuleKey,
    pub fields: Vec<FieldSpec>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `group`
    ///
    /// Stage type and name are read from a sample instance. Registering an
    /// existing key replaces the earlier factory and returns `true`.
    pub fn register(&mut self, group: ModuleGroup, factory: ModuleFactory) -> bool {
        let sample = factory();
        let key = ModuleKey::new(group, sample.stage_type(), sample.name());
        drop(sample);

        let replaced = self.factories.insert(key.clone(), factory).is_some();
        if replaced {
            warn!(module = %key, "Module registered twice, keeping the latest factory");
        } else {
            debug!(module = %key, "Module registered");
        }
        replaced
    }

    /// Register a constructor function under `group`
    pub fn register_fn<M, F>(&mut self, group: ModuleGroup, constructor: F) -> bool
    where
        M: Module + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.register(group, Arc::new(move || Box::new(constructor())))
    }

    /// Fresh instance for `(group, stage, name)`, if registered
    pub fn lookup(&self, group: ModuleGroup, stage: StageType, name: &str) -> Option<Box<dyn Module>> {
        self.factories
            .get(&ModuleKey::new(group, stage, name))
            .map(|factory| factory())
    }

    pub fn contains(&self, group: ModuleGroup, stage: StageType, name: &str) -> bool {
        self.factories
            .contains_key(&ModuleKey::new(group, stage, name))
    }

    /// Registered keys, sorted by group, stage and name
    pub fn keys(&self) -> impl Iterator<Item = &ModuleKey> {
        self.factories.keys()
    }

    /// Key plus configuration field table of a registered module
    pub fn describe(&self, key: &ModuleKey) -> Option<ModuleDescription> {
        let factory = self.factories.get(key)?;
        let fields = factory().default_config().fields().to_vec();
        Some(ModuleDescription {
            key: key.clone(),
            fields,
        })
    }

    /// Descriptions of every module in `group`, or of all groups
    pub fn describe_all(&self, group: Option<ModuleGroup>) -> Vec<ModuleDescription> {
        self.keys()
            .filter(|key| group.map_or(true, |group| key.group == group))
            .filter_map(|key| self.describe(key))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
