//! Named workloads that can be started by name, e.g. from the agent API.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::LoadGenerator;
use crate::error::{EngineResult, WorkloadResult};
use crate::props::Properties;
use crate::workload::{BoxGenerator, BoxLoader};

/// A built workload whose task type has been erased.
pub trait Workload: Send {
    /// Hand the generators and loaders to `engine`.
    fn start(self: Box<Self>, engine: &LoadGenerator, props: Properties) -> EngineResult<()>;
}

/// Generators and loaders sharing the task type `T`.
pub struct TypedWorkload<T> {
    pub generators: Vec<BoxGenerator<T>>,
    pub loaders: Vec<BoxLoader<T>>,
}

impl<T> TypedWorkload<T> {
    pub fn new(generators: Vec<BoxGenerator<T>>, loaders: Vec<BoxLoader<T>>) -> Self {
        Self {
            generators,
            loaders,
        }
    }
}

impl<T: Send + 'static> Workload for TypedWorkload<T> {
    fn start(self: Box<Self>, engine: &LoadGenerator, props: Properties) -> EngineResult<()> {
        let TypedWorkload {
            generators,
            loaders,
        } = *self;
        engine.start(generators, loaders, props)
    }
}

/// Builds a workload from run properties.
pub trait WorkloadFactory: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn build(&self, props: &Properties) -> WorkloadResult<Box<dyn Workload>>;
}

/// Name to factory map.
#[derive(Default, Clone)]
pub struct WorkloadRegistry {
    factories: BTreeMap<String, Arc<dyn WorkloadFactory>>,
}

impl std::fmt::Debug for WorkloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one with the same name.
    pub fn register(&mut self, factory: impl WorkloadFactory + 'static) -> &mut Self {
        self.factories
            .insert(factory.name().to_string(), Arc::new(factory));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn WorkloadFactory>> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn WorkloadFactory>> {
        self.factories.values()
    }
}
