// ABOUTME: Thread-safe name-to-pipe registry and the chain runner.
// ABOUTME: Lookups take a read lock; registration takes the write lock and replaces by name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::PipeError;
use crate::pipes::{builtin, numeric, time, Pipe, PipeContext, PipeInvocation};
use crate::result::Value;

/// Registry for looking up pipes by name.
#[derive(Default)]
pub struct PipeRegistry {
    pipes: RwLock<HashMap<String, Arc<dyn Pipe>>>,
}

impl std::fmt::Debug for PipeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeRegistry")
            .field("pipes", &self.names())
            .finish()
    }
}

impl PipeRegistry {
    /// Creates a registry with no pipes at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in pipe and its aliases.
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        builtin::register_all(&registry);
        numeric::register_all(&registry);
        time::register_all(&registry);
        registry
    }

    /// Registers `pipe` under `name`, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>, pipe: impl Pipe + 'static) {
        self.register_arc(name, Arc::new(pipe));
    }

    /// Registers an already shared pipe, e.g. one pipe under several aliases.
    pub fn register_arc(&self, name: impl Into<String>, pipe: Arc<dyn Pipe>) {
        self.write().insert(name.into(), pipe);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Pipe>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Runs `chain` over `input`.
    ///
    /// An empty chain returns the input as text. The first unknown name or
    /// failing pipe aborts the chain; the error records the input that pipe saw.
    pub fn apply(
        &self,
        chain: &[PipeInvocation],
        input: &str,
        ctx: &PipeContext,
    ) -> Result<Value, PipeError> {
        let mut current = Value::Text(input.to_string());
        for invocation in chain {
            let text = current.to_string();
            let pipe = self
                .lookup(&invocation.name)
                .ok_or_else(|| PipeError::unknown(&invocation.name, &text, &invocation.params))?;
            current = pipe
                .process(&text, &invocation.params, ctx)
                .map_err(|e| PipeError::failed(&invocation.name, &text, &invocation.params, e))?;
        }
        Ok(current)
    }

    /// Returns the invocations in `chain` whose pipe is not registered.
    pub fn missing<'a>(&self, chain: &'a [PipeInvocation]) -> Vec<&'a PipeInvocation> {
        let pipes = self.read();
        chain
            .iter()
            .filter(|inv| !pipes.contains_key(&inv.name))
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Pipe>>> {
        self.pipes.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Pipe>>> {
        self.pipes.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Registers one pipe under a canonical name and its aliases.
pub(crate) fn register_aliased(registry: &PipeRegistry, names: &[&str], pipe: Arc<dyn Pipe>) {
    for name in names {
        registry.register_arc(*name, Arc::clone(&pipe));
    }
}
