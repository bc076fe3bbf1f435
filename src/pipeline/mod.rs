use crate::error::{PipelineError, PipelineResult};
use std::any::Any;
use std::collections::HashMap;

pub mod core;
pub mod keys;
pub mod nodes;
pub mod types;

pub use core::{PipeNode, Pipeline};
pub use keys::TypedKey;
pub use types::{Asset, FileFailure, SourceFile, StageReport};

/// Data passed between the nodes of a pipeline
pub struct PipeMap {
    data: HashMap<String, Box<dyn Send + Sync + Any>>,
}

impl PipeMap {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Insert a value with a typed key (compile-time type checking)
    pub fn insert_typed<T: Send + Sync + Any>(&mut self, key: TypedKey<T>, value: T) {
        self.data.insert(key.name().to_string(), Box::new(value));
    }

    /// Get a value with a typed key (compile-time type checking)
    pub fn get_typed<T: Send + Sync + Any>(&self, key: TypedKey<T>) -> Option<&T> {
        self.data.get(key.name())?.downcast_ref::<T>()
    }

    pub fn get_typed_mut<T: Send + Sync + Any>(&mut self, key: TypedKey<T>) -> Option<&mut T> {
        self.data.get_mut(key.name())?.downcast_mut::<T>()
    }

    /// Move a value out of the map
    pub fn take_typed<T: Send + Sync + Any>(&mut self, key: TypedKey<T>) -> Option<T> {
        let boxed = self.data.remove(key.name())?;
        match boxed.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(boxed) => {
                self.data.insert(key.name().to_string(), boxed);
                None
            }
        }
    }

    /// Like `get_typed`, failing with `MissingInput` on behalf of `node`
    pub fn require<T: Send + Sync + Any>(
        &self,
        key: TypedKey<T>,
        node: &str,
    ) -> PipelineResult<&T> {
        self.get_typed(key).ok_or_else(|| missing(key, node))
    }

    pub fn require_mut<T: Send + Sync + Any>(
        &mut self,
        key: TypedKey<T>,
        node: &str,
    ) -> PipelineResult<&mut T> {
        self.get_typed_mut(key).ok_or_else(|| missing(key, node))
    }

    pub fn take_required<T: Send + Sync + Any>(
        &mut self,
        key: TypedKey<T>,
        node: &str,
    ) -> PipelineResult<T> {
        self.take_typed(key).ok_or_else(|| missing(key, node))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

fn missing<T>(key: TypedKey<T>, node: &str) -> PipelineError {
    PipelineError::MissingInput {
        node: node.to_string(),
        required: key.name().to_string(),
    }
}

impl Default for PipeMap {
    fn default() -> Self {
        Self::new()
    }
}
