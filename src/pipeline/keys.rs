/// Type-safe keys for PipeMap
use super::types::{Asset, SourceFile, StageReport};
use crate::config::StageConfig;
use std::marker::PhantomData;

/// A type-safe key for PipeMap that enforces compile-time type checking
pub struct TypedKey<T> {
    name: &'static str,
    _phantom: PhantomData<T>,
}

impl<T> TypedKey<T> {
    /// Create a new typed key with a static name
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }

    /// Get the key name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for TypedKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedKey<T> {}

/// Configuration of the stage being run
pub const STAGE: TypedKey<StageConfig> = TypedKey::new("stage");

/// Files matched by the stage's input patterns
pub const SOURCES: TypedKey<Vec<SourceFile>> = TypedKey::new("sources");

/// In-memory files flowing towards the writer
pub const ASSETS: TypedKey<Vec<Asset>> = TypedKey::new("assets");

/// Per-run summary, threaded through every node
pub const REPORT: TypedKey<StageReport> = TypedKey::new("report");
