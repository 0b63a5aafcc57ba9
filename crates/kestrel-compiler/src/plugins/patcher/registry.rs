//! Registry of patch records keyed by patched class

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;

use super::info::ClassPatchInfo;
use crate::error::CompileResult;

/// Patch records shared by every loading thread
pub struct PatchRegistry {
    /// Patched class name to its record
    records: DashMap<String, Arc<Mutex<ClassPatchInfo>>>,
    /// Classes that only carry patches and must never load themselves
    patch_classes: DashSet<String>,
}

impl PatchRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            patch_classes: DashSet::new(),
        }
    }

    /// Mark a class as a patch carrier
    pub fn register_patch_class(&self, name: impl Into<String>) {
        self.patch_classes.insert(name.into());
    }

    /// Whether `name` was registered as a patch carrier
    pub fn is_patch_class(&self, name: &str) -> bool {
        self.patch_classes.contains(name)
    }

    /// Record for `class`, if any patch touched it or it has started loading
    pub fn get(&self, class: &str) -> Option<Arc<Mutex<ClassPatchInfo>>> {
        self.records.get(class).map(|entry| Arc::clone(entry.value()))
    }

    /// Record for `class`, created empty on first use
    pub fn record(&self, class: &str) -> Arc<Mutex<ClassPatchInfo>> {
        if let Some(existing) = self.records.get(class) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .records
            .entry(class.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ClassPatchInfo::new(class))));
        Arc::clone(entry.value())
    }

    /// Apply `f` to the record of `class` under its lock
    ///
    /// Registration methods on [`ClassPatchInfo`] fail once the class has
    /// started loading, so `f` observes the frozen state.
    pub fn patch<R>(
        &self,
        class: &str,
        f: impl FnOnce(&mut ClassPatchInfo) -> CompileResult<R>,
    ) -> CompileResult<R> {
        let record = self.record(class);
        let mut info = record.lock();
        f(&mut info)
    }

    /// Number of classes with a record
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

impl Default for PatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}
