//! Registry of runtime support methods
//!
//! Lowering passes replace high-level operations with calls into the
//! runtime library, looked up here by name. A missing method means the
//! runtime image is broken, so lookups fail with a fatal error.

use std::sync::Arc;

use dashmap::DashMap;

use crate::element::MethodElement;
use crate::error::{CompileError, CompileResult};

/// Name to method lookup for runtime support
pub struct RuntimeMethods {
    methods: DashMap<String, Arc<MethodElement>>,
}

impl RuntimeMethods {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            methods: DashMap::new(),
        }
    }

    /// Register a method under its own name, replacing any previous one
    pub fn register(&self, method: Arc<MethodElement>) {
        let name = method.name().to_string();
        self.register_as(name, method);
    }

    /// Register a method under an explicit name
    pub fn register_as(&self, name: impl Into<String>, method: Arc<MethodElement>) {
        let name = name.into();
        log::trace!("registered runtime method {} -> {}", name, method);
        self.methods.insert(name, method);
    }

    /// Look up a required runtime method
    pub fn get_method(&self, name: &str) -> CompileResult<Arc<MethodElement>> {
        self.methods
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CompileError::MissingRuntimeMethod {
                name: name.to_string(),
            })
    }

    /// Look up an optional runtime method
    pub fn find_method(&self, name: &str) -> Option<Arc<MethodElement>> {
        self.methods.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered names
    pub fn count(&self) -> usize {
        self.methods.len()
    }
}

impl Default for RuntimeMethods {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{BasicElement, Modifiers};
    use kestrel_types::{FunctionType, MethodDescriptor, ValueType};

    fn method(name: &str) -> Arc<MethodElement> {
        Arc::new(MethodElement::new(
            BasicElement::new("kestrel/runtime/Monitors", Modifiers::STATIC),
            name,
            MethodDescriptor::void(),
            Arc::new(FunctionType {
                return_type: ValueType::VOID,
                params: vec![],
            }),
        ))
    }

    #[test]
    fn test_lookup() {
        let registry = RuntimeMethods::new();
        assert_eq!(registry.count(), 0);
        registry.register(method("monitorEnter"));
        let found = registry.get_method("monitorEnter").unwrap();
        assert_eq!(found.name(), "monitorEnter");
        assert!(registry.find_method("monitorExit").is_none());
    }

    #[test]
    fn test_missing_method_is_fatal() {
        let registry = RuntimeMethods::default();
        let err = registry.get_method("monitorExit").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, CompileError::MissingRuntimeMethod { name } if name == "monitorExit"));
    }

    #[test]
    fn test_register_as_alias() {
        let registry = RuntimeMethods::new();
        registry.register_as("va_start", method("vaStart"));
        assert_eq!(registry.get_method("va_start").unwrap().name(), "vaStart");
    }
}
